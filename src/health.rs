//! Health and metrics endpoints.

use crate::config::AppConfig;
use crate::state::{AppState, MetricsSnapshot};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.config();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "pipeline": {
            "ws_url": config.pipeline.ws_url
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_relays": metrics.active_relays
        },
        "memory": get_memory_info(),
        "system": get_system_status(config, &metrics)
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_relays": metrics.active_relays,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info(),
        "performance": {
            "max_concurrent_sessions": state.config().performance.max_concurrent_sessions
        }
    }))
}

fn error_rate(metrics: &MetricsSnapshot) -> f64 {
    if metrics.request_count > 0 {
        metrics.error_count as f64 / metrics.request_count as f64
    } else {
        0.0
    }
}

#[cfg(target_os = "linux")]
fn get_memory_info() -> serde_json::Value {
    let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", std::process::id())) else {
        return memory_unavailable("Could not read /proc status");
    };

    let field_bytes = |name: &str| {
        status
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map_or(0, |kb| kb * 1024)
    };

    json!({
        "resident_memory_bytes": field_bytes("VmRSS:"),
        "virtual_memory_bytes": field_bytes("VmSize:"),
        "available": true
    })
}

#[cfg(not(target_os = "linux"))]
fn get_memory_info() -> serde_json::Value {
    memory_unavailable("Memory info not available on this platform")
}

fn memory_unavailable(note: &str) -> serde_json::Value {
    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": note
    })
}

fn get_system_status(config: &AppConfig, metrics: &MetricsSnapshot) -> serde_json::Value {
    let limit = config.performance.max_concurrent_sessions;
    let relay_usage = if limit > 0 {
        metrics.active_relays as f64 / limit as f64
    } else {
        0.0
    };

    let status = if relay_usage > 0.9 {
        "high_load"
    } else if relay_usage > 0.7 {
        "moderate_load"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "relay_usage_percent": (relay_usage * 100.0).round(),
        "max_relays": limit,
        "current_relays": metrics.active_relays,
        "load_warnings": if relay_usage > 0.8 {
            vec!["High relay usage - consider increasing max_concurrent_sessions"]
        } else {
            vec![]
        }
    })
}
