//! Request start/complete logging.
//!
//! Health probes arrive every few seconds from orchestrators, so they are
//! logged at `debug`. WebSocket upgrades are tagged so a relay's lifetime can
//! be matched to the request that opened it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{debug, error, info};

pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

fn is_health_probe(path: &str) -> bool {
    path == "/health" || path == "/api/v1/health"
}

fn is_websocket_upgrade(req: &ServiceRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let quiet = is_health_probe(req.path());
        let websocket = is_websocket_upgrade(&req);
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        if quiet {
            debug!(method = %method, uri = %uri, "Health probe");
        } else {
            info!(
                method = %method,
                uri = %uri,
                remote_addr = %remote_addr,
                websocket = websocket,
                "Request started"
            );
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis();

            match &result {
                Ok(response) if quiet => {
                    debug!(status = response.status().as_u16(), duration_ms = %duration_ms, "Health probe answered");
                }
                Ok(response) => {
                    info!(
                        method = %method,
                        uri = %uri,
                        remote_addr = %remote_addr,
                        status = response.status().as_u16(),
                        duration_ms = %duration_ms,
                        websocket = websocket,
                        "Request completed"
                    );
                }
                Err(err) => {
                    error!(
                        method = %method,
                        uri = %uri,
                        remote_addr = %remote_addr,
                        duration_ms = %duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}
