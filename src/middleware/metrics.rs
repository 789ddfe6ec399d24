//! Per-endpoint request counting and latency.
//!
//! Endpoints are keyed by their route pattern rather than the raw path, so
//! `/api/v1/sessions/{id}` is one entry no matter how many sessions exist.
//! Requests that matched no route are grouped under `"<METHOD> unmatched"`.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
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
        let state = req.app_data::<web::Data<AppState>>().cloned();
        if let Some(state) = &state {
            state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let Some(state) = state else {
                return result;
            };

            let duration_ms = start_time.elapsed().as_millis() as u64;
            let (endpoint, is_error) = match &result {
                Ok(response) => {
                    let request = response.request();
                    let pattern = request.match_pattern().unwrap_or_else(|| "unmatched".to_string());
                    let status = response.status();
                    (
                        format!("{} {}", request.method(), pattern),
                        status.is_client_error() || status.is_server_error(),
                    )
                }
                Err(_) => ("unknown".to_string(), true),
            };

            state.record_endpoint_request(&endpoint, duration_ms, is_error);
            if is_error {
                state.increment_error_count();
            }

            result
        })
    }
}
