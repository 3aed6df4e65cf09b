use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "crm_service_http_requests_total",
            "Total HTTP requests handled by crm-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create crm_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register crm_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "crm_service_http_request_duration_seconds",
            "HTTP request latency for crm-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create crm_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register crm_service_http_request_duration_seconds");
    histogram
});

static LOGIN_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "crm_service_login_attempts_total",
            "Login callbacks by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create crm_service_login_attempts_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register crm_service_login_attempts_total");
    counter
});

static BROADCAST_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "crm_service_broadcast_deliveries_total",
        "Change events handed to observer channels",
    )
    .expect("failed to create crm_service_broadcast_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register crm_service_broadcast_deliveries_total");
    counter
});

static BROADCAST_EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "crm_service_broadcast_evictions_total",
        "Observers dropped because they were closed or too slow",
    )
    .expect("failed to create crm_service_broadcast_evictions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register crm_service_broadcast_evictions_total");
    counter
});

static WEBSOCKET_SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "crm_service_websocket_sessions_active",
        "Currently open change-feed WebSocket sessions",
    )
    .expect("failed to create crm_service_websocket_sessions_active");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register crm_service_websocket_sessions_active");
    gauge
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn record_login(outcome: &str) {
    LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_broadcast(delivered: usize, evicted: usize) {
    BROADCAST_DELIVERIES_TOTAL.inc_by(delivered as u64);
    BROADCAST_EVICTIONS_TOTAL.inc_by(evicted as u64);
}

pub fn websocket_opened() {
    WEBSOCKET_SESSIONS_ACTIVE.inc();
}

pub fn websocket_closed() {
    WEBSOCKET_SESSIONS_ACTIVE.dec();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // Route pattern keeps customer ids out of the label set.
        let path = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start.elapsed();
            match &result {
                Ok(response) => {
                    observe_http_request(&method, &path, response.status().as_u16(), elapsed);
                }
                Err(_) => {
                    observe_http_request(&method, &path, 500, elapsed);
                }
            }
            result
        })
    }
}
