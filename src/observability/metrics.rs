use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::error::AppError;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatches_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub offers_accepted_total: IntCounter,
    pub pending_offers: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, AppError> {
        let registry = Registry::new();

        let dispatches_total = IntCounterVec::new(
            Opts::new(
                "dispatches_total",
                "Total dispatch and quote attempts by kind and outcome",
            ),
            &["kind", "outcome"],
        )
        .map_err(metric_error)?;

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch and quote requests in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind", "outcome"],
        )
        .map_err(metric_error)?;

        let offers_accepted_total =
            IntCounter::new("offers_accepted_total", "Ride offers accepted by drivers")
                .map_err(metric_error)?;

        let pending_offers = IntGauge::new("pending_offers", "Ride offers awaiting a driver")
            .map_err(metric_error)?;

        registry
            .register(Box::new(dispatches_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(offers_accepted_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(pending_offers.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            dispatches_total,
            dispatch_latency_seconds,
            offers_accepted_total,
            pending_offers,
        })
    }

    /// Records one attempt; `kind` is `dispatch` or `quote`.
    pub fn observe_dispatch(&self, kind: &str, outcome: &str, elapsed_secs: f64) {
        self.dispatches_total
            .with_label_values(&[kind, outcome])
            .inc();
        self.dispatch_latency_seconds
            .with_label_values(&[kind, outcome])
            .observe(elapsed_secs);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

fn metric_error(err: prometheus::Error) -> AppError {
    AppError::Internal(format!("metrics registration failed: {err}"))
}

/// Outcome label for a failed dispatch.
pub fn outcome_label(err: &AppError) -> &'static str {
    match err {
        AppError::NoDriversFound => "no_drivers",
        AppError::NoUsableRoute => "no_route",
        err if err.is_upstream() => "upstream_error",
        AppError::UnknownVehicleClass(_) | AppError::BadRequest(_) => "rejected",
        _ => "error",
    }
}
