use std::sync::Arc;

use crate::engine::dispatch::DispatchCoordinator;
use crate::engine::lifecycle::RideLifecycle;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub coordinator: DispatchCoordinator,
    pub lifecycle: Arc<RideLifecycle>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(coordinator: DispatchCoordinator, metrics: Metrics) -> Self {
        let lifecycle = coordinator.lifecycle().clone();

        Self {
            coordinator,
            lifecycle,
            metrics,
        }
    }
}
