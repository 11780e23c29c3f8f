use crate::external::TrafficModel;

/// Linear regression of traffic volume factor on hourly rainfall.
#[derive(Debug, Clone, Copy)]
pub struct LinearTrafficModel {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearTrafficModel {
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }
}

impl TrafficModel for LinearTrafficModel {
    fn predict(&self, rain: f64) -> f64 {
        self.intercept + self.slope * rain
    }
}
