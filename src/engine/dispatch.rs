use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::RideLifecycle;
use crate::engine::pricing;
use crate::engine::router::TrafficAdjustedRouter;
use crate::engine::search::nearby_candidates;
use crate::error::AppError;
use crate::external::{DriverDirectory, Geocoder};
use crate::models::driver::{Coordinate, Driver, DriverContact, VehicleClass};
use crate::models::offer::{Quote, RideOffer, RideOfferState, RouteLeg};

pub struct DispatchSettings {
    pub sample_stride: usize,
    pub offer_ttl: chrono::Duration,
}

/// Turns a pickup/drop/class request into a priced, driver-assigned offer.
pub struct DispatchCoordinator {
    geocoder: Arc<dyn Geocoder>,
    directory: Arc<dyn DriverDirectory>,
    router: TrafficAdjustedRouter,
    lifecycle: Arc<RideLifecycle>,
    settings: DispatchSettings,
}

impl DispatchCoordinator {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        directory: Arc<dyn DriverDirectory>,
        router: TrafficAdjustedRouter,
        lifecycle: Arc<RideLifecycle>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            geocoder,
            directory,
            router,
            lifecycle,
            settings,
        }
    }

    pub fn lifecycle(&self) -> &Arc<RideLifecycle> {
        &self.lifecycle
    }

    /// Builds an offer and registers it as pending for the chosen driver.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(
        &self,
        pickup: &str,
        drop: &str,
        class: VehicleClass,
    ) -> Result<RideOffer, AppError> {
        let offer = self.build_offer(pickup, drop, class).await?;
        self.lifecycle.register(offer.clone());
        Ok(offer)
    }

    /// Prices a ride the same way `dispatch` would, without offering it.
    #[tracing::instrument(skip(self))]
    pub async fn quote(
        &self,
        pickup: &str,
        drop: &str,
        class: VehicleClass,
    ) -> Result<Quote, AppError> {
        let offer = self.build_offer(pickup, drop, class).await?;

        Ok(Quote {
            price: offer.price,
            arrival_time: offer.driver_to_customer.minutes,
            trip_time: offer.customer_to_destination.minutes,
        })
    }

    async fn build_offer(
        &self,
        pickup: &str,
        drop: &str,
        class: VehicleClass,
    ) -> Result<RideOffer, AppError> {
        let origin = self.geocoder.geocode(pickup).await?;
        let snapshot = self.directory.drivers_by_class(class).await?;

        let candidates = nearby_candidates(&origin, &snapshot);
        if candidates.is_empty() {
            return Err(AppError::NoDriversFound);
        }

        let (driver, eta_minutes) = self.fastest_candidate(origin, candidates).await?;
        info!(
            driver_id = %driver.user_id,
            vehicle_no = %driver.vehicle_number,
            eta_minutes,
            "selected driver"
        );

        let contact = match self.directory.contact_info(&driver.vehicle_number).await {
            Ok(contact) => contact,
            Err(err) => {
                warn!(error = %err, vehicle_no = %driver.vehicle_number, "contact lookup failed; using placeholders");
                DriverContact::unknown()
            }
        };

        let destination = self.geocoder.geocode(drop).await?;

        let driver_to_customer = self.leg(driver.location, origin).await?;
        let customer_to_destination = self.leg(origin, destination).await?;

        let price = pricing::price(customer_to_destination.distance_meters, class);
        let created_at = Utc::now();

        Ok(RideOffer {
            ride_id: Uuid::new_v4(),
            driver_user_id: driver.user_id,
            driver_vehicle_number: driver.vehicle_number,
            driver_contact: contact,
            vehicle_class: class,
            pickup: pickup.to_string(),
            drop: drop.to_string(),
            driver_to_customer,
            customer_to_destination,
            price,
            state: RideOfferState::Pending,
            created_at,
            expires_at: created_at + self.settings.offer_ttl,
        })
    }

    /// Scores every candidate by traffic-adjusted travel time; the first
    /// candidate wins exact ties.
    async fn fastest_candidate(
        &self,
        origin: Coordinate,
        candidates: Vec<Driver>,
    ) -> Result<(Driver, u64), AppError> {
        let mut best: Option<(Driver, u64)> = None;

        for candidate in candidates {
            let minutes = self
                .router
                .best_travel_time(origin, candidate.location, self.settings.sample_stride)
                .await?;

            let Some(minutes) = minutes else {
                continue;
            };

            if best.as_ref().map_or(true, |(_, fastest)| minutes < *fastest) {
                best = Some((candidate, minutes));
            }
        }

        best.ok_or(AppError::NoUsableRoute)
    }

    /// Distance-optimal path plus time-optimal duration between two points.
    async fn leg(&self, from: Coordinate, to: Coordinate) -> Result<RouteLeg, AppError> {
        let shortest = self
            .router
            .shortest_route(from, to)
            .await?
            .ok_or(AppError::NoUsableRoute)?;

        let minutes = self
            .router
            .best_travel_time(from, to, self.settings.sample_stride)
            .await?
            .ok_or(AppError::NoUsableRoute)?;

        Ok(RouteLeg {
            path: shortest.path,
            distance_meters: shortest.distance_meters,
            minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{DispatchCoordinator, DispatchSettings};
    use crate::engine::lifecycle::RideLifecycle;
    use crate::engine::router::TrafficAdjustedRouter;
    use crate::error::AppError;
    use crate::external::traffic_model::LinearTrafficModel;
    use crate::external::{DriverDirectory, Geocoder, RouteService, WeatherService};
    use crate::models::driver::{Coordinate, Driver, DriverContact, VehicleClass};
    use crate::models::offer::RideOfferState;
    use crate::models::route::{RouteMode, RouteOption};

    const PICKUP: Coordinate = Coordinate { lat: 13.0827, lng: 80.2707 };
    const DROP: Coordinate = Coordinate { lat: 13.0500, lng: 80.2500 };

    struct Addresses;

    #[async_trait]
    impl Geocoder for Addresses {
        async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
            match address {
                "A" => Ok(PICKUP),
                "B" => Ok(DROP),
                other => Err(AppError::Geocode(format!("ZERO_RESULTS for {other}"))),
            }
        }
    }

    struct Directory {
        drivers: Vec<Driver>,
        contact: Option<DriverContact>,
    }

    #[async_trait]
    impl DriverDirectory for Directory {
        async fn drivers_by_class(&self, class: VehicleClass) -> Result<Vec<Driver>, AppError> {
            Ok(self
                .drivers
                .iter()
                .filter(|d| d.vehicle_class == class)
                .cloned()
                .collect())
        }

        async fn contact_info(&self, _vehicle_number: &str) -> Result<DriverContact, AppError> {
            self.contact
                .clone()
                .ok_or_else(|| AppError::Directory("timed out".to_string()))
        }
    }

    /// Routes between two points, looked up in either direction.
    struct Routes {
        by_pair: HashMap<(u64, u64), Vec<RouteOption>>,
        calls: AtomicUsize,
    }

    fn key(a: Coordinate, b: Coordinate) -> (u64, u64) {
        let a = (a.lat * 1e4).round() as u64;
        let b = (b.lat * 1e4).round() as u64;
        (a.min(b), a.max(b))
    }

    #[async_trait]
    impl RouteService for Routes {
        async fn routes(
            &self,
            origin: Coordinate,
            destination: Coordinate,
            _mode: RouteMode,
        ) -> Result<Vec<RouteOption>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .by_pair
                .get(&key(origin, destination))
                .cloned()
                .unwrap_or_default())
        }
    }

    struct Dry;

    #[async_trait]
    impl WeatherService for Dry {
        async fn precipitation(&self, _at: Coordinate) -> f64 {
            0.0
        }
    }

    fn driver(id: &str, lat: f64, class: VehicleClass) -> Driver {
        Driver {
            vehicle_number: format!("TN-{id}"),
            user_id: id.to_string(),
            vehicle_class: class,
            location: Coordinate { lat, lng: PICKUP.lng },
        }
    }

    fn option(distance: u64, seconds: u64) -> RouteOption {
        RouteOption {
            distance_meters: distance,
            duration_seconds: seconds,
            traffic_duration_seconds: None,
            path: vec![PICKUP, DROP],
        }
    }

    fn coordinator(
        drivers: Vec<Driver>,
        contact: Option<DriverContact>,
        routes: Vec<(Coordinate, Coordinate, Vec<RouteOption>)>,
    ) -> (DispatchCoordinator, Arc<Routes>) {
        let routes = Arc::new(Routes {
            by_pair: routes.into_iter().map(|(a, b, r)| (key(a, b), r)).collect(),
            calls: AtomicUsize::new(0),
        });
        let router = TrafficAdjustedRouter::new(
            routes.clone(),
            Arc::new(Dry),
            Arc::new(LinearTrafficModel::new(1.0, 0.1)),
        );
        let coordinator = DispatchCoordinator::new(
            Arc::new(Addresses),
            Arc::new(Directory { drivers, contact }),
            router,
            Arc::new(RideLifecycle::new(16)),
            DispatchSettings {
                sample_stride: 30,
                offer_ttl: chrono::Duration::minutes(5),
            },
        );
        (coordinator, routes)
    }

    // ~3 km north of the pickup.
    const NEAR_LAT: f64 = 13.1097;

    #[tokio::test]
    async fn regular_ride_is_priced_and_left_pending() {
        let near = driver("driver-1", NEAR_LAT, VehicleClass::Regular);
        let (coordinator, routes) = coordinator(
            vec![near.clone()],
            Some(DriverContact {
                name: "Kannan".to_string(),
                phone: "98400".to_string(),
            }),
            vec![
                (PICKUP, DROP, vec![option(5_000, 900), option(6_500, 1_200)]),
                (PICKUP, near.location, vec![option(3_200, 630)]),
            ],
        );

        let offer = coordinator.dispatch("A", "B", VehicleClass::Regular).await.unwrap();

        assert_eq!(offer.price, 225.0);
        assert_eq!(offer.state, RideOfferState::Pending);
        assert_eq!(offer.driver_user_id, "driver-1");
        assert_eq!(offer.driver_contact.name, "Kannan");
        assert_eq!(offer.customer_to_destination.distance_meters, 5_000);
        assert_eq!(offer.customer_to_destination.minutes, 15);
        assert_eq!(offer.driver_to_customer.minutes, 10);
        // candidate scoring, then shortest + fastest for each leg
        assert_eq!(routes.calls.load(Ordering::SeqCst), 5);

        let pending = coordinator
            .lifecycle()
            .peek_pending("driver-1", Utc::now())
            .unwrap();
        assert_eq!(pending, offer);
    }

    #[tokio::test]
    async fn fastest_candidate_wins_and_ties_keep_the_first() {
        let slow = driver("slow", 13.0900, VehicleClass::Regular);
        let fast = driver("fast", 13.0950, VehicleClass::Regular);
        let also_fast = driver("also-fast", 13.1000, VehicleClass::Regular);
        let (coordinator, _) = coordinator(
            vec![slow.clone(), fast.clone(), also_fast.clone()],
            None,
            vec![
                (PICKUP, DROP, vec![option(5_000, 900)]),
                (PICKUP, slow.location, vec![option(1_000, 900)]),
                (PICKUP, fast.location, vec![option(1_000, 300)]),
                (PICKUP, also_fast.location, vec![option(1_000, 300)]),
            ],
        );

        let offer = coordinator.dispatch("A", "B", VehicleClass::Regular).await.unwrap();

        assert_eq!(offer.driver_user_id, "fast");
        assert_eq!(offer.driver_contact, DriverContact::unknown());
    }

    #[tokio::test]
    async fn no_driver_of_the_class_nearby_fails_without_registering() {
        let jumbo = driver("jumbo", NEAR_LAT, VehicleClass::Jumbo);
        let far = driver("far", PICKUP.lat + 0.6, VehicleClass::Regular);
        let (coordinator, routes) = coordinator(vec![jumbo, far], None, vec![]);

        let err = coordinator
            .dispatch("A", "B", VehicleClass::Regular)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoDriversFound));
        assert_eq!(coordinator.lifecycle().pending_count(), 0);
        assert_eq!(routes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn candidates_without_routes_yield_no_usable_route() {
        let near = driver("driver-1", NEAR_LAT, VehicleClass::Regular);
        let (coordinator, _) = coordinator(vec![near], None, vec![]);

        let err = coordinator
            .dispatch("A", "B", VehicleClass::Regular)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoUsableRoute));
        assert_eq!(coordinator.lifecycle().pending_count(), 0);
    }

    #[tokio::test]
    async fn geocoding_failure_on_drop_aborts_dispatch() {
        let near = driver("driver-1", NEAR_LAT, VehicleClass::Regular);
        let (coordinator, _) = coordinator(
            vec![near.clone()],
            None,
            vec![(PICKUP, near.location, vec![option(3_000, 600)])],
        );

        let err = coordinator
            .dispatch("A", "nowhere", VehicleClass::Regular)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Geocode(_)));
        assert_eq!(coordinator.lifecycle().pending_count(), 0);
    }

    #[tokio::test]
    async fn quote_does_not_register_an_offer() {
        let near = driver("driver-1", NEAR_LAT, VehicleClass::Jumbo);
        let (coordinator, _) = coordinator(
            vec![near.clone()],
            None,
            vec![
                (PICKUP, DROP, vec![option(5_000, 900)]),
                (PICKUP, near.location, vec![option(3_000, 630)]),
            ],
        );

        let quote = coordinator.quote("A", "B", VehicleClass::Jumbo).await.unwrap();

        assert_eq!(quote.price, 300.0);
        assert_eq!(quote.arrival_time, 10);
        assert_eq!(quote.trip_time, 15);
        assert_eq!(coordinator.lifecycle().pending_count(), 0);
    }
}
