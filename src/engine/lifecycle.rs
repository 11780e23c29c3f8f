use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::offer::{OfferStatus, RideOffer, RideOfferState};

/// Concurrent store of ride offers.
///
/// Pending offers are keyed by the driver they were sent to, so a driver's
/// client can poll without knowing the ride id. Accepted offers move to an
/// index keyed by ride id. Every transition on a driver's pending slot runs
/// under that slot's shard lock, so at most one `accept` of a given offer
/// can succeed.
pub struct RideLifecycle {
    pending: DashMap<String, RideOffer>,
    pending_by_ride: DashMap<Uuid, String>,
    /// Bounded by `accepted_retention`; `evict_settled` drops older rides.
    accepted: DashMap<Uuid, RideOffer>,
    accepted_retention: Duration,
    events_tx: broadcast::Sender<RideOffer>,
}

impl RideLifecycle {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            pending: DashMap::new(),
            pending_by_ride: DashMap::new(),
            accepted: DashMap::new(),
            accepted_retention: Duration::hours(24),
            events_tx,
        }
    }

    /// How long an accepted ride stays queryable after it was created.
    pub fn with_accepted_retention(mut self, retention: Duration) -> Self {
        self.accepted_retention = retention;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RideOffer> {
        self.events_tx.subscribe()
    }

    /// Stores `offer` as the driver's pending offer. A previous pending offer
    /// for the same driver is replaced and its id stops resolving.
    pub fn register(&self, offer: RideOffer) {
        let driver_id = offer.driver_user_id.clone();
        let ride_id = offer.ride_id;

        self.pending_by_ride.insert(ride_id, driver_id.clone());
        if let Some(previous) = self.pending.insert(driver_id.clone(), offer.clone()) {
            self.pending_by_ride.remove(&previous.ride_id);
            warn!(
                driver_id = %driver_id,
                superseded_ride_id = %previous.ride_id,
                ride_id = %ride_id,
                "pending offer replaced by a newer dispatch"
            );
        }

        info!(driver_id = %driver_id, ride_id = %ride_id, "ride offer pending");
        let _ = self.events_tx.send(offer);
    }

    pub fn peek_pending(&self, driver_id: &str, now: DateTime<Utc>) -> Option<RideOffer> {
        self.pending
            .get(driver_id)
            .map(|entry| entry.value().clone())
            .filter(|offer| !offer.is_expired(now))
    }

    /// Moves the driver's pending offer to accepted if its id is `ride_id`
    /// and it has not expired.
    pub fn accept(
        &self,
        driver_id: &str,
        ride_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RideOffer, AppError> {
        let accepted = match self.pending.entry(driver_id.to_string()) {
            Entry::Occupied(entry)
                if entry.get().ride_id == ride_id && !entry.get().is_expired(now) =>
            {
                let mut offer = entry.get().clone();
                offer.state = RideOfferState::Accepted;
                self.accepted.insert(ride_id, offer.clone());
                entry.remove();
                offer
            }
            _ => return Err(AppError::OfferNotFound),
        };

        self.pending_by_ride.remove(&ride_id);
        info!(driver_id = %driver_id, ride_id = %ride_id, "ride offer accepted");
        let _ = self.events_tx.send(accepted.clone());

        Ok(accepted)
    }

    pub fn status(&self, ride_id: Uuid, now: DateTime<Utc>) -> OfferStatus {
        if let Some(offer) = self.accepted.get(&ride_id) {
            return OfferStatus::Accepted {
                ride_details: offer.value().clone(),
            };
        }

        let driver_id = match self.pending_by_ride.get(&ride_id) {
            Some(entry) => entry.value().clone(),
            None => return OfferStatus::Unknown,
        };

        match self.peek_pending(&driver_id, now) {
            Some(offer) if offer.ride_id == ride_id => OfferStatus::Pending,
            _ => OfferStatus::Unknown,
        }
    }

    /// Drops a pending offer by id. Returns whether anything was removed.
    pub fn invalidate(&self, ride_id: Uuid) -> bool {
        let Some((_, driver_id)) = self.pending_by_ride.remove(&ride_id) else {
            return false;
        };

        self.pending
            .remove_if(&driver_id, |_, offer| offer.ride_id == ride_id)
            .is_some()
    }

    /// Removes every pending offer whose TTL has elapsed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.value().ride_id)
            .collect();

        expired
            .into_iter()
            .filter(|ride_id| self.invalidate(*ride_id))
            .count()
    }

    /// Removes accepted rides created more than the retention window ago.
    pub fn evict_settled(&self, now: DateTime<Utc>) -> usize {
        let before = self.accepted.len();
        self.accepted
            .retain(|_, offer| offer.created_at + self.accepted_retention > now);
        before.saturating_sub(self.accepted.len())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::RideLifecycle;
    use crate::error::AppError;
    use crate::models::driver::{DriverContact, VehicleClass};
    use crate::models::offer::{OfferStatus, RideOffer, RideOfferState, RouteLeg};

    fn offer(driver: &str) -> RideOffer {
        let now = Utc::now();
        RideOffer {
            ride_id: Uuid::new_v4(),
            driver_user_id: driver.to_string(),
            driver_vehicle_number: "TN09AB1234".to_string(),
            driver_contact: DriverContact::unknown(),
            vehicle_class: VehicleClass::Regular,
            pickup: "A".to_string(),
            drop: "B".to_string(),
            driver_to_customer: RouteLeg {
                path: Vec::new(),
                distance_meters: 3_000,
                minutes: 10,
            },
            customer_to_destination: RouteLeg {
                path: Vec::new(),
                distance_meters: 5_000,
                minutes: 15,
            },
            price: 225.0,
            state: RideOfferState::Pending,
            created_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[test]
    fn accept_succeeds_exactly_once() {
        let store = RideLifecycle::new(16);
        let pending = offer("driver-1");
        let ride_id = pending.ride_id;
        store.register(pending);

        assert!(store.accept("driver-1", ride_id, Utc::now()).is_ok());
        assert!(matches!(
            store.accept("driver-1", ride_id, Utc::now()),
            Err(AppError::OfferNotFound)
        ));
    }

    #[test]
    fn wrong_driver_or_id_does_not_mutate() {
        let store = RideLifecycle::new(16);
        let pending = offer("driver-1");
        let ride_id = pending.ride_id;
        store.register(pending.clone());

        assert!(store.accept("driver-2", ride_id, Utc::now()).is_err());
        assert!(store.accept("driver-1", Uuid::new_v4(), Utc::now()).is_err());

        assert_eq!(store.peek_pending("driver-1", Utc::now()), Some(pending));
        assert_eq!(store.status(ride_id, Utc::now()), OfferStatus::Pending);
    }

    #[test]
    fn accepted_offer_differs_from_pending_only_in_state() {
        let store = RideLifecycle::new(16);
        let pending = offer("driver-1");
        store.register(pending.clone());

        let accepted = store.accept("driver-1", pending.ride_id, Utc::now()).unwrap();

        assert_eq!(accepted.state, RideOfferState::Accepted);
        let mut restored = accepted.clone();
        restored.state = RideOfferState::Pending;
        assert_eq!(restored, pending);

        match store.status(pending.ride_id, Utc::now()) {
            OfferStatus::Accepted { ride_details } => assert_eq!(ride_details, accepted),
            other => panic!("expected accepted, got {other:?}"),
        }
        assert_eq!(store.peek_pending("driver-1", Utc::now()), None);
    }

    #[test]
    fn unknown_ids_report_unknown() {
        let store = RideLifecycle::new(16);
        assert_eq!(store.status(Uuid::new_v4(), Utc::now()), OfferStatus::Unknown);
    }

    #[test]
    fn newer_dispatch_replaces_pending_offer() {
        let store = RideLifecycle::new(16);
        let first = offer("driver-1");
        let second = offer("driver-1");
        store.register(first.clone());
        store.register(second.clone());

        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.status(first.ride_id, Utc::now()), OfferStatus::Unknown);
        assert!(store.accept("driver-1", first.ride_id, Utc::now()).is_err());
        assert!(store.accept("driver-1", second.ride_id, Utc::now()).is_ok());
    }

    #[test]
    fn expired_offers_are_invisible_and_evictable() {
        let store = RideLifecycle::new(16);
        let pending = offer("driver-1");
        let later = pending.expires_at + Duration::seconds(1);
        store.register(pending.clone());

        assert_eq!(store.peek_pending("driver-1", later), None);
        assert_eq!(store.status(pending.ride_id, later), OfferStatus::Unknown);
        assert!(store.accept("driver-1", pending.ride_id, later).is_err());

        assert_eq!(store.evict_expired(Utc::now()), 0);
        assert_eq!(store.evict_expired(later), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn accepted_rides_are_dropped_after_retention() {
        let store = RideLifecycle::new(16).with_accepted_retention(Duration::hours(1));
        let pending = offer("driver-1");
        store.register(pending.clone());
        store.accept("driver-1", pending.ride_id, Utc::now()).unwrap();

        let soon = pending.created_at + Duration::minutes(59);
        let later = pending.created_at + Duration::hours(1);

        assert_eq!(store.evict_settled(soon), 0);
        assert!(matches!(
            store.status(pending.ride_id, soon),
            OfferStatus::Accepted { .. }
        ));

        assert_eq!(store.evict_settled(later), 1);
        assert_eq!(store.accepted_count(), 0);
        assert_eq!(store.status(pending.ride_id, later), OfferStatus::Unknown);
    }

    #[test]
    fn invalidate_is_safe_for_any_id() {
        let store = RideLifecycle::new(16);
        let pending = offer("driver-1");
        store.register(pending.clone());

        assert!(!store.invalidate(Uuid::new_v4()));
        assert!(store.invalidate(pending.ride_id));
        assert!(!store.invalidate(pending.ride_id));
        assert_eq!(store.status(pending.ride_id, Utc::now()), OfferStatus::Unknown);
    }

    #[tokio::test]
    async fn events_are_published_for_register_and_accept() {
        let store = RideLifecycle::new(16);
        let mut rx = store.subscribe();
        let pending = offer("driver-1");
        store.register(pending.clone());
        store.accept("driver-1", pending.ride_id, Utc::now()).unwrap();

        assert_eq!(rx.recv().await.unwrap().state, RideOfferState::Pending);
        assert_eq!(rx.recv().await.unwrap().state, RideOfferState::Accepted);
    }

    #[test]
    fn concurrent_accepts_have_a_single_winner() {
        let store = Arc::new(RideLifecycle::new(16));
        let pending = offer("driver-1");
        let ride_id = pending.ride_id;
        store.register(pending);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.accept("driver-1", ride_id, Utc::now()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(store.accepted_count(), 1);
    }
}
