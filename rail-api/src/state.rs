use rail_booking::ReservationEngine;
use rail_core::repository::{
    BookingRepository, StationRepository, TrainRepository, TripRepository, UserRepository,
};
use rail_core::Authenticator;
use rail_store::app_config::{AuthConfig, BookingRules};
use rail_store::{
    DbClient, MemoryStore, PgBookingRepository, PgReservationStore, PgStationRepository,
    PgTrainRepository, PgTripRepository, PgUserRepository,
};
use std::sync::Arc;

use crate::auth::JwtGate;

#[derive(Clone)]
pub struct AppState {
    pub stations: Arc<dyn StationRepository>,
    pub trains: Arc<dyn TrainRepository>,
    pub trips: Arc<dyn TripRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub engine: Arc<ReservationEngine>,
    /// Resolves bearer tokens on protected routes.
    pub gate: Arc<dyn Authenticator>,
    /// Issues tokens on register and login.
    pub tokens: Arc<JwtGate>,
    pub auth: AuthConfig,
    pub booking: BookingRules,
}

impl AppState {
    pub fn in_memory(store: MemoryStore, auth: AuthConfig, booking: BookingRules) -> Self {
        let jwt = Arc::new(JwtGate::new(auth.jwt_secret.clone(), auth.jwt_expiration_seconds));
        Self {
            stations: Arc::new(store.clone()),
            trains: Arc::new(store.clone()),
            trips: Arc::new(store.clone()),
            bookings: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            engine: Arc::new(
                ReservationEngine::new(Arc::new(store)).with_lock_timeout(booking.reservation_timeout()),
            ),
            gate: jwt.clone(),
            tokens: jwt,
            auth,
            booking,
        }
    }

    pub fn postgres(db: &DbClient, auth: AuthConfig, booking: BookingRules) -> Self {
        let pool = &db.pool;
        let jwt = Arc::new(JwtGate::new(auth.jwt_secret.clone(), auth.jwt_expiration_seconds));
        Self {
            stations: Arc::new(PgStationRepository::new(pool.clone())),
            trains: Arc::new(PgTrainRepository::new(pool.clone())),
            trips: Arc::new(PgTripRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            engine: Arc::new(
                ReservationEngine::new(Arc::new(PgReservationStore::new(pool.clone())))
                    .with_lock_timeout(booking.reservation_timeout()),
            ),
            gate: jwt.clone(),
            tokens: jwt,
            auth,
            booking,
        }
    }
}
