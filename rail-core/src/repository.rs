use async_trait::async_trait;

use crate::models::{
    Booking, NewBooking, NewTrip, NewUser, Station, Train, TrainUpdate, Trip, TripId, TripUpdate,
    User, UserId,
};
use crate::search::{TrainFilter, TripFilter};
use crate::StoreResult;

/// Repository trait for station data access
#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn list_stations(&self) -> StoreResult<Vec<Station>>;

    async fn get_station(&self, name: &str) -> StoreResult<Option<Station>>;

    async fn create_station(&self, station: &Station) -> StoreResult<Station>;

    /// Renames a station; trains referencing it follow the new name.
    async fn rename_station(&self, name: &str, station: &Station) -> StoreResult<Station>;

    async fn delete_station(&self, name: &str) -> StoreResult<()>;
}

/// Repository trait for train data access
#[async_trait]
pub trait TrainRepository: Send + Sync {
    async fn list_trains(&self, filter: &TrainFilter) -> StoreResult<Vec<Train>>;

    async fn get_train(&self, no: &str) -> StoreResult<Option<Train>>;

    async fn create_train(&self, train: &Train) -> StoreResult<Train>;

    async fn update_train(&self, no: &str, update: &TrainUpdate) -> StoreResult<Train>;

    /// Deletes the train and its trips. Fails with `Conflict` if any of those trips has bookings.
    async fn delete_train(&self, no: &str) -> StoreResult<()>;
}

/// Repository trait for trip data access.
///
/// None of these operations write `free_seats` after creation.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn list_trips(&self, filter: &TripFilter) -> StoreResult<Vec<Trip>>;

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>>;

    async fn create_trip(&self, trip: &NewTrip) -> StoreResult<Trip>;

    async fn update_trip(&self, id: TripId, update: &TripUpdate) -> StoreResult<Trip>;

    async fn delete_trip(&self, id: TripId) -> StoreResult<()>;
}

/// Read access to bookings. Writes go through [`ReservationStore`] only.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list_bookings(&self, user_id: UserId, trip_id: Option<TripId>) -> StoreResult<Vec<Booking>>;
}

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
}

/// Storage capabilities consumed by the reservation engine.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Unlocked read of the committed trip state.
    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>>;

    /// Opens a unit of work. Dropping it without `commit` discards every staged write.
    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>>;
}

/// One atomic unit of work spanning a trip update and a booking upsert.
#[async_trait]
pub trait ReservationTx: Send {
    /// Reads the trip for update. Backends that support row locks take one here.
    async fn lock_trip(&mut self, id: TripId) -> StoreResult<Option<Trip>>;

    async fn save_trip(&mut self, trip: &Trip) -> StoreResult<()>;

    async fn get_booking(&mut self, user_id: UserId, trip_id: TripId) -> StoreResult<Option<Booking>>;

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking>;

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;
}
