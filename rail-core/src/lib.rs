pub mod identity;
pub mod models;
pub mod repository;
pub mod search;

pub use identity::{AuthError, Authenticator, Identity};
pub use models::{
    Booking, BookingId, NewBooking, NewTrip, NewUser, Role, Station, Train, TrainUpdate, Trip, TripId,
    TripUpdate, User, UserId,
};

/// Failures surfaced by the entity store, independent of the backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// Uniqueness or referential-integrity violation.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
