pub mod engine;
pub mod locks;

pub use engine::{BookingResult, CheckStage, ReservationEngine, ReservationError};
pub use locks::{TripLockGuard, TripLocks};
