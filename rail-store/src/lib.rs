pub mod app_config;
pub mod database;
pub mod memory;

pub mod booking_repo;
pub mod reservation_store;
pub mod station_repo;
pub mod train_repo;
pub mod trip_repo;
pub mod user_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use reservation_store::PgReservationStore;
pub use station_repo::PgStationRepository;
pub use train_repo::PgTrainRepository;
pub use trip_repo::PgTripRepository;
pub use user_repo::PgUserRepository;
