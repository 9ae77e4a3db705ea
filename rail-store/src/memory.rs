//! In-process entity store.
//!
//! Mirrors the constraints of the PostgreSQL schema (unique keys, restricted and cascading
//! deletes) so handlers and the reservation engine behave the same on both backends. Used
//! by the test suites and by `storage.backend = "memory"` for local runs.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rail_core::repository::{
    BookingRepository, ReservationStore, ReservationTx, StationRepository, TrainRepository,
    TripRepository, UserRepository,
};
use rail_core::search::{TrainFilter, TripFilter};
use rail_core::{
    Booking, BookingId, NewBooking, NewTrip, NewUser, Station, StoreError, StoreResult, Train,
    TrainUpdate, Trip, TripId, TripUpdate, User, UserId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    stations: BTreeMap<String, Station>,
    trains: BTreeMap<String, Train>,
    trips: BTreeMap<TripId, Trip>,
    bookings: BTreeMap<BookingId, Booking>,
    users: HashMap<UserId, User>,
    last_trip_id: TripId,
    last_booking_id: BookingId,
}

impl Tables {
    fn require_station(&self, name: &str) -> StoreResult<()> {
        if self.stations.contains_key(name) {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!("Station {} does not exist", name)))
        }
    }

    fn require_train(&self, no: &str) -> StoreResult<()> {
        if self.trains.contains_key(no) {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!("Train {} does not exist", no)))
        }
    }

    fn trip_has_bookings(&self, trip_id: TripId) -> bool {
        self.bookings.values().any(|b| b.trip_id == trip_id)
    }

    fn find_booking(&self, user_id: UserId, trip_id: TripId) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.user_id == user_id && b.trip_id == trip_id)
    }

    /// Enforces the (train, start) and (train, end) unique keys.
    fn check_schedule_unique(
        &self,
        train_no: &str,
        trip: (&chrono::DateTime<Utc>, &chrono::DateTime<Utc>),
        except: Option<TripId>,
    ) -> StoreResult<()> {
        let (start, end) = trip;
        let clash = self.trips.values().any(|t| {
            Some(t.id) != except
                && t.train_no == train_no
                && (t.starting_time_date == *start || t.ending_time_date == *end)
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "Train {} already has a trip with this schedule",
                train_no
            )));
        }
        Ok(())
    }
}

/// Shared handle to the in-memory tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StationRepository for MemoryStore {
    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        Ok(self.tables.lock().stations.values().cloned().collect())
    }

    async fn get_station(&self, name: &str) -> StoreResult<Option<Station>> {
        Ok(self.tables.lock().stations.get(name).cloned())
    }

    async fn create_station(&self, station: &Station) -> StoreResult<Station> {
        let mut tables = self.tables.lock();
        if tables.stations.contains_key(&station.name) {
            return Err(StoreError::Conflict(format!("Station {} already exists", station.name)));
        }
        tables.stations.insert(station.name.clone(), station.clone());
        Ok(station.clone())
    }

    async fn rename_station(&self, name: &str, station: &Station) -> StoreResult<Station> {
        let mut tables = self.tables.lock();
        if !tables.stations.contains_key(name) {
            return Err(StoreError::NotFound(format!("Station {}", name)));
        }
        if station.name != name && tables.stations.contains_key(&station.name) {
            return Err(StoreError::Conflict(format!("Station {} already exists", station.name)));
        }

        tables.stations.remove(name);
        tables.stations.insert(station.name.clone(), station.clone());
        for train in tables.trains.values_mut() {
            if train.source == name {
                train.source = station.name.clone();
            }
            if train.destination == name {
                train.destination = station.name.clone();
            }
        }
        Ok(station.clone())
    }

    async fn delete_station(&self, name: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if !tables.stations.contains_key(name) {
            return Err(StoreError::NotFound(format!("Station {}", name)));
        }
        if tables.trains.values().any(|t| t.source == name || t.destination == name) {
            return Err(StoreError::Conflict(format!("Station {} is used by a train", name)));
        }
        tables.stations.remove(name);
        Ok(())
    }
}

#[async_trait]
impl TrainRepository for MemoryStore {
    async fn list_trains(&self, filter: &TrainFilter) -> StoreResult<Vec<Train>> {
        let mut trains: Vec<Train> = self
            .tables
            .lock()
            .trains
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        filter.ordering.sort(&mut trains);
        Ok(trains)
    }

    async fn get_train(&self, no: &str) -> StoreResult<Option<Train>> {
        Ok(self.tables.lock().trains.get(no).cloned())
    }

    async fn create_train(&self, train: &Train) -> StoreResult<Train> {
        let mut tables = self.tables.lock();
        if tables.trains.contains_key(&train.no) {
            return Err(StoreError::Conflict(format!("Train {} already exists", train.no)));
        }
        tables.require_station(&train.source)?;
        tables.require_station(&train.destination)?;
        tables.trains.insert(train.no.clone(), train.clone());
        Ok(train.clone())
    }

    async fn update_train(&self, no: &str, update: &TrainUpdate) -> StoreResult<Train> {
        let mut tables = self.tables.lock();
        tables.require_station(&update.source)?;
        tables.require_station(&update.destination)?;

        let train = tables
            .trains
            .get_mut(no)
            .ok_or_else(|| StoreError::NotFound(format!("Train {}", no)))?;
        train.name = update.name.clone();
        train.source = update.source.clone();
        train.destination = update.destination.clone();
        Ok(train.clone())
    }

    async fn delete_train(&self, no: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if !tables.trains.contains_key(no) {
            return Err(StoreError::NotFound(format!("Train {}", no)));
        }

        let trip_ids: Vec<TripId> = tables
            .trips
            .values()
            .filter(|t| t.train_no == no)
            .map(|t| t.id)
            .collect();
        if trip_ids.iter().any(|id| tables.trip_has_bookings(*id)) {
            return Err(StoreError::Conflict(format!("Train {} has trips with bookings", no)));
        }

        for id in trip_ids {
            tables.trips.remove(&id);
        }
        tables.trains.remove(no);
        Ok(())
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn list_trips(&self, filter: &TripFilter) -> StoreResult<Vec<Trip>> {
        let tables = self.tables.lock();
        let mut trips: Vec<Trip> = tables
            .trips
            .values()
            .filter(|trip| {
                tables
                    .trains
                    .get(&trip.train_no)
                    .is_some_and(|train| filter.matches(trip, train))
            })
            .cloned()
            .collect();
        trips.sort_by(|a, b| {
            a.starting_time_date
                .cmp(&b.starting_time_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(trips)
    }

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        Ok(self.tables.lock().trips.get(&id).cloned())
    }

    async fn create_trip(&self, trip: &NewTrip) -> StoreResult<Trip> {
        let mut tables = self.tables.lock();
        tables.require_train(&trip.train_no)?;
        tables.check_schedule_unique(
            &trip.train_no,
            (&trip.starting_time_date, &trip.ending_time_date),
            None,
        )?;

        tables.last_trip_id += 1;
        let created = Trip {
            id: tables.last_trip_id,
            train_no: trip.train_no.clone(),
            starting_time_date: trip.starting_time_date,
            ending_time_date: trip.ending_time_date,
            total_seats: trip.total_seats,
            free_seats: trip.total_seats,
        };
        tables.trips.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_trip(&self, id: TripId, update: &TripUpdate) -> StoreResult<Trip> {
        let mut tables = self.tables.lock();
        if !tables.trips.contains_key(&id) {
            return Err(StoreError::NotFound(format!("Trip {}", id)));
        }
        tables.require_train(&update.train_no)?;
        tables.check_schedule_unique(
            &update.train_no,
            (&update.starting_time_date, &update.ending_time_date),
            Some(id),
        )?;

        let trip = tables
            .trips
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Trip {}", id)))?;
        trip.train_no = update.train_no.clone();
        trip.starting_time_date = update.starting_time_date;
        trip.ending_time_date = update.ending_time_date;
        Ok(trip.clone())
    }

    async fn delete_trip(&self, id: TripId) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if !tables.trips.contains_key(&id) {
            return Err(StoreError::NotFound(format!("Trip {}", id)));
        }
        if tables.trip_has_bookings(id) {
            return Err(StoreError::Conflict(format!("Trip {} has bookings", id)));
        }
        tables.trips.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn list_bookings(&self, user_id: UserId, trip_id: Option<TripId>) -> StoreResult<Vec<Booking>> {
        Ok(self
            .tables
            .lock()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && trip_id.map_or(true, |t| b.trip_id == t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("Username {} is taken", user.username)));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        Ok(self.tables.lock().trips.get(&id).cloned())
    }

    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>> {
        Ok(Box::new(MemoryTx {
            tables: self.tables.clone(),
            read_trips: HashMap::new(),
            staged_trips: HashMap::new(),
            staged_bookings: BTreeMap::new(),
            inserted: HashSet::new(),
        }))
    }
}

/// Buffers writes and applies them in one critical section on commit.
///
/// Trips read through `lock_trip` are re-validated at commit time: if the committed row no
/// longer matches what was read, the commit fails with `Conflict` and nothing is applied.
struct MemoryTx {
    tables: Arc<Mutex<Tables>>,
    read_trips: HashMap<TripId, Trip>,
    staged_trips: HashMap<TripId, Trip>,
    staged_bookings: BTreeMap<BookingId, Booking>,
    inserted: HashSet<BookingId>,
}

#[async_trait]
impl ReservationTx for MemoryTx {
    async fn lock_trip(&mut self, id: TripId) -> StoreResult<Option<Trip>> {
        if let Some(staged) = self.staged_trips.get(&id) {
            return Ok(Some(staged.clone()));
        }
        let trip = self.tables.lock().trips.get(&id).cloned();
        if let Some(trip) = &trip {
            self.read_trips.insert(id, trip.clone());
        }
        Ok(trip)
    }

    async fn save_trip(&mut self, trip: &Trip) -> StoreResult<()> {
        if !self.tables.lock().trips.contains_key(&trip.id) {
            return Err(StoreError::NotFound(format!("Trip {}", trip.id)));
        }
        self.staged_trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn get_booking(&mut self, user_id: UserId, trip_id: TripId) -> StoreResult<Option<Booking>> {
        let staged = self
            .staged_bookings
            .values()
            .find(|b| b.user_id == user_id && b.trip_id == trip_id)
            .cloned();
        if staged.is_some() {
            return Ok(staged);
        }
        Ok(self.tables.lock().find_booking(user_id, trip_id).cloned())
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking> {
        let staged_clash = self
            .staged_bookings
            .values()
            .any(|b| b.user_id == booking.user_id && b.trip_id == booking.trip_id);

        let mut tables = self.tables.lock();
        if staged_clash || tables.find_booking(booking.user_id, booking.trip_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "Booking for trip {} already exists",
                booking.trip_id
            )));
        }
        // Ids are never reused, even when this transaction rolls back.
        tables.last_booking_id += 1;
        let created = Booking {
            id: tables.last_booking_id,
            user_id: booking.user_id,
            trip_id: booking.trip_id,
            booking_timestamp: booking.booking_timestamp,
            seat_count: booking.seat_count,
        };
        drop(tables);

        self.inserted.insert(created.id);
        self.staged_bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let known = self.staged_bookings.contains_key(&booking.id)
            || self.tables.lock().bookings.contains_key(&booking.id);
        if !known {
            return Err(StoreError::NotFound(format!("Booking {}", booking.id)));
        }
        self.staged_bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut tables = self.tables.lock();

        for (id, read) in &self.read_trips {
            if self.staged_trips.contains_key(id) && tables.trips.get(id) != Some(read) {
                return Err(StoreError::Conflict(format!("Trip {} changed concurrently", id)));
            }
        }
        for id in self.staged_trips.keys() {
            if !tables.trips.contains_key(id) {
                return Err(StoreError::NotFound(format!("Trip {}", id)));
            }
        }
        for booking in self.staged_bookings.values() {
            if self.inserted.contains(&booking.id) {
                if tables.find_booking(booking.user_id, booking.trip_id).is_some() {
                    return Err(StoreError::Conflict(format!(
                        "Booking for trip {} already exists",
                        booking.trip_id
                    )));
                }
            } else if !tables.bookings.contains_key(&booking.id) {
                return Err(StoreError::NotFound(format!("Booking {}", booking.id)));
            }
        }

        for (id, trip) in self.staged_trips.drain() {
            tables.trips.insert(id, trip);
        }
        for (id, booking) in std::mem::take(&mut self.staged_bookings) {
            tables.bookings.insert(id, booking);
        }
        self.read_trips.clear();
        self.inserted.clear();
        Ok(())
    }
}
