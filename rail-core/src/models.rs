use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type TripId = i64;
pub type BookingId = i64;
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub no: String,
    pub name: String,
    pub source: String,
    pub destination: String,
}

/// Mutable train attributes; the train number is the identity and never changes.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainUpdate {
    pub name: String,
    pub source: String,
    pub destination: String,
}

/// A scheduled run of a train.
///
/// `free_seats` is owned by the reservation engine: CRUD paths create it equal to
/// `total_seats` and never write it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub train_no: String,
    pub starting_time_date: DateTime<Utc>,
    pub ending_time_date: DateTime<Utc>,
    pub total_seats: i32,
    pub free_seats: i32,
}

impl Trip {
    pub fn booked_seats(&self) -> i32 {
        self.total_seats - self.free_seats
    }

    pub fn can_seat(&self, requested: i32) -> bool {
        requested <= self.free_seats
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub train_no: String,
    pub starting_time_date: DateTime<Utc>,
    pub ending_time_date: DateTime<Utc>,
    pub total_seats: i32,
}

impl NewTrip {
    pub fn validate(&self) -> Result<(), String> {
        if self.total_seats < 1 {
            return Err("total_seats must be at least 1".to_string());
        }
        validate_window(&self.starting_time_date, &self.ending_time_date)
    }
}

/// Schedule changes for an existing trip. Capacity is fixed at creation.
#[derive(Debug, Clone, Deserialize)]
pub struct TripUpdate {
    pub train_no: String,
    pub starting_time_date: DateTime<Utc>,
    pub ending_time_date: DateTime<Utc>,
}

impl TripUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_window(&self.starting_time_date, &self.ending_time_date)
    }
}

fn validate_window(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<(), String> {
    if end <= start {
        return Err("ending_time_date must be after starting_time_date".to_string());
    }
    Ok(())
}

/// The cumulative seats one user holds on one trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub trip_id: TripId,
    pub booking_timestamp: DateTime<Utc>,
    pub seat_count: i32,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub trip_id: TripId,
    pub booking_timestamp: DateTime<Utc>,
    pub seat_count: i32,
}
