use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{Train, Trip};

/// Availability search over trips. Dates compare against the UTC calendar date of the departure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilter {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TripFilter {
    /// `train` must be the train the trip runs on.
    pub fn matches(&self, trip: &Trip, train: &Train) -> bool {
        let departure = trip.starting_time_date.date_naive();

        self.source.as_ref().map_or(true, |s| *s == train.source)
            && self.destination.as_ref().map_or(true, |d| *d == train.destination)
            && self.date.map_or(true, |d| departure == d)
            && self.date_from.map_or(true, |d| departure >= d)
            && self.date_to.map_or(true, |d| departure <= d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TrainOrdering {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "-name")]
    NameDesc,
    #[default]
    #[serde(rename = "no")]
    No,
    #[serde(rename = "-no")]
    NoDesc,
}

impl TrainOrdering {
    /// ORDER BY clause for the `trains` table.
    pub fn sql(&self) -> &'static str {
        match self {
            TrainOrdering::Name => "name ASC, train_no ASC",
            TrainOrdering::NameDesc => "name DESC, train_no ASC",
            TrainOrdering::No => "train_no ASC",
            TrainOrdering::NoDesc => "train_no DESC",
        }
    }

    pub fn sort(&self, trains: &mut [Train]) {
        match self {
            TrainOrdering::Name => trains.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.no.cmp(&b.no))),
            TrainOrdering::NameDesc => trains.sort_by(|a, b| b.name.cmp(&a.name).then_with(|| a.no.cmp(&b.no))),
            TrainOrdering::No => trains.sort_by(|a, b| a.no.cmp(&b.no)),
            TrainOrdering::NoDesc => trains.sort_by(|a, b| b.no.cmp(&a.no)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainFilter {
    pub source: Option<String>,
    pub destination: Option<String>,
    /// Case-insensitive substring match on name or number.
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: TrainOrdering,
}

impl TrainFilter {
    pub fn matches(&self, train: &Train) -> bool {
        let search_hit = match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                train.name.to_lowercase().contains(&term) || train.no.to_lowercase().contains(&term)
            }
            None => true,
        };

        search_hit
            && self.source.as_ref().map_or(true, |s| *s == train.source)
            && self.destination.as_ref().map_or(true, |d| *d == train.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rajdhani() -> Train {
        Train {
            no: "12951".to_string(),
            name: "Mumbai Rajdhani".to_string(),
            source: "Mumbai".to_string(),
            destination: "Delhi".to_string(),
        }
    }

    fn trip_on(day: u32) -> Trip {
        Trip {
            id: 7,
            train_no: "12951".to_string(),
            starting_time_date: Utc.with_ymd_and_hms(2024, 12, day, 17, 0, 0).unwrap(),
            ending_time_date: Utc.with_ymd_and_hms(2024, 12, day + 1, 8, 30, 0).unwrap(),
            total_seats: 100,
            free_seats: 100,
        }
    }

    #[test]
    fn test_trip_filter_deserialization() {
        let json = r#"{ "source": "Mumbai", "date_from": "2024-12-20" }"#;
        let filter: TripFilter = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(filter.source.as_deref(), Some("Mumbai"));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 12, 20));
        assert!(filter.date.is_none());
    }

    #[test]
    fn test_trip_filter_dates() {
        let train = rajdhani();
        let trip = trip_on(25);

        let exact = TripFilter { date: NaiveDate::from_ymd_opt(2024, 12, 25), ..Default::default() };
        assert!(exact.matches(&trip, &train));

        let window = TripFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 12, 26),
            ..Default::default()
        };
        assert!(!window.matches(&trip, &train));

        let route = TripFilter {
            source: Some("Mumbai".to_string()),
            destination: Some("Chennai".to_string()),
            ..Default::default()
        };
        assert!(!route.matches(&trip, &train));
    }

    #[test]
    fn test_train_filter_search_and_ordering() {
        let filter: TrainFilter = serde_json::from_str(r#"{ "search": "rajdhani", "ordering": "-name" }"#).unwrap();
        assert_eq!(filter.ordering, TrainOrdering::NameDesc);
        assert!(filter.matches(&rajdhani()));

        let mut trains = vec![
            rajdhani(),
            Train { no: "12002".to_string(), name: "Bhopal Shatabdi".to_string(), ..rajdhani() },
        ];
        TrainOrdering::Name.sort(&mut trains);
        assert_eq!(trains[0].no, "12002");
        TrainOrdering::NoDesc.sort(&mut trains);
        assert_eq!(trains[0].no, "12951");
    }
}
