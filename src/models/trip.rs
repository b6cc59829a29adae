use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded odometer reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TripEntry {
    pub id: Option<i64>,
    /// `YYYY-MM-DD`, stored as entered.
    pub date: String,
    /// Milliseconds since the Unix epoch, set once at creation.
    pub timestamp: i64,
    pub odometer: f64,
    pub description: String,
    /// Inline image payload, usually a base64 `data:` URL.
    pub photo: String,
}

impl TripEntry {
    pub fn has_photo(&self) -> bool {
        !self.photo.is_empty()
    }

    /// Orders oldest first. Entries sharing a timestamp fall back to id order.
    pub fn sort_chronologically(trips: &mut [TripEntry]) {
        trips.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    }
}

/// A trip that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTripEntry {
    pub date: String,
    pub timestamp: i64,
    pub odometer: f64,
    pub description: String,
    pub photo: String,
}

impl NewTripEntry {
    /// Stamps the entry with the current time.
    pub fn now(date: impl Into<String>, odometer: f64, description: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            odometer,
            description: description.into(),
            photo: String::new(),
        }
    }

    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = photo.into();
        self
    }
}

/// Distance figures derived from consecutive odometer readings.
#[derive(Debug, Clone, PartialEq)]
pub struct MileageSummary {
    pub trip_count: usize,
    pub first_odometer: Option<f64>,
    pub last_odometer: Option<f64>,
    pub total_distance: f64,
    /// Distance since the previous reading, aligned with the chronological
    /// order of the input. `None` for the first trip.
    pub legs: Vec<(Option<i64>, Option<f64>)>,
}

impl MileageSummary {
    pub fn from_trips(trips: &[TripEntry]) -> Self {
        let mut ordered = trips.to_vec();
        TripEntry::sort_chronologically(&mut ordered);

        let legs = ordered
            .iter()
            .enumerate()
            .map(|(idx, trip)| {
                let distance = idx
                    .checked_sub(1)
                    .map(|prev| trip.odometer - ordered[prev].odometer);
                (trip.id, distance)
            })
            .collect();

        let first_odometer = ordered.first().map(|t| t.odometer);
        let last_odometer = ordered.last().map(|t| t.odometer);
        let total_distance = match (first_odometer, last_odometer) {
            (Some(first), Some(last)) if ordered.len() > 1 => last - first,
            _ => 0.0,
        };

        Self {
            trip_count: ordered.len(),
            first_odometer,
            last_odometer,
            total_distance,
            legs,
        }
    }

    pub fn distance_for(&self, id: Option<i64>) -> Option<f64> {
        self.legs
            .iter()
            .find(|(leg_id, _)| *leg_id == id)
            .and_then(|(_, distance)| *distance)
    }
}
