use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::format_km;
use crate::{
    error::AppError,
    models::trip::{MileageSummary, TripEntry},
    sanitize::parse_number,
    state::AppState,
};

const EARLIEST_DATE: &str = "0000-01-01";
const LATEST_DATE: &str = "9999-12-31";

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

#[derive(Debug, Default, Deserialize)]
pub struct TripFilter {
    q: Option<String>,
    from: Option<String>,
    to: Option<String>,
    min: Option<String>,
    max: Option<String>,
}

impl TripFilter {
    fn keywords(&self) -> Option<&str> {
        non_empty(&self.q)
    }

    fn date_range(&self) -> Option<(&str, &str)> {
        match (non_empty(&self.from), non_empty(&self.to)) {
            (None, None) => None,
            (from, to) => Some((from.unwrap_or(EARLIEST_DATE), to.unwrap_or(LATEST_DATE))),
        }
    }

    fn odometer_range(&self) -> Option<(f64, f64)> {
        let min = non_empty(&self.min).and_then(parse_number);
        let max = non_empty(&self.max).and_then(parse_number);
        match (min, max) {
            (None, None) => None,
            (min, max) => Some((min.unwrap_or(0.0), max.unwrap_or(f64::MAX))),
        }
    }

    fn is_active(&self) -> bool {
        self.keywords().is_some()
            || self.date_range().is_some()
            || self.odometer_range().is_some()
    }
}

struct TripRow {
    date: String,
    odometer: String,
    distance: String,
    description: String,
    photo: String,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    trips: Vec<TripRow>,
    trip_count: usize,
    total_distance: String,
    filtered: bool,
    q: String,
    from: String,
    to: String,
    min: String,
    max: String,
}

async fn home(
    State(state): State<AppState>,
    Query(filter): Query<TripFilter>,
) -> Result<impl IntoResponse, AppError> {
    let all = state.store.query_all().await?;
    let summary = MileageSummary::from_trips(&all);

    let mut trips = select_trips(&state, &filter, all).await?;
    TripEntry::sort_chronologically(&mut trips);
    trips.reverse();

    let rows = trips
        .into_iter()
        .map(|trip| TripRow {
            distance: summary
                .distance_for(trip.id)
                .map(|d| format!("+{}", format_km(d)))
                .unwrap_or_default(),
            odometer: format_km(trip.odometer),
            date: trip.date,
            description: trip.description,
            photo: trip.photo,
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(HomeTemplate {
        trips: rows,
        trip_count: summary.trip_count,
        total_distance: format_km(summary.total_distance),
        filtered: filter.is_active(),
        q: filter.q.clone().unwrap_or_default(),
        from: filter.from.clone().unwrap_or_default(),
        to: filter.to.clone().unwrap_or_default(),
        min: filter.min.clone().unwrap_or_default(),
        max: filter.max.clone().unwrap_or_default(),
    }))
}

/// Starts from the narrowest indexed lookup the filter allows and applies
/// the remaining conditions in memory.
async fn select_trips(
    state: &AppState,
    filter: &TripFilter,
    all: Vec<TripEntry>,
) -> Result<Vec<TripEntry>, AppError> {
    let mut trips = if let Some(keywords) = filter.keywords() {
        state.store.search_description(keywords).await?
    } else if let Some((from, to)) = filter.date_range() {
        state.store.query_by_date_range(from, to).await?
    } else if let Some((min, max)) = filter.odometer_range() {
        state.store.query_by_odometer_range(min, max).await?
    } else {
        return Ok(all);
    };

    if let Some((from, to)) = filter.date_range() {
        trips.retain(|t| t.date.as_str() >= from && t.date.as_str() <= to);
    }
    if let Some((min, max)) = filter.odometer_range() {
        trips.retain(|t| t.odometer >= min && t.odometer <= max);
    }
    Ok(trips)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(q: &str, from: &str, to: &str, min: &str, max: &str) -> TripFilter {
        let opt = |s: &str| Some(s.to_string());
        TripFilter {
            q: opt(q),
            from: opt(from),
            to: opt(to),
            min: opt(min),
            max: opt(max),
        }
    }

    #[test]
    fn blank_fields_are_ignored() {
        let f = filter(" ", "", "", "", "");
        assert!(!f.is_active());
        assert!(!TripFilter::default().is_active());
    }

    #[test]
    fn open_ended_ranges() {
        let f = filter("", "2024-05-01", "", "", "1000");
        assert_eq!(f.date_range(), Some(("2024-05-01", LATEST_DATE)));
        assert_eq!(f.odometer_range(), Some((0.0, 1000.0)));
    }

    #[test]
    fn unreadable_odometer_bounds_are_dropped() {
        let f = filter("", "", "", "abc", "");
        assert_eq!(f.odometer_range(), None);
    }
}
