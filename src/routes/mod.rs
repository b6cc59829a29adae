pub mod add;
pub mod home;
pub mod photos;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Room for the text fields travelling next to the photo in one form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_photo_bytes + FORM_OVERHEAD_BYTES;
    Router::new()
        .merge(home::router())
        .merge(add::router())
        .merge(photos::router())
        .nest_service("/static", ServeDir::new(&state.config.static_root))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Formats a reading without a trailing `.0` for whole numbers.
pub(crate) fn format_km(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::format_km;

    #[test]
    fn km_formatting() {
        assert_eq!(format_km(12345.0), "12345");
        assert_eq!(format_km(12.34), "12.3");
        assert_eq!(format_km(0.0), "0");
    }
}
