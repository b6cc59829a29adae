use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{extract::State, response::IntoResponse, routing::get, Router};

use crate::{error::AppError, models::trip::TripEntry, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/photos", get(photos))
}

struct PhotoCard {
    date: String,
    description: String,
    photo: String,
}

#[derive(Template)]
#[template(path = "photos.html")]
struct PhotosTemplate {
    photos: Vec<PhotoCard>,
}

async fn photos(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut trips = state.store.query_all().await?;
    trips.retain(TripEntry::has_photo);
    TripEntry::sort_chronologically(&mut trips);
    trips.reverse();

    let photos = trips
        .into_iter()
        .map(|trip| PhotoCard {
            date: trip.date,
            description: trip.description,
            photo: trip.photo,
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(PhotosTemplate {
        photos,
    }))
}
