use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use tracing::{info, warn};

use crate::{
    error::AppError,
    models::trip::NewTripEntry,
    sanitize::{sanitize_number, sanitize_text},
    state::AppState,
};

const DEFAULT_PHOTO_TYPE: &str = "image/jpeg";
const PHOTO_TOO_LARGE: &str = "That photo is too large to store.";

pub fn router() -> Router<AppState> {
    Router::new().route("/add", get(add_form).post(add_submit))
}

#[derive(Template)]
#[template(path = "add_trip.html")]
struct AddTripTemplate {
    show_error: bool,
    error_message: String,
    date: String,
    odometer: String,
    description: String,
}

async fn add_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(AddTripTemplate {
        show_error: false,
        error_message: String::new(),
        date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
        odometer: String::new(),
        description: String::new(),
    })
}

#[derive(Debug, Default)]
struct TripForm {
    date: String,
    odometer: String,
    description: String,
    photo: Option<Photo>,
    /// The body limit cut the upload short.
    truncated: bool,
}

#[derive(Debug)]
struct Photo {
    content_type: String,
    bytes: Vec<u8>,
}

impl Photo {
    fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

async fn add_submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;

    if form.truncated {
        warn!("photo rejected by body limit");
        return Ok(render_add_error(&form, PHOTO_TOO_LARGE));
    }
    if form.date.trim().is_empty() {
        return Ok(render_add_error(&form, "Please enter the date of the trip."));
    }
    if let Some(photo) = &form.photo {
        if photo.bytes.len() > state.config.max_photo_bytes {
            warn!(size = photo.bytes.len(), "photo rejected");
            return Ok(render_add_error(&form, PHOTO_TOO_LARGE));
        }
    }

    let odometer = sanitize_number(&form.odometer);
    if !odometer.is_finite() {
        return Ok(render_add_error(&form, "Please enter a valid odometer reading."));
    }

    let photo = form
        .photo
        .as_ref()
        .map(Photo::to_data_url)
        .unwrap_or_default();
    let entry = NewTripEntry::now(
        form.date.trim(),
        odometer,
        sanitize_text(form.description.trim()),
    )
    .with_photo(photo);

    let id = state.store.insert(&entry).await?;
    info!(id, date = %entry.date, "trip recorded");

    Ok(Redirect::to("/").into_response())
}

async fn read_form(mut multipart: Multipart) -> Result<TripForm, AppError> {
    let mut form = TripForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) if is_over_limit(&err) => {
                form.truncated = true;
                break;
            }
            Err(err) => return Err(AppError::BadRequest(err.to_string())),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "photo" => {
                let content_type = field
                    .content_type()
                    .filter(|ct| ct.starts_with("image/"))
                    .unwrap_or(DEFAULT_PHOTO_TYPE)
                    .to_string();
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(err) if is_over_limit(&err) => {
                        form.truncated = true;
                        break;
                    }
                    Err(err) => return Err(AppError::BadRequest(err.to_string())),
                };
                // browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    form.photo = Some(Photo {
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "date" | "odometer" | "description" => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(err) if is_over_limit(&err) => {
                        form.truncated = true;
                        break;
                    }
                    Err(err) => return Err(AppError::BadRequest(err.to_string())),
                };
                match name.as_str() {
                    "date" => form.date = text,
                    "odometer" => form.odometer = text,
                    _ => form.description = text,
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn is_over_limit(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn render_add_error(form: &TripForm, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(AddTripTemplate {
            show_error: true,
            error_message: message.to_string(),
            date: form.date.clone(),
            odometer: form.odometer.clone(),
            description: form.description.clone(),
        }),
    )
        .into_response()
}
