//! Booking endpoints backed by the saga orchestrator.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use booking_store::{Booking, BookingStatus};
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, DateRange, HotelId, RequestId, RoomId, UserId};
use saga::CreateBooking;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller identity resolved upstream.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, taken from the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct CallerId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(UserId::new(value)))
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))
    }
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub room_id: Option<RoomId>,
    pub hotel_id: Option<HotelId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub auto_select: bool,
    #[serde(default)]
    pub request_id: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            room_id: booking.room_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
            status: booking.status,
            request_id: booking.request_id,
            created_at: booking.created_at,
        }
    }
}

fn to_responses(bookings: Vec<Booking>) -> Json<Vec<BookingResponse>> {
    Json(bookings.into_iter().map(BookingResponse::from).collect())
}

// -- Handlers --

/// POST /bookings — runs the booking saga for the caller.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let range = DateRange::new(req.start_date, req.end_date);
    let request_id = RequestId::new(req.request_id.unwrap_or_default());

    let command = match (req.auto_select, req.room_id) {
        (true, _) => CreateBooking::auto_select(caller, req.hotel_id, range, request_id),
        (false, Some(room_id)) => CreateBooking::for_room(caller, room_id, range, request_id),
        (false, None) => {
            return Err(ApiError::BadRequest(
                "room_id is required unless auto_select is set".to_string(),
            ));
        }
    };

    let booking = state.orchestrator.create_booking(command).await?;
    Ok(Json(booking.into()))
}

/// GET /bookings — lists all bookings, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    _caller: CallerId,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.orchestrator.list_bookings().await?;
    Ok(to_responses(bookings))
}

/// GET /bookings/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    _caller: CallerId,
    Path(id): Path<i64>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.orchestrator.get_booking(BookingId::new(id)).await?;
    Ok(Json(booking.into()))
}

/// DELETE /bookings/{id}
#[tracing::instrument(skip(state, _caller))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _caller: CallerId,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_booking(BookingId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me/bookings — the caller's own bookings.
pub async fn mine(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.orchestrator.list_user_bookings(&caller).await?;
    Ok(to_responses(bookings))
}
