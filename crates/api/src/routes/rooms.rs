//! Ledger and catalog endpoints.
//!
//! These are what a remote orchestrator calls through `HttpLedgerClient`
//! and `HttpRecommender`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{DateRange, HotelId, RoomId};
use ledger::{
    AvailabilityLedger, AvailabilityRequest, DateClaim, Hotel, LedgerError, NewHotel, NewRoom,
    Room, RoomCatalog,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub hotel_id: Option<HotelId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RecommendQuery {
    fn range(&self) -> Result<Option<DateRange>, ApiError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end))),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest(
                "start_date and end_date must be given together".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub available: bool,
}

/// POST /rooms/{id}/confirm-availability — claims the dates, answering
/// whether the claim succeeded.
#[tracing::instrument(skip(state, req), fields(start = %req.start_date, end = %req.end_date))]
pub async fn confirm_availability(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<bool>, ApiError> {
    let claimed = state
        .ledger
        .claim(RoomId::new(room_id), req.range(), req.booking_id)
        .await?;
    Ok(Json(claimed))
}

/// POST /rooms/{id}/release
#[tracing::instrument(skip(state, req), fields(start = %req.start_date, end = %req.end_date))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .release(RoomId::new(room_id), req.range(), req.booking_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rooms/recommend — available rooms, least booked first.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let range = query.range()?;
    let rooms = state.catalog.recommend(query.hotel_id, range).await?;
    Ok(Json(rooms))
}

/// GET /rooms
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRoomsQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.catalog.list_rooms(query.available).await?))
}

/// POST /rooms
pub async fn add(
    State(state): State<Arc<AppState>>,
    Json(room): Json<NewRoom>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state.catalog.add_room(room).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /rooms/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> Result<Json<Room>, ApiError> {
    let room_id = RoomId::new(room_id);
    let room = state
        .catalog
        .get_room(room_id)
        .await?
        .ok_or(LedgerError::RoomNotFound(room_id))?;
    Ok(Json(room))
}

/// GET /rooms/{id}/claims
pub async fn claims(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<DateClaim>>, ApiError> {
    let room_id = RoomId::new(room_id);
    if state.catalog.get_room(room_id).await?.is_none() {
        return Err(LedgerError::RoomNotFound(room_id).into());
    }
    Ok(Json(state.ledger.claimed_dates(room_id).await?))
}

/// GET /hotels
pub async fn list_hotels(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Hotel>>, ApiError> {
    Ok(Json(state.catalog.list_hotels().await?))
}

/// POST /hotels
pub async fn add_hotel(
    State(state): State<Arc<AppState>>,
    Json(hotel): Json<NewHotel>,
) -> Result<(StatusCode, Json<Hotel>), ApiError> {
    if hotel.name.trim().is_empty() {
        return Err(ApiError::BadRequest("hotel name must not be empty".to_string()));
    }
    let hotel = state.catalog.add_hotel(hotel).await?;
    Ok((StatusCode::CREATED, Json(hotel)))
}
