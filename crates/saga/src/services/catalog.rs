//! Room recommendation for auto-selected bookings.

use std::sync::Arc;

use async_trait::async_trait;
use common::{DateRange, HotelId, RoomId};
use ledger::{Room, RoomCatalog};
use reqwest::Client;

use super::RemoteError;

/// Picks a room when the caller asks for automatic selection.
#[async_trait]
pub trait RoomRecommender: Send + Sync {
    /// The least-booked available room free over `range`, ties broken by
    /// lowest id. `None` when nothing qualifies.
    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: DateRange,
    ) -> Result<Option<RoomId>, RemoteError>;
}

#[async_trait]
impl<T: RoomRecommender + ?Sized> RoomRecommender for Arc<T> {
    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: DateRange,
    ) -> Result<Option<RoomId>, RemoteError> {
        (**self).recommend(hotel_id, range).await
    }
}

/// Reads recommendations from a catalog in the same process.
#[derive(Clone)]
pub struct InProcessRecommender<R> {
    catalog: R,
}

impl<R: RoomCatalog> InProcessRecommender<R> {
    pub fn new(catalog: R) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl<R: RoomCatalog> RoomRecommender for InProcessRecommender<R> {
    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: DateRange,
    ) -> Result<Option<RoomId>, RemoteError> {
        let rooms = self.catalog.recommend(hotel_id, Some(range)).await?;
        Ok(rooms.first().map(|room| room.id))
    }
}

/// Reads recommendations from `GET /rooms/recommend` on a remote server.
#[derive(Clone)]
pub struct HttpRecommender {
    client: Client,
    base_url: String,
}

impl HttpRecommender {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn recommend_url(&self, hotel_id: Option<HotelId>, range: DateRange) -> String {
        let mut url = format!(
            "{}/rooms/recommend?start_date={}&end_date={}",
            self.base_url, range.start_date, range.end_date
        );
        if let Some(hotel_id) = hotel_id {
            url.push_str(&format!("&hotel_id={hotel_id}"));
        }
        url
    }
}

#[async_trait]
impl RoomRecommender for HttpRecommender {
    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: DateRange,
    ) -> Result<Option<RoomId>, RemoteError> {
        let rooms: Vec<Room> = self
            .client
            .get(self.recommend_url(hotel_id, range))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rooms.first().map(|room| room.id))
    }
}
