use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};
use std::sync::Arc;
use uuid::Uuid;
use voyage_core::repository::BookingRepository;
use voyage_core::{Booking, PaymentStatus, RepoResult, WriteOutcome};

use crate::document::{decode, encode, DocumentStore, Filter, UpdateOutcome};

pub struct StoreBookingRepository {
    store: Arc<dyn DocumentStore>,
    table: String,
}

impl StoreBookingRepository {
    pub fn new(store: Arc<dyn DocumentStore>, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create(&self, booking: &Booking) -> RepoResult<()> {
        let doc = encode(booking)?;
        self.store
            .put(&self.table, &booking.booking_id.to_string(), &doc)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        match self.store.get(&self.table, &id.to_string()).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        let filter = Filter::all().eq("userId", user_id.to_string());
        let mut bookings = self
            .store
            .scan(&self.table, &filter)
            .await?
            .into_iter()
            .map(decode)
            .collect::<RepoResult<Vec<Booking>>>()?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> RepoResult<WriteOutcome<Booking>> {
        let mut changes = Map::new();
        changes.insert("paymentStatus".into(), json!(status));
        changes.insert("updatedAt".into(), json!(Utc::now()));

        let outcome = self
            .store
            .update(&self.table, &id.to_string(), &changes, None)
            .await?;
        Ok(match outcome {
            UpdateOutcome::Applied(doc) => WriteOutcome::Applied(decode(doc)?),
            UpdateOutcome::Missing => WriteOutcome::Missing,
            UpdateOutcome::ConditionFailed => WriteOutcome::ConditionFailed,
        })
    }
}
