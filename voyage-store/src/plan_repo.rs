use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use voyage_core::repository::PlanRepository;
use voyage_core::{Plan, PlanPatch, RepoResult, WriteOutcome};

use crate::document::{decode, encode, DocumentStore, Filter, UpdateOutcome};

pub struct StorePlanRepository {
    store: Arc<dyn DocumentStore>,
    table: String,
}

impl StorePlanRepository {
    pub fn new(store: Arc<dyn DocumentStore>, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }

    async fn scan_sorted(&self, filter: Filter) -> RepoResult<Vec<Plan>> {
        let mut plans = self
            .store
            .scan(&self.table, &filter)
            .await?
            .into_iter()
            .map(decode)
            .collect::<RepoResult<Vec<Plan>>>()?;
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }
}

#[async_trait]
impl PlanRepository for StorePlanRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Plan>> {
        match self.store.get(&self.table, &id.to_string()).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn list_active(&self) -> RepoResult<Vec<Plan>> {
        self.scan_sorted(Filter::all().eq("isActive", true)).await
    }

    async fn list_by_vendor(&self, vendor_id: Uuid) -> RepoResult<Vec<Plan>> {
        self.scan_sorted(Filter::all().eq("vendorId", vendor_id.to_string()))
            .await
    }

    async fn create(&self, plan: &Plan) -> RepoResult<()> {
        let doc = encode(plan)?;
        self.store
            .put(&self.table, &plan.plan_id.to_string(), &doc)
            .await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &PlanPatch) -> RepoResult<WriteOutcome<Plan>> {
        let mut changes = patch.to_changes();
        if !changes.is_empty() {
            changes.insert("updatedAt".into(), json!(Utc::now()));
        }

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

    async fn deactivate(&self, id: Uuid) -> RepoResult<WriteOutcome<Plan>> {
        self.update(id, &PlanPatch::deactivate()).await
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.store.delete(&self.table, &id.to_string()).await?)
    }
}
