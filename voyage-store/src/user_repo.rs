use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;
use voyage_core::repository::UserRepository;
use voyage_core::{RepoResult, RepositoryError, Role, User, UserPatch, WriteOutcome};
use voyage_shared::mask_email;

use crate::document::{decode, encode, Condition, DocumentStore, Filter, UpdateOutcome};

// A claim this old with no user behind it is left over from a failed create.
const ORPHAN_CLAIM_AGE_SECS: i64 = 60;

/// Users keyed by `userId`, plus one claim document per email in a second table.
/// The claim is taken with insert-if-absent, which is what makes email uniqueness atomic.
pub struct StoreUserRepository {
    store: Arc<dyn DocumentStore>,
    users: String,
    emails: String,
}

impl StoreUserRepository {
    pub fn new(store: Arc<dyn DocumentStore>, users_table: &str, emails_table: &str) -> Self {
        Self {
            store,
            users: users_table.to_string(),
            emails: emails_table.to_string(),
        }
    }

    async fn claimed_by(&self, email_key: &str) -> RepoResult<Option<EmailClaim>> {
        match self.store.get(&self.emails, email_key).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Take over a claim whose user record was never written.
    async fn reclaim_orphan(&self, email_key: &str, user_id: Uuid) -> RepoResult<bool> {
        let Some(claim) = self.claimed_by(email_key).await? else {
            return Ok(self
                .store
                .put_if_absent(&self.emails, email_key, &EmailClaim::new(user_id).to_doc()?)
                .await?);
        };
        let owner = claim.user_id;
        if Utc::now() - claim.claimed_at < Duration::seconds(ORPHAN_CLAIM_AGE_SECS)
            || self.find_by_id(owner).await?.is_some()
        {
            return Ok(false);
        }

        warn!("Reclaiming orphaned email claim for {}", mask_email(email_key));
        let changes = match EmailClaim::new(user_id).to_doc()? {
            Value::Object(fields) => fields,
            _ => serde_json::Map::new(),
        };
        let outcome = self
            .store
            .update(&self.emails, email_key, &changes, Some(&Condition::eq("userId", json!(owner))))
            .await?;
        Ok(matches!(outcome, UpdateOutcome::Applied(_)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailClaim {
    user_id: Uuid,
    claimed_at: DateTime<Utc>,
}

impl EmailClaim {
    fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            claimed_at: Utc::now(),
        }
    }

    fn to_doc(&self) -> RepoResult<Value> {
        encode(self)
    }
}

/// Emails are unique exactly as stored; only surrounding whitespace is ignored.
fn email_key(email: &str) -> &str {
    email.trim()
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        match self.store.get(&self.users, &id.to_string()).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        match self.claimed_by(email_key(email)).await? {
            Some(claim) => self.find_by_id(claim.user_id).await,
            None => Ok(None),
        }
    }

    async fn create(&self, user: &User) -> RepoResult<()> {
        let key = email_key(&user.email);
        let claim = EmailClaim::new(user.user_id).to_doc()?;

        let claimed = self.store.put_if_absent(&self.emails, key, &claim).await?
            || self.reclaim_orphan(key, user.user_id).await?;
        if !claimed {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                mask_email(key)
            )));
        }

        let doc = encode(user)?;
        if let Err(err) = self.store.put(&self.users, &user.user_id.to_string(), &doc).await {
            // Give the email back so the caller can retry.
            if let Err(release) = self.store.delete(&self.emails, key).await {
                error!("Failed to release email claim for {}: {}", mask_email(key), release);
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        expected_role: Option<Role>,
    ) -> RepoResult<WriteOutcome<User>> {
        let mut changes = patch.to_changes();
        if !changes.is_empty() {
            changes.insert("updatedAt".into(), json!(Utc::now()));
        }
        let condition = expected_role.map(|role| Condition::eq("role", role.as_str()));

        let outcome = self
            .store
            .update(&self.users, &id.to_string(), &changes, condition.as_ref())
            .await?;
        Ok(match outcome {
            UpdateOutcome::Applied(doc) => WriteOutcome::Applied(decode(doc)?),
            UpdateOutcome::Missing => WriteOutcome::Missing,
            UpdateOutcome::ConditionFailed => WriteOutcome::ConditionFailed,
        })
    }

    async fn list_pending_vendors(&self) -> RepoResult<Vec<User>> {
        let filter = Filter::all()
            .eq("role", Role::Vendor.as_str())
            .eq("vendorVerified", false);
        let mut vendors = self
            .store
            .scan(&self.users, &filter)
            .await?
            .into_iter()
            .map(decode)
            .collect::<RepoResult<Vec<User>>>()?;
        vendors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(vendors)
    }
}
