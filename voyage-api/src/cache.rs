use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use voyage_core::{Plan, RepoResult};

/// Memoized public plan listing.
///
/// Entries expire after `ttl`; plan writes call [`invalidate`](Self::invalidate).
/// A load that started before an invalidation is returned to its caller but not kept.
pub struct PlanListingCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    entry: Option<(Arc<Vec<Plan>>, Instant)>,
}

impl PlanListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn get_or_load<F, Fut>(&self, load: F) -> RepoResult<Arc<Vec<Plan>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepoResult<Vec<Plan>>>,
    {
        let generation = {
            let state = self.state.read().await;
            if let Some((plans, fetched_at)) = &state.entry {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(plans.clone());
                }
            }
            state.generation
        };

        let plans = Arc::new(load().await?);

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.entry = Some((plans.clone(), Instant::now()));
        }
        Ok(plans)
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.entry = None;
        tracing::debug!("Plan listing cache invalidated");
    }
}
