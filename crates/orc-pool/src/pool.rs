use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use orc_types::ProviderCatalog;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time;

use crate::error::PoolError;

/// Caller-chosen admission behavior when a provider or the global pool is
/// at capacity (spec §4.5 "Backpressure").
#[derive(Debug, Clone, Copy)]
pub enum BackpressurePolicy {
    Block,
    FailImmediately,
    FailAfterDeadline(Duration),
}

struct ProviderState {
    max_concurrency: usize,
    in_flight: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

struct GlobalState {
    global_max: usize,
    total_in_flight: usize,
}

/// Per-provider and global admission counters plus a FIFO wait queue per
/// provider (spec §3 "Pool state", §4.5 "Admission"/"Release").
pub struct Pool {
    providers: Mutex<HashMap<String, ProviderState>>,
    global: Mutex<GlobalState>,
}

/// An admitted slot; dropping it releases the provider and global counters
/// and admits the next FIFO waiter for that provider, if capacity allows.
pub struct PoolPermit {
    pool: Arc<Pool>,
    provider: String,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        self.pool.release(&self.provider);
    }
}

impl Pool {
    pub fn new(global_max: usize) -> Arc<Self> {
        Arc::new(Self {
            providers: Mutex::new(HashMap::new()),
            global: Mutex::new(GlobalState {
                global_max,
                total_in_flight: 0,
            }),
        })
    }

    /// Builds a pool with one registered provider per catalog entry, using
    /// each provider's `max_concurrency` from `providers.yaml`.
    pub fn from_catalog(catalog: &ProviderCatalog, global_max: usize) -> Arc<Self> {
        let pool = Self::new(global_max);
        for provider in catalog.iter() {
            pool.register_provider(&provider.name, provider.max_concurrency as usize);
        }
        pool
    }

    pub fn register_provider(&self, name: impl Into<String>, max_concurrency: usize) {
        self.providers
            .lock()
            .entry(name.into())
            .or_insert_with(|| ProviderState {
                max_concurrency,
                in_flight: 0,
                waiters: VecDeque::new(),
            });
    }

    /// Admits a worker for `provider`, applying `policy` when the provider
    /// or the global pool is saturated.
    pub async fn acquire(
        self: &Arc<Self>,
        provider: &str,
        policy: BackpressurePolicy,
    ) -> Result<PoolPermit, PoolError> {
        if !self.providers.lock().contains_key(provider) {
            return Err(PoolError::UnknownProvider(provider.to_string()));
        }

        if self.try_admit(provider) {
            return Ok(self.permit(provider));
        }

        match policy {
            BackpressurePolicy::FailImmediately => Err(PoolError::Saturated(provider.to_string())),
            BackpressurePolicy::Block => {
                let rx = self.enqueue(provider);
                rx.await.map_err(|_| PoolError::Saturated(provider.to_string()))?;
                Ok(self.permit(provider))
            }
            BackpressurePolicy::FailAfterDeadline(deadline) => {
                let rx = self.enqueue(provider);
                match time::timeout(deadline, rx).await {
                    Ok(Ok(())) => Ok(self.permit(provider)),
                    _ => Err(PoolError::Saturated(provider.to_string())),
                }
            }
        }
    }

    fn permit(self: &Arc<Self>, provider: &str) -> PoolPermit {
        PoolPermit {
            pool: self.clone(),
            provider: provider.to_string(),
        }
    }

    fn try_admit(&self, provider: &str) -> bool {
        let mut providers = self.providers.lock();
        let mut global = self.global.lock();
        let Some(state) = providers.get_mut(provider) else {
            return false;
        };
        if state.in_flight < state.max_concurrency && global.total_in_flight < global.global_max {
            state.in_flight += 1;
            global.total_in_flight += 1;
            true
        } else {
            false
        }
    }

    fn enqueue(&self, provider: &str) -> oneshot::Receiver<()> {
        let mut providers = self.providers.lock();
        let (tx, rx) = oneshot::channel();
        // Registration is checked by `acquire` before this is called.
        providers.get_mut(provider).expect("provider registered").waiters.push_back(tx);
        rx
    }

    fn release(&self, provider: &str) {
        let mut providers = self.providers.lock();
        let mut global = self.global.lock();
        let Some(state) = providers.get_mut(provider) else {
            return;
        };
        state.in_flight = state.in_flight.saturating_sub(1);
        global.total_in_flight = global.total_in_flight.saturating_sub(1);

        while let Some(waiter) = state.waiters.pop_front() {
            if state.in_flight < state.max_concurrency && global.total_in_flight < global.global_max
            {
                state.in_flight += 1;
                global.total_in_flight += 1;
                if waiter.send(()).is_err() {
                    // Caller gave up waiting; undo the grant and try the next one.
                    state.in_flight -= 1;
                    global.total_in_flight -= 1;
                    continue;
                }
                break;
            } else {
                state.waiters.push_front(waiter);
                break;
            }
        }
    }

    pub fn in_flight(&self, provider: &str) -> usize {
        self.providers.lock().get(provider).map(|s| s.in_flight).unwrap_or(0)
    }

    pub fn total_in_flight(&self) -> usize {
        self.global.lock().total_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_request_fails_immediately_when_saturated() {
        let pool = Pool::new(4);
        pool.register_provider("p", 1);

        let _permit = pool
            .acquire("p", BackpressurePolicy::FailImmediately)
            .await
            .unwrap();
        let err = pool.acquire("p", BackpressurePolicy::FailImmediately).await;
        assert!(matches!(err, Err(PoolError::Saturated(_))));
    }

    #[tokio::test]
    async fn fifo_waiter_is_admitted_on_release() {
        let pool = Pool::new(4);
        pool.register_provider("p", 1);

        let permit = pool
            .acquire("p", BackpressurePolicy::FailImmediately)
            .await
            .unwrap();

        let pool_clone = pool.clone();
        let waiter = tokio::spawn(async move {
            pool_clone.acquire("p", BackpressurePolicy::Block).await.unwrap();
        });

        tokio::task::yield_now().await;
        assert_eq!(pool.in_flight("p"), 1);

        drop(permit);
        waiter.await.unwrap();
        assert_eq!(pool.in_flight("p"), 1);
    }

    #[tokio::test]
    async fn deadline_elapses_before_release() {
        let pool = Pool::new(4);
        pool.register_provider("p", 1);

        let _permit = pool
            .acquire("p", BackpressurePolicy::FailImmediately)
            .await
            .unwrap();

        let err = pool
            .acquire(
                "p",
                BackpressurePolicy::FailAfterDeadline(Duration::from_millis(20)),
            )
            .await;
        assert!(matches!(err, Err(PoolError::Saturated(_))));
    }

    #[tokio::test]
    async fn global_cap_blocks_admission_even_with_provider_headroom() {
        let pool = Pool::new(1);
        pool.register_provider("a", 4);
        pool.register_provider("b", 4);

        let _permit = pool
            .acquire("a", BackpressurePolicy::FailImmediately)
            .await
            .unwrap();
        let err = pool.acquire("b", BackpressurePolicy::FailImmediately).await;
        assert!(matches!(err, Err(PoolError::Saturated(_))));
    }
}
