use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tracing::debug;

use crate::error::AnalysisError;
use crate::identity::Identity;
use crate::risk::RiskAssessment;

/// Assessments stay fresh for five minutes; expiry is lazy, so a stale
/// entry is simply recomputed and overwritten on the next access.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

type Outcome = Result<RiskAssessment, AnalysisError>;

#[derive(Debug, Clone)]
struct StoredEntry {
    assessment: RiskAssessment,
    stored_at: SystemTime,
    /// Request token of the computation that wrote this entry. Writes
    /// from earlier-requested, slower computations are refused, so the
    /// cache always reflects the most recently requested result.
    token: u64,
}

#[derive(Debug, Clone)]
struct InFlight {
    token: u64,
    rx: watch::Receiver<Option<Outcome>>,
}

/// Memoizes one [`RiskAssessment`] per identity. Concurrent requests for
/// the same identity share a single in-flight computation; errors are
/// delivered to waiters but never cached.
#[derive(Debug)]
pub struct AssessmentCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Identity, StoredEntry>,
    in_flight: HashMap<Identity, InFlight>,
    next_token: u64,
}

impl Default for AssessmentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssessmentCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the live cached assessment, joins an in-flight
    /// computation, or runs `compute` and writes the result through.
    /// The lookup is decided under the lock and awaited after it, so
    /// the returned future stays `Send`.
    pub async fn get_or_compute<F, Fut>(&self, identity: &Identity, compute: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let lookup = {
            let mut state = self.state.lock().expect("cache lock poisoned");
            if let Some(entry) = state.entries.get(identity).filter(|e| self.is_live(e)) {
                debug!(%identity, "cache hit");
                Lookup::Hit(entry.assessment.clone())
            } else if let Some(flight) = state.in_flight.get(identity) {
                debug!(%identity, "joining in-flight computation");
                Lookup::Join(flight.rx.clone())
            } else {
                let (tx, token) = register(&mut state, identity);
                Lookup::Lead(tx, token)
            }
        };
        match lookup {
            Lookup::Hit(assessment) => Ok(assessment),
            Lookup::Join(rx) => wait_for(rx).await,
            Lookup::Lead(tx, token) => self.run(identity, tx, token, compute).await,
        }
    }

    /// Forced refresh: skips the lookup (and any in-flight sharing) but
    /// still writes through under a fresh request token.
    pub async fn refresh<F, Fut>(&self, identity: &Identity, compute: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let (tx, token) = {
            let mut state = self.state.lock().expect("cache lock poisoned");
            register(&mut state, identity)
        };
        self.run(identity, tx, token, compute).await
    }

    async fn run<F, Fut>(
        &self,
        identity: &Identity,
        tx: watch::Sender<Option<Outcome>>,
        token: u64,
        compute: F,
    ) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        // Deregisters the flight even if this future is dropped before
        // compute finishes; a dead registration left in the map would
        // feed Interrupted to every later caller instead of letting one
        // of them recompute.
        let _guard = FlightGuard {
            cache: self,
            identity,
            token,
        };
        let outcome = compute().await;

        {
            let mut state = self.state.lock().expect("cache lock poisoned");
            if let Ok(assessment) = &outcome {
                let newer_exists = state
                    .entries
                    .get(identity)
                    .is_some_and(|entry| entry.token > token);
                if !newer_exists {
                    state.entries.insert(
                        identity.clone(),
                        StoredEntry {
                            assessment: assessment.clone(),
                            stored_at: SystemTime::now(),
                            token,
                        },
                    );
                } else {
                    debug!(%identity, "discarding stale write for superseded request");
                }
            }
        }

        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    fn is_live(&self, entry: &StoredEntry) -> bool {
        entry
            .stored_at
            .elapsed()
            .map(|age| age < self.ttl)
            .unwrap_or(false)
    }
}

/// One locked lookup's verdict, carried out of the lock scope before
/// anything is awaited.
enum Lookup {
    Hit(RiskAssessment),
    Join(watch::Receiver<Option<Outcome>>),
    Lead(watch::Sender<Option<Outcome>>, u64),
}

/// Removes the leader's flight registration on drop, unless a newer
/// registration for the same identity has already replaced it.
struct FlightGuard<'a> {
    cache: &'a AssessmentCache,
    identity: &'a Identity,
    token: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.cache.state.lock() {
            if state
                .in_flight
                .get(self.identity)
                .is_some_and(|flight| flight.token == self.token)
            {
                state.in_flight.remove(self.identity);
            }
        }
    }
}

/// Registers a new in-flight computation under the next request token.
/// Any previous registration is replaced, so later joiners always attach
/// to the most recently requested computation.
fn register(
    state: &mut CacheState,
    identity: &Identity,
) -> (watch::Sender<Option<Outcome>>, u64) {
    state.next_token += 1;
    let token = state.next_token;
    let (tx, rx) = watch::channel(None);
    state.in_flight.insert(identity.clone(), InFlight { token, rx });
    (tx, token)
}

async fn wait_for(mut rx: watch::Receiver<Option<Outcome>>) -> Outcome {
    loop {
        let ready = rx.borrow().clone();
        if let Some(outcome) = ready {
            return outcome;
        }
        if rx.changed().await.is_err() {
            return Err(AnalysisError::Interrupted);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::identity::normalize;

    fn id(s: &str) -> Identity {
        normalize(s).unwrap()
    }

    fn assessment(score: u8) -> RiskAssessment {
        RiskAssessment {
            score,
            reasons: Vec::new(),
            accuracy_threshold_used: 90.0,
            computed_at: 0,
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_skips_compute() {
        let cache = AssessmentCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let target = id("rival1");

        for _ in 0..2 {
            let calls = calls.clone();
            let got = cache
                .get_or_compute(&target, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(assessment(42))
                })
                .await
                .unwrap();
            assert_eq!(got.score, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_recomputes_every_time() {
        let cache = AssessmentCache::with_ttl(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let target = id("rival1");

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .get_or_compute(&target, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(assessment(1))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_computation() {
        let cache = Arc::new(AssessmentCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let target = id("rival1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&target, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(assessment(7))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().score, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_returned_but_not_cached() {
        let cache = AssessmentCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let target = id("rival1");

        let first = {
            let calls = calls.clone();
            cache
                .get_or_compute(&target, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AnalysisError::Fetch("boom".into()))
                })
                .await
        };
        assert!(first.is_err());

        let second = {
            let calls = calls.clone();
            cache
                .get_or_compute(&target, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(assessment(3))
                })
                .await
        };
        assert_eq!(second.unwrap().score, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_bypasses_lookup_and_writes_through() {
        let cache = AssessmentCache::new();
        let target = id("rival1");

        cache
            .get_or_compute(&target, || async { Ok(assessment(10)) })
            .await
            .unwrap();
        let refreshed = cache
            .refresh(&target, || async { Ok(assessment(20)) })
            .await
            .unwrap();
        assert_eq!(refreshed.score, 20);

        // The refreshed value is now the cached one.
        let cached = cache
            .get_or_compute(&target, || async { Ok(assessment(99)) })
            .await
            .unwrap();
        assert_eq!(cached.score, 20);
    }

    #[tokio::test]
    async fn slow_earlier_request_never_overwrites_later_result() {
        let cache = Arc::new(AssessmentCache::with_ttl(Duration::ZERO));
        let target = id("rival1");

        let slow = {
            let cache = cache.clone();
            let target = target.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(&target, || async {
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        Ok(assessment(1))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = cache
            .refresh(&target, || async { Ok(assessment(2)) })
            .await
            .unwrap();
        assert_eq!(fast.score, 2);

        // The slow caller still gets its own result...
        assert_eq!(slow.await.unwrap().unwrap().score, 1);

        // ...but the cache kept the later-requested one. TTL is zero
        // here, so inspect the stored entry directly.
        let state = cache.state.lock().unwrap();
        assert_eq!(state.entries.get(&target).unwrap().assessment.score, 2);
    }

    #[test]
    fn lookup_futures_are_send() {
        fn assert_send(_: &impl Send) {}
        let cache = AssessmentCache::new();
        let target = id("rival1");
        assert_send(&cache.get_or_compute(&target, || async { Ok(assessment(1)) }));
        assert_send(&cache.refresh(&target, || async { Ok(assessment(1)) }));
    }

    #[tokio::test]
    async fn aborted_leader_does_not_wedge_the_key() {
        let cache = Arc::new(AssessmentCache::new());
        let target = id("rival1");

        let leader = {
            let cache = cache.clone();
            let target = target.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(&target, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(assessment(1))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        // The dead flight is gone; the next caller recomputes instead
        // of waiting on it.
        let calls = Arc::new(AtomicUsize::new(0));
        let got = {
            let calls = calls.clone();
            cache
                .get_or_compute(&target, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(assessment(9))
                })
                .await
                .unwrap()
        };
        assert_eq!(got.score, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_identities_do_not_share_flights() {
        let cache = Arc::new(AssessmentCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for name in ["rival1", "rival2"] {
            let cache = cache.clone();
            let calls = calls.clone();
            let target = id(name);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&target, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(assessment(5))
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
