use std::future::Future;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::AssessmentCache;
use crate::config::RiskConfig;
use crate::error::AnalysisError;
use crate::fetch::fetch_player_data;
use crate::identity::Identity;
use crate::pools::Pool;
use crate::resolver::{CandidateSet, SessionContext, resolve_sources, resolve_with_inferred_self};
use crate::risk::{RiskAssessment, score_risk};
use crate::stats::aggregate;

/// Typed result of one resolve-then-score run. Nothing panics or
/// propagates past this boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Assessed {
        identity: Identity,
        assessment: RiskAssessment,
    },
    /// No opponent could be determined from the supplied candidates.
    Unresolved,
    /// The resolved opponent changed while this computation was in
    /// flight; the stale result is discarded, not rendered.
    Superseded,
    Failed {
        identity: Identity,
        error: AnalysisError,
    },
}

/// Owns the resolve-then-score pipeline: session state, result cache,
/// and scoring configuration. One instance serves a whole session.
pub struct Analyzer {
    config: RiskConfig,
    cache: AssessmentCache,
    session: Mutex<SessionState>,
}

struct SessionState {
    context: SessionContext,
    /// The identity the most recent assess call targets. A finished
    /// computation for a different identity is reported as superseded.
    target: Option<Identity>,
}

impl Analyzer {
    pub fn new(config: RiskConfig) -> Self {
        Self::with_session(config, SessionContext::default())
    }

    pub fn with_session(config: RiskConfig, context: SessionContext) -> Self {
        Self {
            config,
            cache: AssessmentCache::new(),
            session: Mutex::new(SessionState {
                context,
                target: None,
            }),
        }
    }

    pub fn sticky_opponent(&self) -> Option<Identity> {
        self.session
            .lock()
            .expect("session lock poisoned")
            .context
            .sticky_opponent
            .clone()
    }

    /// Full pipeline entry point: resolve an opponent from prioritized
    /// candidate sources, then score it. `profile_linked` enables
    /// self-inference when the session has no known self identity.
    pub async fn analyze_candidates(
        &self,
        sources: &[CandidateSet],
        profile_linked: Option<&CandidateSet>,
        preferred_pool: Option<Pool>,
        force: bool,
    ) -> AnalysisOutcome {
        let Some(opponent) = self.resolve_opponent(sources, profile_linked) else {
            return AnalysisOutcome::Unresolved;
        };
        self.assess(&opponent, preferred_pool, force).await
    }

    /// Resolution half of the pipeline. On success the opponent becomes
    /// the session's sticky tie-break hint. Refuses to return the
    /// session's own identity.
    pub fn resolve_opponent(
        &self,
        sources: &[CandidateSet],
        profile_linked: Option<&CandidateSet>,
    ) -> Option<Identity> {
        let (self_id, sticky) = {
            let session = self.session.lock().expect("session lock poisoned");
            (
                session.context.self_identity.clone(),
                session.context.sticky_opponent.clone(),
            )
        };

        let mut resolved = resolve_sources(sources, self_id.as_ref(), sticky.as_ref());
        if resolved.is_none() && self_id.is_none() {
            if let Some(linked) = profile_linked {
                resolved = sources
                    .iter()
                    .find_map(|source| resolve_with_inferred_self(source, linked, sticky.as_ref()));
            }
        }

        let opponent = match resolved {
            Some(opponent) => opponent,
            None => {
                debug!("no opponent resolved from {} candidate sources", sources.len());
                return None;
            }
        };
        if self_id.as_ref() == Some(&opponent) {
            return None;
        }

        let mut session = self.session.lock().expect("session lock poisoned");
        session.context.note_resolved(&opponent);
        Some(opponent)
    }

    /// Scores one already-resolved identity, going through the cache.
    pub async fn assess(
        &self,
        identity: &Identity,
        preferred_pool: Option<Pool>,
        force: bool,
    ) -> AnalysisOutcome {
        let config = self.config.clone();
        let target = identity.clone();
        self.assess_with(identity, force, move || async move {
            compute_assessment(&target, preferred_pool, &config).await
        })
        .await
    }

    /// Cache-and-supersession wrapper around an arbitrary compute step.
    /// The seam `assess` goes through; also usable with non-network data
    /// sources.
    pub async fn assess_with<F, Fut>(&self, identity: &Identity, force: bool, compute: F) -> AnalysisOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RiskAssessment, AnalysisError>>,
    {
        {
            let mut session = self.session.lock().expect("session lock poisoned");
            session.target = Some(identity.clone());
        }

        let outcome = if force {
            self.cache.refresh(identity, compute).await
        } else {
            self.cache.get_or_compute(identity, compute).await
        };

        let still_current = self
            .session
            .lock()
            .expect("session lock poisoned")
            .target
            .as_ref()
            == Some(identity);
        if !still_current {
            debug!(%identity, "discarding result for superseded target");
            return AnalysisOutcome::Superseded;
        }

        match outcome {
            Ok(assessment) => AnalysisOutcome::Assessed {
                identity: identity.clone(),
                assessment,
            },
            Err(error) => {
                warn!(%identity, "analysis failed: {error}");
                AnalysisOutcome::Failed {
                    identity: identity.clone(),
                    error,
                }
            }
        }
    }
}

/// Fetch, aggregate, score. Sub-resource failures have already been
/// degraded inside the fetch layer; only a totally empty payload is an
/// error here.
async fn compute_assessment(
    identity: &Identity,
    preferred_pool: Option<Pool>,
    config: &RiskConfig,
) -> Result<RiskAssessment, AnalysisError> {
    let data = fetch_player_data(identity)
        .await
        .map_err(|err| AnalysisError::Fetch(err.to_string()))?;
    if data.is_empty() {
        return Err(AnalysisError::NoData(identity.clone()));
    }

    let now = Utc::now().timestamp();
    let metrics = aggregate(
        &data.profile,
        &data.stats,
        preferred_pool,
        &data.games,
        identity,
        now,
        config,
    );
    Ok(score_risk(&metrics, config, now))
}
