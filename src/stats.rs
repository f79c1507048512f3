use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::identity::Identity;
use crate::pools::Pool;

pub const SECS_PER_DAY: i64 = 86_400;
const RECENT_WINDOW_DAYS: i64 = 30;
const DEFAULT_RATING: f64 = 1200.0;

/// Profile fields the core consumes. A missing join date degrades to
/// "joined now", i.e. zero account age.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub joined_epoch: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoolRecord {
    pub win: u32,
    pub loss: u32,
    pub draw: u32,
}

impl PoolRecord {
    pub fn total(&self) -> u32 {
        self.win + self.loss + self.draw
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub rating: Option<f64>,
    pub record: PoolRecord,
}

/// Per-pool statistics as fetched; pools absent from the payload are
/// simply absent here.
pub type PlayerStats = HashMap<Pool, PoolStats>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSide {
    pub username: Option<String>,
    pub result: Option<String>,
}

/// One archived game, scoped to whichever identities played it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameRecord {
    pub end_epoch: i64,
    pub white: GameSide,
    pub black: GameSide,
    pub white_accuracy: Option<f64>,
    pub black_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Win,
    Draw,
    Loss,
    Other,
}

/// Fixed mapping from the remote result vocabulary to win/draw/loss.
/// Unknown codes count as neither.
pub fn outcome_for(result: Option<&str>) -> GameOutcome {
    match result {
        Some("win") => GameOutcome::Win,
        Some(
            "agreed" | "stalemate" | "repetition" | "timevsinsufficient" | "insufficient"
            | "50move" | "draw",
        ) => GameOutcome::Draw,
        Some("checkmated" | "timeout" | "resigned" | "abandoned" | "lose") => GameOutcome::Loss,
        _ => GameOutcome::Other,
    }
}

/// Everything the risk model needs, derived once per analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub account_age_days: i64,
    pub pool: Option<Pool>,
    pub rating: f64,
    pub overall_games: u32,
    pub overall_winrate: f64,
    pub recent_games: u32,
    pub recent_wins: u32,
    pub recent_winrate: f64,
    pub high_acc_games: u32,
    pub high_acc_pct: f64,
    pub accuracy_threshold: f64,
}

/// Primary pool selection: the preferred pool if it has a recorded rating,
/// else the highest-rated pool in fixed order, else no pool at the
/// default rating.
pub fn choose_primary(stats: &PlayerStats, preferred: Option<Pool>) -> (Option<Pool>, f64) {
    if let Some(pool) = preferred {
        if let Some(rating) = stats.get(&pool).and_then(|s| s.rating) {
            return (Some(pool), rating);
        }
    }
    let mut best = (None, DEFAULT_RATING);
    for pool in Pool::ORDERED {
        if let Some(rating) = stats.get(&pool).and_then(|s| s.rating) {
            if rating > best.1 {
                best = (Some(pool), rating);
            }
        }
    }
    best
}

/// Derives all scoring inputs from one identity's fetched data. Pure: the
/// caller supplies the clock and all payloads.
pub fn aggregate(
    profile: &ProfileSnapshot,
    stats: &PlayerStats,
    preferred: Option<Pool>,
    games: &[GameRecord],
    identity: &Identity,
    now_epoch: i64,
    cfg: &RiskConfig,
) -> Metrics {
    let joined = profile.joined_epoch.unwrap_or(now_epoch);
    let account_age_days = (now_epoch - joined) / SECS_PER_DAY;

    let (pool, rating) = choose_primary(stats, preferred);
    let overall_pool = pool.or(preferred).unwrap_or(Pool::Rapid);
    let record = stats
        .get(&overall_pool)
        .map(|s| s.record)
        .unwrap_or_default();
    let overall_games = record.total();
    let overall_winrate = if overall_games > 0 {
        f64::from(record.win) / f64::from(overall_games) * 100.0
    } else {
        0.0
    };

    let since = now_epoch - RECENT_WINDOW_DAYS * SECS_PER_DAY;
    let mut recent_games = 0u32;
    let mut recent_wins = 0u32;
    let mut accuracies = Vec::new();

    for game in games {
        let is_white = side_matches(&game.white, identity);
        let is_black = side_matches(&game.black, identity);
        if !is_white && !is_black {
            continue;
        }
        let side = if is_white { &game.white } else { &game.black };

        if game.end_epoch >= since {
            recent_games += 1;
            if outcome_for(side.result.as_deref()) == GameOutcome::Win {
                recent_wins += 1;
            }
        }

        let accuracy = if is_white {
            game.white_accuracy
        } else {
            game.black_accuracy
        };
        if let Some(value) = accuracy {
            accuracies.push(value);
        }
    }

    let recent_winrate = if recent_games > 0 {
        f64::from(recent_wins) / f64::from(recent_games) * 100.0
    } else {
        0.0
    };

    let accuracy_threshold = cfg.accuracy_threshold_for(rating);
    let high_acc_games = accuracies.len() as u32;
    let high_acc_pct = if high_acc_games > 0 {
        let above = accuracies.iter().filter(|a| **a >= accuracy_threshold).count();
        above as f64 / f64::from(high_acc_games) * 100.0
    } else {
        0.0
    };

    Metrics {
        account_age_days,
        pool,
        rating,
        overall_games,
        overall_winrate,
        recent_games,
        recent_wins,
        recent_winrate,
        high_acc_games,
        high_acc_pct,
        accuracy_threshold,
    }
}

fn side_matches(side: &GameSide, identity: &Identity) -> bool {
    side.username
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(identity.as_str()))
}
