use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::stats::Metrics;

/// Bounded suspicion score with the reasons that produced it. Safe to
/// serialize and render without further computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub reasons: Vec<String>,
    pub accuracy_threshold_used: f64,
    pub computed_at: i64,
}

/// Additive point model. Each rule is independently gated by its minimum
/// sample size; points are summed and clamped to [0, 100]. No rule
/// subtracts points, and account-age and rate rules never multiply or
/// cancel each other.
pub fn score_risk(metrics: &Metrics, cfg: &RiskConfig, computed_at: i64) -> RiskAssessment {
    let mut score = 0.0_f64;
    let mut reasons = Vec::new();

    let age = metrics.account_age_days;
    let rating = metrics.rating;
    if age < 30 && rating >= 1600.0 {
        score += 22.0;
        reasons.push("very new account + high rating".to_string());
    } else if age < 90 && rating >= 1500.0 {
        score += 14.0;
        reasons.push("new account + elevated rating".to_string());
    } else if age < 180 && rating >= 1700.0 {
        score += 8.0;
        reasons.push("young account + high rating".to_string());
    }

    if metrics.overall_games >= cfg.min_games_for_overall {
        if metrics.overall_winrate >= cfg.high_winrate {
            score += 28.0;
            reasons.push(format!("overall winrate > {}%", cfg.high_winrate));
        } else if metrics.overall_winrate >= cfg.suspicious_winrate {
            score += 12.0;
            reasons.push(format!("overall winrate > {}%", cfg.suspicious_winrate));
        }
    }

    if metrics.recent_games >= cfg.min_games_for_recent {
        if metrics.recent_winrate >= cfg.high_winrate + 5.0 {
            score += 24.0;
            reasons.push("recent 30d winrate very high".to_string());
        } else if metrics.recent_winrate >= cfg.suspicious_winrate + 5.0 {
            score += 10.0;
            reasons.push("recent 30d winrate elevated".to_string());
        }
    }

    let threshold = metrics.accuracy_threshold;
    if metrics.high_acc_games >= cfg.min_games_for_accuracy {
        if metrics.high_acc_pct >= cfg.high_acc_severe_pct {
            score += 22.0;
            reasons.push(format!("many games above {threshold}% accuracy"));
        } else if metrics.high_acc_pct >= cfg.high_acc_notable_pct {
            score += 10.0;
            reasons.push(format!("notable share above {threshold}% accuracy"));
        }
    }

    RiskAssessment {
        score: score.round().clamp(0.0, 100.0) as u8,
        reasons,
        accuracy_threshold_used: threshold,
        computed_at,
    }
}
