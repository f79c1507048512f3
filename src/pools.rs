use std::fmt;

use serde::{Deserialize, Serialize};

/// Game-speed pools under which the remote service tracks separate
/// ratings and records. `ORDERED` is the fixed fallback scan order for
/// primary-pool selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    Rapid,
    Blitz,
    Bullet,
    Daily,
}

impl Pool {
    pub const ORDERED: [Pool; 4] = [Pool::Rapid, Pool::Blitz, Pool::Bullet, Pool::Daily];

    /// Key used by the remote stats payload.
    pub fn api_key(self) -> &'static str {
        match self {
            Pool::Rapid => "chess_rapid",
            Pool::Blitz => "chess_blitz",
            Pool::Bullet => "chess_bullet",
            Pool::Daily => "chess_daily",
        }
    }

    pub fn from_api_key(key: &str) -> Option<Pool> {
        match key {
            "chess_rapid" => Some(Pool::Rapid),
            "chess_blitz" => Some(Pool::Blitz),
            "chess_bullet" => Some(Pool::Bullet),
            "chess_daily" => Some(Pool::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Pool::Rapid => "rapid",
            Pool::Blitz => "blitz",
            Pool::Bullet => "bullet",
            Pool::Daily => "daily",
        };
        f.write_str(label)
    }
}

/// Advisory pool hint derived from free page text. Keyword and
/// time-control patterns, fastest pools checked first so "1 min bullet"
/// never falls through to a slower match; daily comes from the URL path.
pub fn infer_pool_from_text(page_text: &str, path: &str) -> Option<Pool> {
    let text = page_text.to_lowercase();
    const BULLET: &[&str] = &["bullet", "1+0", "1 min", "2+1", "2 min"];
    const BLITZ: &[&str] = &["blitz", "3+0", "3+2", "5+0", "5+3", "5 min", "3 min"];
    const RAPID: &[&str] = &["rapid", "10+0", "10+5", "15+10", "10 min", "15 min"];

    if BULLET.iter().any(|kw| text.contains(kw)) {
        return Some(Pool::Bullet);
    }
    if BLITZ.iter().any(|kw| text.contains(kw)) {
        return Some(Pool::Blitz);
    }
    if RAPID.iter().any(|kw| text.contains(kw)) {
        return Some(Pool::Rapid);
    }
    if path.contains("/game/daily") {
        return Some(Pool::Daily);
    }
    None
}
