use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic UI tokens that show up in scraped page text but are never real
/// account handles. Rejected outright during normalization.
const BLOCKED_TOKENS: &[&str] = &[
    "game", "play", "chess", "live", "move", "time", "white", "black", "player", "user", "guest",
    "anon",
];

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 20;

/// A canonicalized account handle: lowercase, trimmed, no leading `@`,
/// matching `[a-z0-9_-]{3,20}`. Only constructible through [`normalize`],
/// so any `Identity` in the system is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalizes a raw scraped string into an [`Identity`], or `None` when
/// the input is structurally invalid or a known non-identity token.
pub fn normalize(raw: &str) -> Option<Identity> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let lower = stripped.to_lowercase();

    if lower.len() < MIN_LEN || lower.len() > MAX_LEN {
        return None;
    }
    if !lower
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    {
        return None;
    }
    if BLOCKED_TOKENS.contains(&lower.as_str()) {
        return None;
    }

    Some(Identity(lower))
}
