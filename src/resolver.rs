use crate::identity::{Identity, normalize};

/// Deduplicated candidate identities from one scan of a page zone.
/// First-insertion order is preserved: the step-2d tie-break below is
/// defined in terms of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    members: Vec<Identity>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes and collects raw scraped strings, silently dropping
    /// anything the normalizer rejects.
    pub fn from_raw<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::new();
        for candidate in raw {
            if let Some(id) = normalize(candidate) {
                set.insert(id);
            }
        }
        set
    }

    pub fn insert(&mut self, id: Identity) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.members.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.members.iter()
    }
}

impl FromIterator<Identity> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Session-scoped resolution state, threaded explicitly through callers.
/// The resolver itself never writes to it; the pipeline records a sticky
/// opponent after each successful resolution.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub self_identity: Option<Identity>,
    pub sticky_opponent: Option<Identity>,
}

impl SessionContext {
    /// Explicit user-supplied self handle; wins over any inference.
    pub fn with_self_override(raw: &str) -> Self {
        Self {
            self_identity: normalize(raw),
            sticky_opponent: None,
        }
    }

    pub fn note_resolved(&mut self, opponent: &Identity) {
        self.sticky_opponent = Some(opponent.clone());
    }
}

/// Picks the opponent from one candidate set, or `None` when the set is
/// ambiguous. Decision table, evaluated in order:
///
/// With a known self: drop self; a single survivor wins; among several, a
/// matching sticky opponent wins, else the first survivor in insertion
/// order; only-self means unresolved. Without a known self: a lone
/// candidate wins; a matching sticky wins; otherwise refuse to guess.
pub fn resolve(
    candidates: &CandidateSet,
    self_id: Option<&Identity>,
    sticky: Option<&Identity>,
) -> Option<Identity> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(me) = self_id {
        let non_self: Vec<&Identity> = candidates.iter().filter(|c| *c != me).collect();
        return match non_self.len() {
            0 => None,
            1 => Some(non_self[0].clone()),
            _ => {
                if let Some(last) = sticky {
                    if non_self.iter().any(|c| *c == last) {
                        return Some(last.clone());
                    }
                }
                // Insertion-order tie-break among equally plausible
                // strangers; callers should prefer narrower sources first.
                Some(non_self[0].clone())
            }
        };
    }

    if candidates.len() == 1 {
        return candidates.iter().next().cloned();
    }
    if let Some(last) = sticky {
        if candidates.contains(last) {
            return Some(last.clone());
        }
    }
    None
}

/// Tries candidate sources in priority order; the first one that resolves
/// wins. Sources are typically: primary board zone, secondary zone, the
/// combined set, then embedded-metadata fallback.
pub fn resolve_sources(
    sources: &[CandidateSet],
    self_id: Option<&Identity>,
    sticky: Option<&Identity>,
) -> Option<Identity> {
    sources
        .iter()
        .find_map(|source| resolve(source, self_id, sticky))
}

/// Secondary path for an unknown self: if the candidates intersect the
/// own-profile-linked identities in exactly one handle, treat it as the
/// inferred self and re-run the main table with the remainder.
pub fn resolve_with_inferred_self(
    candidates: &CandidateSet,
    profile_linked: &CandidateSet,
    sticky: Option<&Identity>,
) -> Option<Identity> {
    let mut overlap = candidates.iter().filter(|c| profile_linked.contains(c));
    let inferred = overlap.next()?;
    if overlap.next().is_some() {
        return None;
    }
    resolve(candidates, Some(inferred), sticky)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        normalize(s).expect("valid test identity")
    }

    fn set(names: &[&str]) -> CandidateSet {
        names.iter().map(|n| id(n)).collect()
    }

    #[test]
    fn empty_set_is_unresolved() {
        assert_eq!(resolve(&CandidateSet::new(), None, None), None);
    }

    #[test]
    fn only_self_is_unresolved() {
        let me = id("myself");
        assert_eq!(resolve(&set(&["myself"]), Some(&me), None), None);
    }

    #[test]
    fn single_non_self_wins_regardless_of_order() {
        let me = id("myself");
        let opp = id("rival");
        assert_eq!(resolve(&set(&["myself", "rival"]), Some(&me), None), Some(opp.clone()));
        assert_eq!(resolve(&set(&["rival", "myself"]), Some(&me), None), Some(opp));
    }

    #[test]
    fn sticky_breaks_multi_candidate_tie() {
        let me = id("myself");
        let sticky = id("rival2");
        let got = resolve(&set(&["rival1", "rival2", "myself"]), Some(&me), Some(&sticky));
        assert_eq!(got, Some(sticky));
    }

    #[test]
    fn without_sticky_first_insertion_survivor_wins() {
        let me = id("myself");
        let got = resolve(&set(&["myself", "rival1", "rival2"]), Some(&me), None);
        assert_eq!(got, Some(id("rival1")));
    }

    #[test]
    fn unknown_self_never_guesses_between_strangers() {
        assert_eq!(resolve(&set(&["rival1", "rival2"]), None, None), None);
    }

    #[test]
    fn unknown_self_accepts_matching_sticky() {
        let sticky = id("rival2");
        let got = resolve(&set(&["rival1", "rival2"]), None, Some(&sticky));
        assert_eq!(got, Some(sticky));
    }

    #[test]
    fn unknown_self_accepts_lone_candidate() {
        assert_eq!(resolve(&set(&["rival1"]), None, None), Some(id("rival1")));
    }

    #[test]
    fn resolution_is_deterministic_on_repeat() {
        let candidates = set(&["rival1", "rival2", "myself"]);
        let me = id("myself");
        let first = resolve(&candidates, Some(&me), None);
        for _ in 0..5 {
            assert_eq!(resolve(&candidates, Some(&me), None), first);
        }
    }

    #[test]
    fn source_priority_first_hit_wins() {
        let me = id("myself");
        let sources = vec![
            CandidateSet::new(),
            set(&["myself", "rival1"]),
            set(&["myself", "rival9"]),
        ];
        assert_eq!(resolve_sources(&sources, Some(&me), None), Some(id("rival1")));
    }

    #[test]
    fn inferred_self_from_unique_profile_overlap() {
        let candidates = set(&["myself", "rival1"]);
        let linked = set(&["myself", "unrelated"]);
        assert_eq!(
            resolve_with_inferred_self(&candidates, &linked, None),
            Some(id("rival1"))
        );
    }

    #[test]
    fn ambiguous_profile_overlap_stays_unresolved() {
        let candidates = set(&["rival1", "rival2"]);
        let linked = set(&["rival1", "rival2"]);
        assert_eq!(resolve_with_inferred_self(&candidates, &linked, None), None);
    }

    #[test]
    fn candidate_set_deduplicates_raw_noise() {
        let set = CandidateSet::from_raw(["@Rival1", "rival1", "  rival1 ", "White", "x"]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&id("rival1")));
    }
}
