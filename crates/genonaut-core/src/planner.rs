//! Tag filter planner (C4) — §4.5.
//!
//! This module is the pure, DB-free half of the planner: given a tag set,
//! a set of sources, and the cardinality stats the caller already looked
//! up, it deterministically picks one of the three query strategies. The
//! `genonaut-db` crate turns the chosen `Strategy` into SQL; this module
//! never touches a connection.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::types::Source;

/// Planner configuration — §4.5 config knobs, §6.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub small_k_threshold: usize,
    pub group_having_rarest_ceiling: i64,
    pub two_phase_dual_seed_floor: i64,
    pub two_phase_min_k_for_dual_seed: usize,
    pub seed_candidate_cap: i64,
    pub fallback_default_count: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            small_k_threshold: 3,
            group_having_rarest_ceiling: 50_000,
            two_phase_dual_seed_floor: 150_000,
            two_phase_min_k_for_dual_seed: 7,
            seed_candidate_cap: 50_000,
            fallback_default_count: 1_000_000,
        }
    }
}

/// Input to the planner: a deduplicated tag set, the sources to search, and
/// an optional creator filter. Deduplication happens in `TagFilter::new`
/// (§4.5 "T containing duplicates" edge case).
#[derive(Debug, Clone)]
pub struct TagFilter {
    pub tags: BTreeSet<Uuid>,
    pub sources: BTreeSet<Source>,
}

impl TagFilter {
    pub fn new(tags: impl IntoIterator<Item = Uuid>, sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            sources: sources.into_iter().collect(),
        }
    }

    pub fn k(&self) -> usize {
        self.tags.len()
    }

    /// §4.5: empty sources means an empty result with no DB call.
    pub fn is_vacuous(&self) -> bool {
        self.sources.is_empty()
    }
}

/// The three query strategies the planner can choose among (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// K = 0: no tag filter at all, plain keyset pagination over `content_all`.
    Unfiltered,
    /// K <= small_k_threshold: one junction self-join per tag.
    SelfJoin,
    /// `WHERE tag_id IN T GROUP BY content_id HAVING COUNT(DISTINCT tag_id) = K`.
    GroupHaving,
    /// Seed CTE over the rarest tag, then group/having over the seed.
    TwoPhaseSingleSeed { seed_tag: Uuid },
    /// Seed CTE over the two rarest tags, then group/having over the seed.
    TwoPhaseDualSeed { seed_tags: [Uuid; 2] },
}

/// Per-tag cardinality lookups, keyed by tag id. Missing entries fall back
/// to `PlannerConfig::fallback_default_count`, which biases toward the
/// conservative Group/HAVING path (§9 Statistics staleness design note).
pub fn choose_strategy(
    filter: &TagFilter,
    cardinalities: impl Fn(Uuid) -> Option<i64>,
    cfg: &PlannerConfig,
) -> Strategy {
    let k = filter.k();
    if k == 0 {
        return Strategy::Unfiltered;
    }
    if k <= cfg.small_k_threshold {
        return Strategy::SelfJoin;
    }

    // Rank tags by cardinality (ascending); ties broken by Uuid for a fully
    // deterministic choice of "the" rarest tag.
    let mut ranked: Vec<(Uuid, i64)> = filter
        .tags
        .iter()
        .map(|&t| (t, cardinalities(t).unwrap_or(cfg.fallback_default_count)))
        .collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    let rarest_count = ranked[0].1;

    if rarest_count <= cfg.group_having_rarest_ceiling {
        return Strategy::GroupHaving;
    }

    if rarest_count > cfg.two_phase_dual_seed_floor && k >= cfg.two_phase_min_k_for_dual_seed {
        return Strategy::TwoPhaseDualSeed {
            seed_tags: [ranked[0].0, ranked[1].0],
        };
    }

    Strategy::TwoPhaseSingleSeed {
        seed_tag: ranked[0].0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn k_zero_is_unfiltered() {
        let filter = TagFilter::new(vec![], vec![Source::Items]);
        let strat = choose_strategy(&filter, |_| None, &PlannerConfig::default());
        assert_eq!(strat, Strategy::Unfiltered);
    }

    #[test]
    fn duplicates_collapse_k() {
        let t = Uuid::new_v4();
        let filter = TagFilter::new(vec![t, t, t], vec![Source::Items]);
        assert_eq!(filter.k(), 1);
    }

    #[test]
    fn small_k_is_self_join_regardless_of_cardinality() {
        let tags = uuids(3);
        let filter = TagFilter::new(tags, vec![Source::Items]);
        let strat = choose_strategy(&filter, |_| Some(900_000), &PlannerConfig::default());
        assert_eq!(strat, Strategy::SelfJoin);
    }

    #[test]
    fn four_tags_rare_enough_is_group_having() {
        let tags = uuids(4);
        let filter = TagFilter::new(tags, vec![Source::Items]);
        let strat = choose_strategy(&filter, |_| Some(10), &PlannerConfig::default());
        assert_eq!(strat, Strategy::GroupHaving);
    }

    #[test]
    fn very_rare_tags_with_high_k_use_dual_seed() {
        let tags = uuids(7);
        let filter = TagFilter::new(tags, vec![Source::Items]);
        let strat = choose_strategy(&filter, |_| Some(900_000), &PlannerConfig::default());
        assert!(matches!(strat, Strategy::TwoPhaseDualSeed { .. }));
    }

    #[test]
    fn very_rare_tags_with_low_k_use_single_seed() {
        let tags = uuids(4);
        let filter = TagFilter::new(tags, vec![Source::Items]);
        let strat = choose_strategy(&filter, |_| Some(900_000), &PlannerConfig::default());
        assert!(matches!(strat, Strategy::TwoPhaseSingleSeed { .. }));
    }

    #[test]
    fn missing_stats_fall_back_to_conservative_default() {
        let tags = uuids(5);
        let cfg = PlannerConfig::default();
        let filter = TagFilter::new(tags, vec![Source::Items]);
        // No cardinalities known at all -> fallback_default_count (1_000_000)
        // for every tag -> rarest_count is 1_000_000, above the ceiling but
        // not above the dual-seed floor with only k=5 (< min_k=7) -> single seed.
        let strat = choose_strategy(&filter, |_| None, &cfg);
        assert!(matches!(strat, Strategy::TwoPhaseSingleSeed { .. }));
    }

    #[test]
    fn empty_sources_is_vacuous() {
        let filter = TagFilter::new(uuids(1), vec![]);
        assert!(filter.is_vacuous());
    }

    #[test]
    fn rarest_tag_selection_is_deterministic_on_ties() {
        let tags = uuids(8);
        let filter = TagFilter::new(tags.clone(), vec![Source::Items]);
        let cfg = PlannerConfig::default();
        // All tags tied at the same (high) cardinality.
        let strat1 = choose_strategy(&filter, |_| Some(900_000), &cfg);
        let strat2 = choose_strategy(&filter, |_| Some(900_000), &cfg);
        assert_eq!(strat1, strat2);
    }
}
