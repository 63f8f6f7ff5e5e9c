//! Dispatch planning
//!
//! Thousands of rules cannot be tried one by one on every package. The
//! plan groups consecutive rules into blocks that can be skipped cheaply:
//!
//! - a run of rules restricted to exact names becomes a hash-map block,
//!   looked up by canonical name instead of scanned;
//! - a run of blocks whose rules all match rarely (below
//!   [`RULE_LOWFREQ_THRESHOLD`]) and are all name-restricted is wrapped
//!   in a covering block guarded by a combined name set and one combined
//!   alternation regex; packages failing the guard skip the entire run.
//!
//! Building is a pure function of the ruleset and a statistics snapshot;
//! the same inputs always yield the same plan, and applying any plan is
//! observably identical to trying every rule in order.

use std::collections::HashSet;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use super::ruleset::Ruleset;
use super::statistics::RuleStats;

/// Match frequency below which a rule is worth hiding behind a guard.
pub const RULE_LOWFREQ_THRESHOLD: f64 = 0.001;
/// Minimum run length for forming a covering block.
pub const COVERING_BLOCK_MIN_SIZE: usize = 2;

/// One node of the dispatch plan. Rules are referenced by index into the
/// ruleset, so the plan can be rebuilt without touching the rules.
#[derive(Debug)]
pub enum RuleBlock {
    /// A single unrestricted rule, always tried.
    Single(usize),
    /// A run of name-restricted rules, dispatched by name lookup.
    NameMap {
        rules: Vec<usize>,
        index: IndexMap<String, Vec<usize>>,
    },
    /// A run of blocks guarded by a combined name set and pattern.
    Covering {
        names: HashSet<String>,
        pattern: Option<Regex>,
        blocks: Vec<RuleBlock>,
    },
}

impl RuleBlock {
    /// Whether any rule inside can possibly match this canonical name.
    pub fn may_match_name(&self, effname: &str) -> bool {
        match self {
            RuleBlock::Single(_) => true,
            RuleBlock::NameMap { index, .. } => index.contains_key(effname),
            RuleBlock::Covering { names, pattern, .. } => {
                names.contains(effname)
                    || pattern.as_ref().is_some_and(|p| p.is_match(effname))
            }
        }
    }

    fn rule_indices(&self, out: &mut Vec<usize>) {
        match self {
            RuleBlock::Single(rule) => out.push(*rule),
            RuleBlock::NameMap { rules, .. } => out.extend_from_slice(rules),
            RuleBlock::Covering { blocks, .. } => {
                for block in blocks {
                    block.rule_indices(out);
                }
            }
        }
    }
}

/// The complete plan over a ruleset.
#[derive(Debug, Default)]
pub struct DispatchPlan {
    pub blocks: Vec<RuleBlock>,
}

impl DispatchPlan {
    /// Build a plan for `ruleset` using match frequencies from `stats`.
    /// With an empty snapshot every rule counts as frequent and the plan
    /// degenerates to name maps and singles only.
    pub fn build(ruleset: &Ruleset, stats: &RuleStats) -> DispatchPlan {
        let blocks = merge_lowfreq_runs(ruleset, stats, name_map_pass(ruleset));

        let covering = blocks
            .iter()
            .filter(|b| matches!(b, RuleBlock::Covering { .. }))
            .count();
        debug!(
            rules = ruleset.rules.len(),
            blocks = blocks.len(),
            covering,
            "dispatch plan built"
        );

        DispatchPlan { blocks }
    }

    /// All rule indices in evaluation order, for plan equivalence checks.
    pub fn rule_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for block in &self.blocks {
            block.rule_indices(&mut out);
        }
        out
    }
}

/// First pass: fold runs of name-restricted rules into name maps.
fn name_map_pass(ruleset: &Ruleset) -> Vec<RuleBlock> {
    let mut blocks = Vec::new();
    let mut pending: Vec<usize> = Vec::new();

    let mut flush = |pending: &mut Vec<usize>, blocks: &mut Vec<RuleBlock>| {
        if pending.is_empty() {
            return;
        }
        let mut index: IndexMap<String, Vec<usize>> = IndexMap::new();
        for &rule in pending.iter() {
            for name in ruleset.rules[rule].names.as_deref().unwrap_or_default() {
                index.entry(name.clone()).or_default().push(rule);
            }
        }
        blocks.push(RuleBlock::NameMap {
            rules: std::mem::take(pending),
            index,
        });
    };

    for (number, rule) in ruleset.rules.iter().enumerate() {
        if rule.names.is_some() {
            pending.push(number);
        } else {
            flush(&mut pending, &mut blocks);
            blocks.push(RuleBlock::Single(number));
        }
    }
    flush(&mut pending, &mut blocks);

    blocks
}

/// Second pass: wrap runs of guardable low-frequency blocks.
fn merge_lowfreq_runs(
    ruleset: &Ruleset,
    stats: &RuleStats,
    blocks: Vec<RuleBlock>,
) -> Vec<RuleBlock> {
    let mut out = Vec::new();
    let mut run: Vec<RuleBlock> = Vec::new();

    let mut flush = |run: &mut Vec<RuleBlock>, out: &mut Vec<RuleBlock>| {
        if run.len() >= COVERING_BLOCK_MIN_SIZE {
            match build_covering(ruleset, std::mem::take(run)) {
                Ok(covering) => {
                    out.push(covering);
                    return;
                }
                Err(blocks) => {
                    warn!("covering guard pattern failed to compile, run left unmerged");
                    *run = blocks;
                }
            }
        }
        out.append(run);
    };

    for block in blocks {
        if is_guardable(ruleset, stats, &block) {
            run.push(block);
        } else {
            flush(&mut run, &mut out);
            out.push(block);
        }
    }
    flush(&mut run, &mut out);

    out
}

/// A block can sit behind a guard when every rule in it is restricted by
/// exact names or a name pattern, and none of them matches frequently.
fn is_guardable(ruleset: &Ruleset, stats: &RuleStats, block: &RuleBlock) -> bool {
    let mut rules = Vec::new();
    block.rule_indices(&mut rules);

    rules.iter().all(|&number| {
        let rule = &ruleset.rules[number];
        (rule.names.is_some() || rule.name_pattern.is_some())
            && stats.frequency(&rule.hash) < RULE_LOWFREQ_THRESHOLD
    })
}

fn build_covering(ruleset: &Ruleset, blocks: Vec<RuleBlock>) -> Result<RuleBlock, Vec<RuleBlock>> {
    let mut rules = Vec::new();
    for block in &blocks {
        block.rule_indices(&mut rules);
    }

    let mut names = HashSet::new();
    let mut patterns = Vec::new();
    for &number in &rules {
        let rule = &ruleset.rules[number];
        if let Some(rule_names) = &rule.names {
            names.extend(rule_names.iter().cloned());
        }
        if let Some(pattern) = &rule.name_pattern {
            patterns.push(pattern.clone());
        }
    }

    let pattern = if patterns.is_empty() {
        None
    } else {
        match Regex::new(&format!("^(?:{})$", patterns.join("|"))) {
            Ok(combined) => Some(combined),
            Err(_) => return Err(blocks),
        }
    };

    Ok(RuleBlock::Covering {
        names,
        pattern,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::statistics::StatsDelta;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn ruleset() -> Ruleset {
        Ruleset::from_yaml(indoc! {r#"
            - { name: aaa, ignore: true }
            - { name: bbb, ignore: true }
            - { verpat: ".*beta.*", devel: true }
            - { namepat: "rare-.*", ignore: true }
            - { name: ccc, ignore: true }
        "#})
        .unwrap()
    }

    /// 1000 packages counted, only the unrestricted rule fires often.
    fn trained_stats(ruleset: &Ruleset) -> RuleStats {
        let mut delta = StatsDelta::default();
        for _ in 0..1000 {
            delta.count_package();
        }
        for _ in 0..100 {
            delta.count_match(&ruleset.rules[2].hash);
        }
        RuleStats::default().merged(&delta)
    }

    #[test]
    fn name_runs_become_name_maps() {
        let ruleset = ruleset();
        let plan = DispatchPlan::build(&ruleset, &RuleStats::default());

        assert_eq!(plan.blocks.len(), 4);
        assert!(
            matches!(&plan.blocks[0], RuleBlock::NameMap { rules, .. } if rules == &[0, 1])
        );
        assert!(matches!(plan.blocks[1], RuleBlock::Single(2)));
        assert!(matches!(plan.blocks[2], RuleBlock::Single(3)));
        assert!(
            matches!(&plan.blocks[3], RuleBlock::NameMap { rules, .. } if rules == &[4])
        );
    }

    #[test]
    fn empty_statistics_build_no_covering_blocks() {
        let ruleset = ruleset();
        let plan = DispatchPlan::build(&ruleset, &RuleStats::default());
        assert!(
            plan.blocks
                .iter()
                .all(|b| !matches!(b, RuleBlock::Covering { .. }))
        );
    }

    #[test]
    fn low_frequency_name_restricted_runs_get_covered() {
        let ruleset = ruleset();
        let stats = trained_stats(&ruleset);
        let plan = DispatchPlan::build(&ruleset, &stats);

        // blocks 2 and 3 of the unoptimized plan (namepat single + name
        // map) are rare and name-restricted, so they merge; the frequent
        // verpat rule in between stays a boundary
        assert_eq!(plan.blocks.len(), 3);
        let RuleBlock::Covering {
            names,
            pattern,
            blocks,
        } = &plan.blocks[2]
        else {
            panic!("expected a covering block, got {:?}", plan.blocks[2]);
        };
        assert!(names.contains("ccc"));
        assert!(pattern.as_ref().unwrap().is_match("rare-tool"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn covering_guard_rejects_unrelated_names() {
        let ruleset = ruleset();
        let plan = DispatchPlan::build(&ruleset, &trained_stats(&ruleset));

        let covering = &plan.blocks[2];
        assert!(covering.may_match_name("ccc"));
        assert!(covering.may_match_name("rare-tool"));
        assert!(!covering.may_match_name("firefox"));
    }

    #[test]
    fn plans_enumerate_the_same_rules_regardless_of_statistics() {
        let ruleset = ruleset();
        let naive = DispatchPlan::build(&ruleset, &RuleStats::default());
        let optimized = DispatchPlan::build(&ruleset, &trained_stats(&ruleset));

        assert_eq!(naive.rule_indices(), optimized.rule_indices());
        assert_eq!(naive.rule_indices(), vec![0, 1, 2, 3, 4]);
    }
}
