//! Rule transformation engine
//!
//! Packages arriving from repository parsers carry vendor-specific names
//! and version strings. The engine rewrites them into canonical form by
//! running an ordered ruleset over every package:
//!
//! ```text
//!   *.yaml ----> Ruleset ----------> DispatchPlan <---- RuleStats
//!                 (rules)             (blocks)          (snapshot)
//!                    |                    |
//!                    v                    v
//!   Package --> RuleTransformer::transform --> canonical Package
//!                    |
//!                    +--> StatsDelta (per-worker match counts)
//! ```
//!
//! Rules apply in document order; matching is free of side effects until
//! all of a rule's predicates hold. The dispatch plan is a pure function
//! of the ruleset and a statistics snapshot, held behind an [`Arc`] swap
//! so it can be rebuilt concurrently with in-flight transforms.

mod action;
mod blocks;
mod context;
mod error;
mod matcher;
mod rule;
mod ruleset;
mod statistics;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::package::{Package, PackageFlags};
use crate::repository::RepositoryTable;

pub use blocks::{COVERING_BLOCK_MIN_SIZE, DispatchPlan, RULE_LOWFREQ_THRESHOLD, RuleBlock};
pub use context::{MatchContext, PackageContext};
pub use error::{RuleError, TransformError};
pub use rule::Rule;
pub use ruleset::Ruleset;
pub use statistics::{RuleStats, StatsDelta};

/// Applies a compiled ruleset to packages.
///
/// Shared across worker threads by reference; transformation itself only
/// needs `&self` plus the caller's own [`StatsDelta`].
pub struct RuleTransformer {
    ruleset: Ruleset,
    repositories: RepositoryTable,
    plan: RwLock<Arc<DispatchPlan>>,
}

impl RuleTransformer {
    pub fn new(ruleset: Ruleset, repositories: RepositoryTable, stats: &RuleStats) -> Self {
        let plan = Arc::new(DispatchPlan::build(&ruleset, stats));
        Self {
            ruleset,
            repositories,
            plan: RwLock::new(plan),
        }
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Rebuild the dispatch plan from a fresh statistics snapshot and
    /// swap it in. In-flight transforms finish on the plan they started
    /// with; both plans apply rules identically, only skip differently.
    pub fn replan(&self, stats: &RuleStats) {
        let plan = Arc::new(DispatchPlan::build(&self.ruleset, stats));
        *self.plan.write() = plan;
    }

    /// Run the whole ruleset over one package.
    pub fn transform(
        &self,
        package: &mut Package,
        stats: &mut StatsDelta,
    ) -> Result<(), TransformError> {
        if package.effname.is_empty() {
            package.effname = seed_name(package);
        }

        let rulesets = self.repositories.rulesets_for(&package.repo);
        let mut package_context = PackageContext::new(rulesets.iter().cloned());

        let plan = Arc::clone(&self.plan.read());
        stats.count_package();

        for block in &plan.blocks {
            if self.run_block(block, package, &mut package_context, stats)? {
                break;
            }
        }

        if !package.has_flag(PackageFlags::REMOVE) {
            for warning in &package_context.warnings {
                warn!(
                    repo = %package.repo,
                    name = %package.effname,
                    version = %package.version,
                    "{warning}"
                );
            }
        }
        if package.has_flag(PackageFlags::TRACE) {
            debug!(
                repo = %package.repo,
                name = %package.effname,
                version = %package.version,
                rules = ?package_context.matched_rules,
                "rule trace"
            );
        }

        Ok(())
    }

    /// Returns `true` when a `last` action stopped evaluation.
    fn run_block(
        &self,
        block: &RuleBlock,
        package: &mut Package,
        package_context: &mut PackageContext,
        stats: &mut StatsDelta,
    ) -> Result<bool, TransformError> {
        match block {
            RuleBlock::Single(number) => self.try_rule(*number, package, package_context, stats),
            RuleBlock::NameMap { index, .. } => {
                // the canonical name is re-read every iteration: a
                // setname may move the package into another bucket of
                // this same block, whose rules must still be tried
                let mut min_rule = 0;
                loop {
                    let Some(candidates) = index.get(&package.effname) else {
                        return Ok(false);
                    };
                    let Some(&number) = candidates.iter().find(|&&n| n >= min_rule) else {
                        return Ok(false);
                    };
                    if self.try_rule(number, package, package_context, stats)? {
                        return Ok(true);
                    }
                    min_rule = number + 1;
                }
            }
            RuleBlock::Covering { blocks, .. } => {
                if !block.may_match_name(&package.effname) {
                    return Ok(false);
                }
                for inner in blocks {
                    if self.run_block(inner, package, package_context, stats)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn try_rule(
        &self,
        number: usize,
        package: &mut Package,
        package_context: &mut PackageContext,
        stats: &mut StatsDelta,
    ) -> Result<bool, TransformError> {
        let rule = &self.ruleset.rules[number];
        let Some(mut match_context) = rule.match_package(package, package_context) else {
            return Ok(false);
        };

        stats.count_match(&rule.hash);
        package_context.add_matched_rule(number);
        rule.apply(package, package_context, &mut match_context)?;

        Ok(match_context.last)
    }
}

/// The canonical name starts from the most specific name on offer.
fn seed_name(package: &Package) -> String {
    [&package.name, &package.srcname, &package.binname]
        .into_iter()
        .flatten()
        .next()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn transformer(yaml: &str) -> RuleTransformer {
        RuleTransformer::new(
            Ruleset::from_yaml(yaml).unwrap(),
            RepositoryTable::default(),
            &RuleStats::default(),
        )
    }

    fn package(name: &str, version: &str) -> Package {
        Package {
            repo: "testrepo".to_string(),
            family: "testfamily".to_string(),
            name: Some(name.to_string()),
            version: version.to_string(),
            rawversion: version.to_string(),
            ..Default::default()
        }
    }

    fn transform(transformer: &RuleTransformer, package: &mut Package) {
        let mut stats = StatsDelta::default();
        transformer.transform(package, &mut stats).unwrap();
    }

    #[test]
    fn canonical_name_is_seeded_before_matching() {
        let transformer = transformer("- { name: zlib, devel: true }");
        let mut package = package("zlib", "1.3");
        transform(&transformer, &mut package);

        assert_eq!(package.effname, "zlib");
        assert!(package.has_flag(PackageFlags::DEVEL));
    }

    #[test]
    fn rules_apply_in_order_and_see_earlier_mutations() {
        let transformer = transformer(indoc! {r#"
            - { namepat: "lib(z.*)", setname: "$1" }
            - { name: zlib, ignore: true }
        "#});

        let mut package = package("libzlib", "1.3");
        transform(&transformer, &mut package);

        assert_eq!(package.effname, "zlib");
        assert!(package.has_flag(PackageFlags::IGNORE));
    }

    #[test]
    fn setname_moves_package_across_name_map_buckets() {
        // all three rules form one name-map block; the rename from the
        // first bucket must land in the second and trigger its rule,
        // without revisiting earlier rules
        let transformer = transformer(indoc! {r#"
            - { name: aaa, setname: bbb }
            - { name: bbb, devel: true }
            - { name: bbb, setname: aaa }
        "#});

        let mut package = package("aaa", "1.0");
        transform(&transformer, &mut package);

        assert_eq!(package.effname, "aaa");
        assert!(package.has_flag(PackageFlags::DEVEL));
    }

    #[test]
    fn last_stops_rule_evaluation() {
        let transformer = transformer(indoc! {r#"
            - { name: tool, last: true }
            - { name: tool, ignore: true }
        "#});

        let mut package = package("tool", "1.0");
        transform(&transformer, &mut package);
        assert!(!package.has_flag(PackageFlags::IGNORE));
    }

    #[test]
    fn context_flags_connect_rules() {
        let transformer = transformer(indoc! {r#"
            - { verpat: ".*beta.*", addflag: prerelease }
            - { flag: prerelease, devel: true }
            - { noflag: prerelease, stable: true }
        "#});

        let mut beta = package("tool", "1.0beta1");
        transform(&transformer, &mut beta);
        assert!(beta.has_flag(PackageFlags::DEVEL));
        assert!(!beta.has_flag(PackageFlags::STABLE));

        let mut release = package("tool", "1.0");
        transform(&transformer, &mut release);
        assert!(release.has_flag(PackageFlags::STABLE));
    }

    #[test]
    fn repository_rulesets_gate_rules() {
        let repositories = RepositoryTable::from_yaml(indoc! {r#"
            - { name: freebsd, family: freebsd, rulesets: [freebsd] }
            - { name: debian, family: debuntu, rulesets: [debian, deb] }
        "#})
        .unwrap();
        let transformer = RuleTransformer::new(
            Ruleset::from_yaml("- { ruleset: debian, ignore: true }").unwrap(),
            repositories,
            &RuleStats::default(),
        );

        let mut debian = package("x", "1.0");
        debian.repo = "debian".to_string();
        transform(&transformer, &mut debian);
        assert!(debian.has_flag(PackageFlags::IGNORE));

        let mut freebsd = package("x", "1.0");
        freebsd.repo = "freebsd".to_string();
        transform(&transformer, &mut freebsd);
        assert!(!freebsd.has_flag(PackageFlags::IGNORE));
    }

    #[test]
    fn optimized_plan_transforms_identically() {
        let yaml = indoc! {r#"
            - { name: rare-a, ignore: true }
            - { name: rare-b, ignore: true }
            - { verpat: ".*beta.*", devel: true }
            - { namepat: "rare-.*", untrusted: true }
            - { name: rare-c, ignore: true }
        "#};

        let naive = transformer(yaml);

        let optimized = transformer(yaml);
        let mut training = StatsDelta::default();
        for _ in 0..10_000 {
            training.count_package();
        }
        for _ in 0..5_000 {
            training.count_match(&optimized.ruleset().rules[2].hash);
        }
        optimized.replan(&RuleStats::default().merged(&training));

        for (name, version) in [
            ("rare-a", "1.0"),
            ("rare-b", "2.0beta1"),
            ("rare-c", "3.0"),
            ("common", "4.0beta2"),
            ("unrelated", "5.0"),
        ] {
            let mut expected = package(name, version);
            transform(&naive, &mut expected);
            let mut actual = package(name, version);
            transform(&optimized, &mut actual);

            assert_eq!(expected.effname, actual.effname);
            assert_eq!(expected.flags, actual.flags);
        }
    }

    #[test]
    fn stats_count_packages_and_matches() {
        let transformer = transformer(indoc! {r#"
            - { name: zlib, devel: true }
            - { namepat: "z.*", stable: true }
        "#});

        let mut stats = StatsDelta::default();
        let mut zlib = package("zlib", "1.3");
        transformer.transform(&mut zlib, &mut stats).unwrap();
        let mut other = package("other", "1.0");
        transformer.transform(&mut other, &mut stats).unwrap();

        let snapshot = RuleStats::default().merged(&stats);
        assert_eq!(snapshot.total_packages, 2);
        assert_eq!(
            snapshot.match_counts[&transformer.ruleset().rules[0].hash],
            1
        );
        assert_eq!(
            snapshot.match_counts[&transformer.ruleset().rules[1].hash],
            1
        );
    }
}
