//! Cross-repository package version tracking core
//!
//! Takes raw packages scraped from many package repositories and turns
//! them into comparable, classified records:
//!
//! ```text
//!   raw Package
//!        |
//!        v
//!   rules::RuleTransformer    canonical names, versions, flags
//!        |
//!        v
//!   classifier                newest / outdated / devel / ... status
//!        |
//!        v
//!   classified Package
//! ```
//!
//! [`version`] supplies the ordering primitive both stages rely on;
//! [`batch`] runs both stages in parallel over whole package sets.
//!
//! ```no_run
//! use repotrack::batch::{classify_projects, transform_packages};
//! use repotrack::repository::RepositoryTable;
//! use repotrack::rules::{RuleStats, RuleTransformer, Ruleset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ruleset = Ruleset::from_dir("rules.d".as_ref())?;
//! let repositories = RepositoryTable::from_yaml(&std::fs::read_to_string("repos.yaml")?)?;
//! let stats = RuleStats::load("stats.json".as_ref());
//!
//! let transformer = RuleTransformer::new(ruleset, repositories, &stats);
//! let transformed = transform_packages(&transformer, vec![]);
//! let classified = classify_projects(transformed.packages);
//!
//! stats.merged(&transformed.stats).save("stats.json".as_ref())?;
//! # let _ = classified;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classifier;
pub mod package;
pub mod repository;
pub mod rules;
pub mod version;

pub use classifier::{ClassifyError, classify_packages};
pub use package::{Package, PackageFlags, PackageStatus};
pub use repository::{RepositoryMetadata, RepositoryTable};
pub use rules::{RuleError, RuleStats, RuleTransformer, Ruleset, StatsDelta, TransformError};
pub use version::compare_versions;
