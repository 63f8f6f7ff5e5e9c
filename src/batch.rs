//! Parallel batch processing
//!
//! Transformation is data-parallel across packages and classification
//! across projects; nothing here holds shared mutable state. Each worker
//! accumulates its own [`StatsDelta`] and the deltas merge in the reduce
//! step. Failures are isolated: a package or project that cannot be
//! processed is dropped from the output and reported, the rest of the
//! batch is unaffected.

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{error, warn};

use crate::classifier::{ClassifyError, classify_packages};
use crate::package::{Package, PackageFlags};
use crate::rules::{RuleTransformer, StatsDelta, TransformError};

/// A package whose transformation failed; the package was dropped.
#[derive(Debug)]
pub struct TransformFailure {
    pub repo: String,
    pub name: String,
    pub error: TransformError,
}

/// Result of one transformation batch.
#[derive(Debug)]
pub struct TransformOutcome {
    /// Transformed packages, REMOVE-flagged ones already dropped.
    pub packages: Vec<Package>,
    /// Combined statistics delta from all workers.
    pub stats: StatsDelta,
    pub failures: Vec<TransformFailure>,
}

/// Transform a whole batch in parallel.
pub fn transform_packages(
    transformer: &RuleTransformer,
    packages: Vec<Package>,
) -> TransformOutcome {
    let empty = || (Vec::new(), StatsDelta::default(), Vec::new());

    let (packages, stats, failures) = packages
        .into_par_iter()
        .fold(
            empty,
            |(mut packages, mut stats, mut failures), mut package| {
                match transformer.transform(&mut package, &mut stats) {
                    Ok(()) => {
                        if !package.has_flag(PackageFlags::REMOVE) {
                            packages.push(package);
                        }
                    }
                    Err(error) => failures.push(TransformFailure {
                        repo: package.repo.clone(),
                        name: package.effname.clone(),
                        error,
                    }),
                }
                (packages, stats, failures)
            },
        )
        .reduce(
            empty,
            |(mut packages, stats, mut failures), (other_packages, other_stats, other_failures)| {
                packages.extend(other_packages);
                failures.extend(other_failures);
                (packages, stats.merge(other_stats), failures)
            },
        );

    for failure in &failures {
        warn!(
            repo = %failure.repo,
            name = %failure.name,
            error = %failure.error,
            "package dropped: transformation failed"
        );
    }

    TransformOutcome {
        packages,
        stats,
        failures,
    }
}

/// A project that could not be classified; its packages were dropped.
#[derive(Debug)]
pub struct ClassifyFailure {
    pub effname: String,
    pub error: ClassifyError,
}

/// Result of one classification batch.
#[derive(Debug)]
pub struct ClassifyOutcome {
    /// Classified packages of all successfully processed projects.
    pub packages: Vec<Package>,
    pub failures: Vec<ClassifyFailure>,
}

/// Group packages into projects by canonical name and classify each
/// project in parallel.
pub fn classify_projects(packages: Vec<Package>) -> ClassifyOutcome {
    let mut projects: IndexMap<String, Vec<Package>> = IndexMap::new();
    for package in packages {
        projects
            .entry(package.effname.clone())
            .or_default()
            .push(package);
    }
    let mut projects: Vec<(String, Vec<Package>)> = projects.into_iter().collect();

    let failures: Vec<ClassifyFailure> = projects
        .par_iter_mut()
        .filter_map(|(effname, project)| {
            classify_packages(project)
                .err()
                .map(|error| ClassifyFailure {
                    effname: effname.clone(),
                    error,
                })
        })
        .collect();

    // invariant violations mean an upstream transformation bug, so
    // these are louder than per-package transform failures
    for failure in &failures {
        error!(
            project = %failure.effname,
            error = %failure.error,
            "project dropped: classification failed"
        );
    }

    let mut packages = Vec::new();
    for (effname, project) in projects {
        if !failures.iter().any(|failure| failure.effname == effname) {
            packages.extend(project);
        }
    }

    ClassifyOutcome { packages, failures }
}
