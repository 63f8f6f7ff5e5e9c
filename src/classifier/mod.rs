//! Version classifier
//!
//! Takes every package of one project (one canonical name) and assigns
//! each a [`PackageStatus`](crate::package::PackageStatus):
//!
//! ```text
//!   packages --> preprocess --> sort desc --> groups --> sections
//!   (rolling split off)                         |           |
//!                                               v           v
//!                                  per-repo walk: status per package
//! ```
//!
//! Alternate-scheme packages classify in their own sub-pipeline so they
//! never compete against normal-scheme versions. Within a sub-pipeline
//! the walk is strictly sequential; parallelism belongs across projects,
//! not inside one.

mod group;
mod section;

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;

use crate::package::{Package, PackageFlags, PackageStatus};

use group::group_packages;
use section::{Section, SectionKind};

/// Classification invariant violation.
///
/// These indicate an upstream transformation bug; the project is left
/// unclassified and reported, the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("project has no packages to classify")]
    EmptyProject,

    #[error("package from {repo} has an empty version")]
    MissingVersion { repo: String },

    #[error("package from {repo} has an empty canonical name")]
    MissingName { repo: String },

    #[error("package from {repo} is already classified")]
    AlreadyClassified { repo: String },
}

/// Assign a status to every package of one project.
///
/// Input order does not affect the outcome; packages are sorted by
/// descending version before any decision is made.
pub fn classify_packages(packages: &mut [Package]) -> Result<(), ClassifyError> {
    if packages.is_empty() {
        return Err(ClassifyError::EmptyProject);
    }
    for package in packages.iter() {
        if package.version.is_empty() {
            return Err(ClassifyError::MissingVersion {
                repo: package.repo.clone(),
            });
        }
        if package.effname.is_empty() {
            return Err(ClassifyError::MissingName {
                repo: package.repo.clone(),
            });
        }
        if package.status.is_some() {
            return Err(ClassifyError::AlreadyClassified {
                repo: package.repo.clone(),
            });
        }
    }

    let is_unique = is_project_unique(packages);

    // rolling releases are not comparable to numbered ones and classify
    // right away; everything else goes through the full pipeline
    let mut indices = Vec::with_capacity(packages.len());
    for (index, package) in packages.iter_mut().enumerate() {
        if package.has_flag(PackageFlags::ROLLING) {
            package.status = Some(PackageStatus::Rolling);
        } else {
            indices.push(index);
        }
    }

    indices.sort_by(|&a, &b| packages[b].version_compare(&packages[a]));

    let suppress_ignore = should_suppress_ignore(&indices, packages);

    let (alt, normal): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&index| packages[index].has_flag(PackageFlags::ALTSCHEME));
    if !alt.is_empty() {
        classify_sorted(&alt, packages, is_unique, suppress_ignore);
    }
    if !normal.is_empty() {
        classify_sorted(&normal, packages, is_unique, suppress_ignore);
    }

    Ok(())
}

fn is_project_unique(packages: &[Package]) -> bool {
    packages
        .iter()
        .all(|package| package.family == packages[0].family)
}

/// Whole project is one family of ignored-only packages: suppress the
/// ignoring so versions still classify against each other, assuming one
/// origin formats versions consistently. NOSCHEME disqualifies, as does
/// nix mixing its two snapshot version schemes (the old scheme sorts
/// above the new one, so comparison would invert freshness).
fn should_suppress_ignore(indices: &[usize], packages: &[Package]) -> bool {
    if indices.len() <= 1 {
        return true;
    }

    let first_family = &packages[indices[0]].family;
    for &index in indices {
        let package = &packages[index];
        if package.family != *first_family
            || !package.has_flag(PackageFlags::ANY_IGNORED)
            || package.has_flag(PackageFlags::NOSCHEME)
        {
            return false;
        }
    }

    !is_nix_mixed_snapshot_schemes(indices, packages)
}

fn is_nix_mixed_snapshot_schemes(indices: &[usize], packages: &[Package]) -> bool {
    if packages[indices[0]].family != "nix" {
        return false;
    }

    let mut has_old_scheme = false;
    let mut has_new_scheme = false;
    for &index in indices {
        if packages[index].version.starts_with("20") {
            has_old_scheme = true;
        } else if packages[index].version.starts_with("0-unstable-") {
            has_new_scheme = true;
        }
    }
    has_old_scheme && has_new_scheme
}

/// Classify one sub-pipeline of version-sorted package indices.
fn classify_sorted(
    indices: &[usize],
    packages: &mut [Package],
    is_unique: bool,
    suppress_ignore: bool,
) {
    let groups = group_packages(indices, packages, suppress_ignore);

    let mut sections = [
        Section::new(SectionKind::Devel),
        Section::new(SectionKind::Stable),
    ];

    let mut best_in_branch: HashMap<Option<String>, usize> = HashMap::new();
    let mut packages_by_repo: IndexMap<String, Vec<(usize, usize)>> = IndexMap::new();

    // pass 1: section boundaries from groups that count, plus the best
    // non-devel package per branch
    let mut current = 0;
    for group in groups.iter().filter(|group| !group.totally_ignored) {
        if !group.is_devel {
            for branch in &group.branches {
                best_in_branch
                    .entry(branch.clone())
                    .or_insert(group.members[0]);
            }
        }

        while !sections[current].is_suitable_for_group(group) {
            current += 1;
        }
        let alt = group.all_flags.intersects(PackageFlags::ALTVER);
        sections[current].add_package(group.members[0], alt);
    }

    // pass 2: place every group, ignored ones included; an ignored group
    // sandwiched inside a section's span stays there instead of pushing
    // the cursor forward
    let mut current = 0;
    for group in &groups {
        let alt = group.all_flags.intersects(PackageFlags::ALTVER);
        let repr = group.members[0];
        while !(sections[current].contains_package(repr, alt, packages)
            || sections[current].is_suitable_for_group(group)
            || sections[current].follows_package(repr, alt, packages))
        {
            current += 1;
        }

        for &member in &group.members {
            packages_by_repo
                .entry(packages[member].repo.clone())
                .or_default()
                .push((member, current));
        }
    }

    // pass 3: statuses, walking each repository's packages in version
    // order within their assigned sections
    for repo_packages in packages_by_repo.values() {
        let mut first_in_section: HashMap<String, usize> = HashMap::new();
        let mut first_in_branch: HashMap<(Option<String>, String), usize> = HashMap::new();

        let mut prev_section = None;
        for &(index, section_index) in repo_packages {
            if prev_section != Some(section_index) {
                first_in_section.clear();
                prev_section = Some(section_index);
            }
            let section = &sections[section_index];
            let alt = packages[index].has_flag(PackageFlags::ALTVER);

            let comparison = section.compared_to_best(index, alt, packages);

            let mut status = if comparison.is_gt() {
                // above the section's best, so only an ignored version
                // can sit here; precedence: noscheme beats everything
                // (no versioning scheme makes correctness meaningless),
                // incorrect beats untrusted as more specific, plain
                // ignore is the most generic, and without any of those
                // it is just outdated
                if packages[index].has_flag(PackageFlags::NOSCHEME) {
                    PackageStatus::Noscheme
                } else if packages[index].has_flag(PackageFlags::INCORRECT) {
                    PackageStatus::Incorrect
                } else if packages[index].has_flag(PackageFlags::UNTRUSTED) {
                    PackageStatus::Untrusted
                } else if packages[index].has_flag(PackageFlags::IGNORE) {
                    PackageStatus::Ignored
                } else {
                    PackageStatus::Outdated
                }
            } else {
                let flavor = packages[index].flavors.join("_");
                let branch_key = (packages[index].branch.clone(), flavor.clone());

                let status = if comparison.is_eq() {
                    if is_unique {
                        PackageStatus::Unique
                    } else {
                        section.kind.newest_status()
                    }
                } else {
                    let non_first_in_section = first_in_section.get(&flavor).is_some_and(
                        |&first| !packages[first].version_compare(&packages[index]).is_eq(),
                    );

                    // first of its (branch, flavor) here, yet some other
                    // repository holds a better version of this branch:
                    // an unrelated laggard, not a maintained legacy line
                    let first_but_not_best_in_branch = first_in_branch
                        .get(&branch_key)
                        .is_none_or(|&first| {
                            packages[first].version_compare(&packages[index]).is_eq()
                        })
                        && best_in_branch
                            .get(&packages[index].branch)
                            .is_some_and(|&best| {
                                packages[best].version_compare(&packages[index]).is_gt()
                            });

                    let legacy_allowed = (non_first_in_section
                        && !first_but_not_best_in_branch
                        && !packages[index].has_flag(PackageFlags::NOLEGACY))
                        || packages[index].has_flag(PackageFlags::LEGACY);

                    if legacy_allowed {
                        PackageStatus::Legacy
                    } else {
                        PackageStatus::Outdated
                    }
                };

                first_in_section.entry(flavor).or_insert(index);
                first_in_branch.entry(branch_key).or_insert(index);
                status
            };

            if packages[index].has_flag(PackageFlags::OUTDATED)
                && matches!(
                    status,
                    PackageStatus::Unique | PackageStatus::Newest | PackageStatus::Devel
                )
            {
                status = PackageStatus::Outdated;
            }

            packages[index].status = Some(status);
        }
    }
}
