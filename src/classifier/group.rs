//! Version groups
//!
//! Packages sorted by descending version collapse into groups of equal
//! versions; classification then reasons about groups, not individual
//! packages, so equal versions always receive coherent statuses.

use std::collections::HashSet;

use crate::package::{Package, PackageFlags};

/// Equally versioned packages with aggregate values.
#[derive(Debug)]
pub(crate) struct VersionGroup {
    /// Union of member flags.
    pub all_flags: PackageFlags,
    /// Whether the group belongs to the development line.
    pub is_devel: bool,
    /// Every member is ignored-type, so the group must not influence
    /// section geometry.
    pub totally_ignored: bool,
    /// Member indices into the project's package slice, input order.
    pub members: Vec<usize>,
    /// Branches present among members.
    pub branches: HashSet<Option<String>>,
}

/// Collapse sorted package indices into version groups.
///
/// With `suppress_ignore` set, ignored-type flags do not mark groups as
/// totally ignored (the single-family fallback); RECALLED groups stay
/// totally ignored regardless, a recalled release must never win.
pub(crate) fn group_packages(
    indices: &[usize],
    packages: &[Package],
    suppress_ignore: bool,
) -> Vec<VersionGroup> {
    let mut groups: Vec<VersionGroup> = Vec::new();

    for &index in indices {
        let same_version = groups.last().is_some_and(|group: &VersionGroup| {
            packages[group.members[0]]
                .version_compare(&packages[index])
                .is_eq()
        });
        if !same_version {
            groups.push(VersionGroup {
                all_flags: PackageFlags::default(),
                is_devel: false,
                totally_ignored: !suppress_ignore,
                members: Vec::new(),
                branches: HashSet::new(),
            });
        }

        let group = groups.last_mut().expect("group pushed above");
        let package = &packages[index];

        group.all_flags |= package.flags;
        if !package.has_flag(PackageFlags::ANY_IGNORED) {
            group.totally_ignored = false;
        }
        group.branches.insert(package.branch.clone());
        group.members.push(index);
    }

    for group in &mut groups {
        if group.all_flags.intersects(PackageFlags::RECALLED) {
            group.totally_ignored = true;
        }

        let has_non_devel = group.members.iter().any(|&index| {
            !packages[index].has_flag(PackageFlags::DEVEL | PackageFlags::WEAK_DEVEL)
        });
        group.is_devel = (group.all_flags.intersects(PackageFlags::DEVEL)
            || (group.all_flags.intersects(PackageFlags::WEAK_DEVEL) && !has_non_devel))
            && !group.all_flags.intersects(PackageFlags::STABLE);
    }

    groups
}
