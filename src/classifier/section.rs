//! Classification sections
//!
//! A project's sorted version groups partition into a development
//! section followed by a stable section. The devel section is guarded:
//! it only absorbs devel groups, and once a group fails the guard the
//! walk falls through to the stable section, which absorbs everything.
//!
//! Sections track their best package twice: `first` over normal-scheme
//! packages only, `first_alt` over all packages including ALTVER ones,
//! so that an alternate version on top does not outdate the real best.

use std::cmp::Ordering;

use crate::package::{Package, PackageStatus};

use super::group::VersionGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionKind {
    Devel,
    Stable,
}

impl SectionKind {
    /// Status of a package matching the section's best version.
    pub fn newest_status(self) -> PackageStatus {
        match self {
            SectionKind::Devel => PackageStatus::Devel,
            SectionKind::Stable => PackageStatus::Newest,
        }
    }
}

/// One section boundary tracker; package references are indices into
/// the project's package slice.
#[derive(Debug)]
pub(crate) struct Section {
    pub kind: SectionKind,
    first: Option<usize>,
    first_alt: Option<usize>,
    last: Option<usize>,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            first: None,
            first_alt: None,
            last: None,
        }
    }

    /// The guarded devel section only takes devel groups; the stable
    /// section, being last, takes anything.
    pub fn is_suitable_for_group(&self, group: &VersionGroup) -> bool {
        match self.kind {
            SectionKind::Devel => group.is_devel,
            SectionKind::Stable => true,
        }
    }

    pub fn add_package(&mut self, index: usize, alt: bool) {
        if self.first_alt.is_none() {
            self.first_alt = Some(index);
        }
        if self.first.is_none() && !alt {
            self.first = Some(index);
        }
        self.last = Some(index);
    }

    fn best(&self, alt: bool) -> Option<usize> {
        if alt { self.first_alt } else { self.first }
    }

    /// The section's best version is strictly below this package.
    pub fn follows_package(&self, index: usize, alt: bool, packages: &[Package]) -> bool {
        self.best(alt)
            .is_some_and(|first| packages[first].version_compare(&packages[index]).is_lt())
    }

    /// The package's version falls inside the section's version span.
    pub fn contains_package(&self, index: usize, alt: bool, packages: &[Package]) -> bool {
        let (Some(first), Some(last)) = (self.best(alt), self.last) else {
            return false;
        };
        packages[first].version_compare(&packages[index]).is_ge()
            && packages[last].version_compare(&packages[index]).is_le()
    }

    /// Compare a package against the section's best; an empty section
    /// counts as "better", so the package lands in the outdated branch.
    pub fn compared_to_best(&self, index: usize, alt: bool, packages: &[Package]) -> Ordering {
        match self.best(alt) {
            Some(first) => packages[index].version_compare(&packages[first]),
            None => Ordering::Greater,
        }
    }
}
