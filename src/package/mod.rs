//! Package record and version status types
//!
//! A [`Package`] is one occurrence of a project in one repository. Parsers
//! (outside this crate) create it with raw fields populated; the rule
//! engine rewrites its canonical name, version, flags, branch and flavors;
//! the classifier fills in [`Package::status`]. Nothing upstream is ever
//! mutated back.

mod flags;

pub use flags::PackageFlags;

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::version::{VersionModifiers, VersionSpec, version_compare};

/// Version status assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// The best known version of the project.
    Newest,
    /// A newer version exists in some other repository.
    Outdated,
    /// Not comparable, excluded from freshness decisions.
    Ignored,
    /// The project exists in a single repository family only.
    Unique,
    /// The best version of the development (unstable) line.
    Devel,
    /// An older maintained release line, still receiving updates.
    Legacy,
    /// Version is known to be wrong.
    Incorrect,
    /// Version comes from an untrusted source.
    Untrusted,
    /// Project has no versioning scheme.
    Noscheme,
    /// Rolling release, not comparable to numbered versions.
    Rolling,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Newest => "newest",
            PackageStatus::Outdated => "outdated",
            PackageStatus::Ignored => "ignored",
            PackageStatus::Unique => "unique",
            PackageStatus::Devel => "devel",
            PackageStatus::Legacy => "legacy",
            PackageStatus::Incorrect => "incorrect",
            PackageStatus::Untrusted => "untrusted",
            PackageStatus::Noscheme => "noscheme",
            PackageStatus::Rolling => "rolling",
        }
    }

    /// Whether this status means the version took no part in freshness
    /// comparison.
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            PackageStatus::Ignored
                | PackageStatus::Incorrect
                | PackageStatus::Untrusted
                | PackageStatus::Noscheme
                | PackageStatus::Rolling
        )
    }
}

impl FromStr for PackageStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(PackageStatus::Newest),
            "outdated" => Ok(PackageStatus::Outdated),
            "ignored" => Ok(PackageStatus::Ignored),
            "unique" => Ok(PackageStatus::Unique),
            "devel" => Ok(PackageStatus::Devel),
            "legacy" => Ok(PackageStatus::Legacy),
            "incorrect" => Ok(PackageStatus::Incorrect),
            "untrusted" => Ok(PackageStatus::Untrusted),
            "noscheme" => Ok(PackageStatus::Noscheme),
            "rolling" => Ok(PackageStatus::Rolling),
            _ => Err(()),
        }
    }
}

/// One occurrence of a project in one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Repository identifier.
    pub repo: String,
    /// Repository family, stable across repository renames.
    pub family: String,
    /// Optional sub-area within the repository.
    pub subrepo: Option<String>,

    /// As-scraped package name.
    pub name: Option<String>,
    /// As-scraped source package name.
    pub srcname: Option<String>,
    /// As-scraped binary package name.
    pub binname: Option<String>,
    /// Canonical cross-repository project name; rewritten by rules.
    pub effname: String,

    /// Canonical comparable version; rewritten by rules.
    pub version: String,
    /// Version before any rule rewrote it.
    pub origversion: Option<String>,
    /// Version exactly as scraped, immutable.
    pub rawversion: String,

    /// Version status; unset until classification, set exactly once.
    pub status: Option<PackageStatus>,
    pub flags: PackageFlags,
    /// Parallel maintained release line, if any.
    pub branch: Option<String>,
    /// Build-variant tags, ordered and deduplicated.
    pub flavors: Vec<String>,

    pub category: Option<String>,
    pub maintainers: Vec<String>,
    pub homepage: Option<String>,
    pub summary: Option<String>,
    pub licenses: Vec<String>,
}

impl Package {
    pub fn has_flag(&self, flag: PackageFlags) -> bool {
        self.flags.intersects(flag)
    }

    pub fn set_flag(&mut self, flag: PackageFlags, value: bool) {
        self.flags.set(flag, value);
    }

    /// The version string with everything that affects its ordering.
    pub fn version_spec(&self) -> VersionSpec<'_> {
        VersionSpec {
            version: &self.version,
            modifiers: VersionModifiers {
                p_is_patch: self.has_flag(PackageFlags::P_IS_PATCH),
                any_is_patch: self.has_flag(PackageFlags::ANY_IS_PATCH),
            },
            metaorder: self.flags.metaorder(),
        }
    }

    /// Compare this package's version against another package's,
    /// honoring both packages' flags.
    pub fn version_compare(&self, other: &Package) -> Ordering {
        version_compare(self.version_spec(), other.version_spec())
    }
}
