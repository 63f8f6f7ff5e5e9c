//! Named package flag bitset
//!
//! Flags are set by ruleset actions and consumed by version comparison and
//! classification. The set is fixed; flags compose bitwise and every read
//! goes through a named constant, never a raw integer.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::version::Metaorder;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageFlags(u32);

impl PackageFlags {
    pub const EMPTY: Self = Self(0);

    /// Exclude the package from further processing entirely.
    pub const REMOVE: Self = Self(1 << 0);
    /// Development (unstable) release line.
    pub const DEVEL: Self = Self(1 << 1);
    /// Version is not to be trusted for freshness decisions.
    pub const IGNORE: Self = Self(1 << 2);
    /// Version is known to be plain wrong.
    pub const INCORRECT: Self = Self(1 << 3);
    /// Version comes from a source prone to making versions up.
    pub const UNTRUSTED: Self = Self(1 << 4);
    /// Project has no versioning scheme at all.
    pub const NOSCHEME: Self = Self(1 << 5);
    /// Rolling release: always greater than any numbered version.
    pub const ROLLING: Self = Self(1 << 7);
    /// Forced outdated by a ruleset action.
    pub const OUTDATED: Self = Self(1 << 8);
    /// Forced legacy by a ruleset action.
    pub const LEGACY: Self = Self(1 << 9);
    /// Trailing "p<N>" is a patch level, not a pre-release.
    pub const P_IS_PATCH: Self = Self(1 << 10);
    /// Any trailing letter+number is a patch level.
    pub const ANY_IS_PATCH: Self = Self(1 << 11);
    /// Log rule application for this package.
    pub const TRACE: Self = Self(1 << 12);
    /// Devel only if no repository ships this version as stable.
    pub const WEAK_DEVEL: Self = Self(1 << 13);
    /// Overrides any devel classification.
    pub const STABLE: Self = Self(1 << 14);
    /// Alternative version for the same release (e.g. repackaged).
    pub const ALTVER: Self = Self(1 << 15);
    /// Version has known vulnerabilities.
    pub const VULNERABLE: Self = Self(1 << 16);
    /// Alternative, mutually exclusive versioning scheme.
    pub const ALTSCHEME: Self = Self(1 << 17);
    /// Never classify as legacy.
    pub const NOLEGACY: Self = Self(1 << 18);
    /// Sink: always lesser than any numbered version.
    pub const SINK: Self = Self(1 << 19);
    /// Version was published and then withdrawn upstream.
    pub const RECALLED: Self = Self(1 << 20);

    /// Any of the ignored-type flags.
    pub const ANY_IGNORED: Self = Self(
        Self::IGNORE.0 | Self::INCORRECT.0 | Self::UNTRUSTED.0 | Self::NOSCHEME.0,
    );

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any flag of `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if all flags of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    /// Coarse version ordering tier derived from flags.
    pub fn metaorder(self) -> Metaorder {
        if self.intersects(Self::ROLLING) {
            Metaorder::Rolling
        } else if self.intersects(Self::SINK) {
            Metaorder::Sink
        } else {
            Metaorder::Normal
        }
    }
}

impl BitOr for PackageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PackageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PackageFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

const FLAG_NAMES: &[(PackageFlags, &str)] = &[
    (PackageFlags::REMOVE, "REMOVE"),
    (PackageFlags::DEVEL, "DEVEL"),
    (PackageFlags::IGNORE, "IGNORE"),
    (PackageFlags::INCORRECT, "INCORRECT"),
    (PackageFlags::UNTRUSTED, "UNTRUSTED"),
    (PackageFlags::NOSCHEME, "NOSCHEME"),
    (PackageFlags::ROLLING, "ROLLING"),
    (PackageFlags::OUTDATED, "OUTDATED"),
    (PackageFlags::LEGACY, "LEGACY"),
    (PackageFlags::P_IS_PATCH, "P_IS_PATCH"),
    (PackageFlags::ANY_IS_PATCH, "ANY_IS_PATCH"),
    (PackageFlags::TRACE, "TRACE"),
    (PackageFlags::WEAK_DEVEL, "WEAK_DEVEL"),
    (PackageFlags::STABLE, "STABLE"),
    (PackageFlags::ALTVER, "ALTVER"),
    (PackageFlags::VULNERABLE, "VULNERABLE"),
    (PackageFlags::ALTSCHEME, "ALTSCHEME"),
    (PackageFlags::NOLEGACY, "NOLEGACY"),
    (PackageFlags::SINK, "SINK"),
    (PackageFlags::RECALLED, "RECALLED"),
];

impl fmt::Display for PackageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }

        let mut first = true;
        for (flag, name) in FLAG_NAMES {
            if self.intersects(*flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PackageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageFlags({self})")
    }
}
