//! Version string comparison with repository-specific ordering semantics
//!
//! Free-form version strings from incompatible packaging ecosystems are
//! compared by splitting them into alignable components rather than by
//! parsing them against any single versioning grammar. The comparison is
//! total and never fails: any string, including an empty one, has a
//! well-defined position in the order.
//!
//! Two per-package modifiers change how ambiguous suffixes are read:
//!
//! - [`p_is_patch`](VersionModifiers::p_is_patch): a trailing `p<N>`
//!   component ("1.2p1") is a patch level on top of the release instead of
//!   a pre-release ("1.2pre1").
//! - [`any_is_patch`](VersionModifiers::any_is_patch): any trailing
//!   `<letter><N>` component is a patch level.
//!
//! On top of component comparison sits a coarse [`Metaorder`] tier:
//! rolling versions compare greater than any numbered version and sink
//! versions compare lesser, regardless of the literal strings.

use std::cmp::Ordering;

/// Modifiers changing the interpretation of letter-suffixed components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionModifiers {
    /// Treat a trailing "p<N>" as a patch level, not a pre-release.
    pub p_is_patch: bool,
    /// Treat any trailing "<letter><N>" as a patch level.
    pub any_is_patch: bool,
}

/// Coarse ordering tier which dominates component-wise comparison.
///
/// Variant order is the comparison order: `Sink < Normal < Rolling`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metaorder {
    /// Always lesser than any normal version.
    Sink,
    #[default]
    Normal,
    /// Always greater than any normal version.
    Rolling,
}

/// A version string together with everything that affects its ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionSpec<'a> {
    pub version: &'a str,
    pub modifiers: VersionModifiers,
    pub metaorder: Metaorder,
}

impl<'a> VersionSpec<'a> {
    pub fn new(version: &'a str) -> Self {
        Self {
            version,
            modifiers: VersionModifiers::default(),
            metaorder: Metaorder::Normal,
        }
    }
}

/// A run of decimal digits with leading zeros stripped, or nothing at all.
///
/// `Absent` sorts below any digit run, including zero; this is what makes
/// a pre-release component ("1.0.rc1") sort below its base version padded
/// with zeros. Digit runs compare by length first, then lexicographically,
/// so arbitrarily long runs never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumPart<'a> {
    Absent,
    Digits(&'a str),
}

impl<'a> NumPart<'a> {
    const ZERO: NumPart<'static> = NumPart::Digits("");

    fn from_digits(digits: &'a str) -> Self {
        NumPart::Digits(digits.trim_start_matches('0'))
    }
}

impl Ord for NumPart<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NumPart::Absent, NumPart::Absent) => Ordering::Equal,
            (NumPart::Absent, NumPart::Digits(_)) => Ordering::Less,
            (NumPart::Digits(_), NumPart::Absent) => Ordering::Greater,
            (NumPart::Digits(a), NumPart::Digits(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
        }
    }
}

impl PartialOrd for NumPart<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One alignable component: numeric prefix, letter class, numeric suffix.
///
/// "2.0a1" and "2.0.a.1" produce comparable triple sequences; missing
/// positions pad as `(0, none, absent)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Triple<'a> {
    num: NumPart<'a>,
    letter: Option<char>,
    extra: NumPart<'a>,
}

impl Triple<'_> {
    const PADDING: Triple<'static> = Triple {
        num: NumPart::ZERO,
        letter: None,
        extra: NumPart::Absent,
    };
}

fn split_token<'a>(token: &'a str, modifiers: VersionModifiers, out: &mut Vec<Triple<'a>>) {
    let num_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    let (num_str, rest) = token.split_at(num_end);

    let alpha_end = rest
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (alpha_str, extra_str) = rest.split_at(alpha_end);

    let num = if num_str.is_empty() {
        NumPart::Absent
    } else {
        NumPart::from_digits(num_str)
    };

    let Some(letter) = alpha_str.chars().next() else {
        out.push(Triple {
            num,
            letter: None,
            extra: NumPart::Absent,
        });
        return;
    };

    // only the first letter matters: "alpha" == "a", "beta" == "b"
    let letter = letter.to_ascii_lowercase();

    let extra = if extra_str.is_empty() {
        NumPart::Absent
    } else {
        NumPart::from_digits(extra_str)
    };

    if num != NumPart::Absent && extra != NumPart::Absent {
        // A component with digits on both sides of the letter ("0alpha1")
        // is split into a base triple plus a suffix triple. The suffix
        // sorts below zero padding (pre-release) unless the modifiers say
        // it is a patch level, in which case it sorts above.
        let is_patch =
            modifiers.any_is_patch || (modifiers.p_is_patch && letter == 'p');
        let marker = if is_patch {
            NumPart::ZERO
        } else {
            NumPart::Absent
        };

        out.push(Triple {
            num,
            letter: None,
            extra: NumPart::Absent,
        });
        out.push(Triple {
            num: marker,
            letter: Some(letter),
            extra,
        });
    } else {
        out.push(Triple {
            num,
            letter: Some(letter),
            extra,
        });
    }
}

fn split_components<'a>(spec: &VersionSpec<'a>) -> Vec<Triple<'a>> {
    let mut out = Vec::new();
    for token in spec
        .version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        split_token(token, spec.modifiers, &mut out);
    }
    out
}

/// Compare two versions into a three-way ordering.
///
/// The metaorder tier is checked first and dominates the result entirely;
/// otherwise components are compared left to right with zero padding to
/// equal length.
pub fn version_compare(a: VersionSpec<'_>, b: VersionSpec<'_>) -> Ordering {
    match a.metaorder.cmp(&b.metaorder) {
        Ordering::Equal => {}
        ord => return ord,
    }

    let ca = split_components(&a);
    let cb = split_components(&b);

    for pos in 0..ca.len().max(cb.len()) {
        let ta = ca.get(pos).unwrap_or(&Triple::PADDING);
        let tb = cb.get(pos).unwrap_or(&Triple::PADDING);

        match ta.cmp(tb) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    Ordering::Equal
}

/// Compare two plain version strings with default modifiers.
///
/// This is the comparison used by ruleset version predicates, where no
/// per-package flags are in play.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_compare(VersionSpec::new(a), VersionSpec::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_versions(a, b)
    }

    #[rstest]
    #[case("1", "1.0", Ordering::Equal)]
    #[case("1.0.0", "1", Ordering::Equal)]
    #[case("1.0", "1.0.0.0.0", Ordering::Equal)]
    #[case("1.2.3", "1.2.4", Ordering::Less)]
    #[case("1.10", "1.9", Ordering::Greater)]
    #[case("1.01", "1.1", Ordering::Equal)]
    #[case("0.9", "1.0", Ordering::Less)]
    #[case("1.0alpha1", "1.0", Ordering::Less)]
    #[case("1.0", "1.0alpha1", Ordering::Greater)]
    #[case("1.0alpha1", "1.0alpha2", Ordering::Less)]
    #[case("1.0alpha1", "1.0beta1", Ordering::Less)]
    #[case("1.0alpha1", "1.0.a.1", Ordering::Greater)]
    #[case("1.0rc1", "1.0", Ordering::Less)]
    #[case("1.0a", "1.0", Ordering::Greater)]
    #[case("1.0.a", "1.0", Ordering::Less)]
    #[case("1.0_1", "1.0.1", Ordering::Equal)]
    #[case("1.0+git1", "1.0.git1", Ordering::Equal)]
    #[case("1.0alpha1", "1.0.alpha1", Ordering::Equal)]
    #[case("", "0", Ordering::Equal)]
    #[case("", "1", Ordering::Less)]
    #[case("abc", "1", Ordering::Less)]
    #[case("a", "b", Ordering::Less)]
    fn compare_plain_versions(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Ordering,
    ) {
        assert_eq!(cmp(a, b), expected);
        assert_eq!(cmp(b, a), expected.reverse());
    }

    #[test]
    fn long_digit_runs_do_not_overflow() {
        assert_eq!(
            cmp("99999999999999999999999999999999999999999999", "9"),
            Ordering::Greater
        );
        assert_eq!(
            cmp(
                "100000000000000000000000000000000000000000000",
                "99999999999999999999999999999999999999999999"
            ),
            Ordering::Greater
        );
        assert_eq!(
            cmp(
                "00099999999999999999999999999999999999999999999",
                "99999999999999999999999999999999999999999999"
            ),
            Ordering::Equal
        );
    }

    #[rstest]
    #[case(false, false, Ordering::Less)]
    #[case(true, false, Ordering::Greater)]
    #[case(false, true, Ordering::Greater)]
    fn patch_modifiers_flip_trailing_p(
        #[case] p_is_patch: bool,
        #[case] any_is_patch: bool,
        #[case] expected: Ordering,
    ) {
        let a = VersionSpec {
            version: "1.2p1",
            modifiers: VersionModifiers {
                p_is_patch,
                any_is_patch,
            },
            metaorder: Metaorder::Normal,
        };
        assert_eq!(version_compare(a, VersionSpec::new("1.2")), expected);
    }

    #[test]
    fn any_is_patch_applies_to_arbitrary_letters() {
        let a = VersionSpec {
            version: "1.2a1",
            modifiers: VersionModifiers {
                p_is_patch: false,
                any_is_patch: true,
            },
            metaorder: Metaorder::Normal,
        };
        assert_eq!(version_compare(a, VersionSpec::new("1.2")), Ordering::Greater);
        // p_is_patch alone leaves non-"p" letters as pre-releases
        let b = VersionSpec {
            version: "1.2a1",
            modifiers: VersionModifiers {
                p_is_patch: true,
                any_is_patch: false,
            },
            metaorder: Metaorder::Normal,
        };
        assert_eq!(version_compare(b, VersionSpec::new("1.2")), Ordering::Less);
    }

    #[rstest]
    #[case(Metaorder::Rolling, "0.0.1", Metaorder::Normal, "999", Ordering::Greater)]
    #[case(Metaorder::Sink, "999", Metaorder::Normal, "0.0.1", Ordering::Less)]
    #[case(Metaorder::Sink, "1", Metaorder::Rolling, "1", Ordering::Less)]
    #[case(Metaorder::Rolling, "1", Metaorder::Rolling, "2", Ordering::Less)]
    fn metaorder_dominates_components(
        #[case] ma: Metaorder,
        #[case] va: &str,
        #[case] mb: Metaorder,
        #[case] vb: &str,
        #[case] expected: Ordering,
    ) {
        let a = VersionSpec {
            version: va,
            modifiers: VersionModifiers::default(),
            metaorder: ma,
        };
        let b = VersionSpec {
            version: vb,
            modifiers: VersionModifiers::default(),
            metaorder: mb,
        };
        assert_eq!(version_compare(a, b), expected);
    }

    #[test]
    fn ordering_is_antisymmetric_across_sample() {
        let versions = [
            "", "0", "1", "1.0alpha1", "1.0beta2", "1.0", "1.0a", "1.0.1",
            "1.1", "2.0rc1", "2.0", "2.0.a.1", "10", "2021.01.01",
        ];
        for a in versions {
            for b in versions {
                assert_eq!(cmp(a, b), cmp(b, a).reverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn equal_results_are_transitive() {
        let equal = ["1", "1.0", "1.0.0", "01.0", "1_0", "1+0"];
        for a in equal {
            for b in equal {
                assert_eq!(cmp(a, b), Ordering::Equal, "{a} vs {b}");
            }
        }
    }
}
