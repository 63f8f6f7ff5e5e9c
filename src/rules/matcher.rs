//! Matcher predicates compiled from rule documents
//!
//! A rule's predicates are evaluated in declared order; the first failing
//! predicate rejects the rule with no side effects. Name and version
//! pattern predicates record their capture groups on the match context
//! for later `$N` substitution by actions.

use std::collections::HashSet;

use regex::Regex;

use crate::package::Package;
use crate::version::compare_versions;

use super::context::{MatchContext, PackageContext};

/// One compiled matcher predicate.
#[derive(Debug)]
pub enum Matcher {
    /// Package's repository belongs to any of the named rulesets.
    Ruleset(Vec<String>),
    /// Package's repository belongs to none of the named rulesets.
    NoRuleset(Vec<String>),
    /// Category matches, case-insensitively.
    Category(HashSet<String>),
    /// Exact canonical name match.
    Name(Vec<String>),
    /// Full-match regex over the canonical name; captures recorded.
    NamePat(Regex),
    /// Exact version match.
    Ver(HashSet<String>),
    /// Version matches none of the listed strings.
    NotVer(HashSet<String>),
    /// Full-match regex over the lowercased version; captures recorded.
    VerPat(Regex),
    /// Version has more than N alphanumeric components.
    VerLonger(usize),
    /// Version has exactly N alphanumeric components.
    VerComps(usize),
    VerGt(String),
    VerGe(String),
    VerLt(String),
    VerLe(String),
    VerEq(String),
    VerNe(String),
    /// Full-match regex over the lowercased homepage.
    WwwPat(Regex),
    /// Homepage contains any of the lowercase substrings.
    WwwPart(Vec<String>),
    /// Summary contains any of the lowercase substrings.
    SummPart(Vec<String>),
    /// Any of the named context flags is set.
    Flag(Vec<String>),
    /// None of the named context flags is set.
    NoFlag(Vec<String>),
    /// Branch presence matches the expectation.
    HasBranch(bool),
}

fn version_component_count(version: &str) -> usize {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .count()
}

impl Matcher {
    pub fn matches(
        &self,
        package: &Package,
        package_context: &PackageContext,
        match_context: &mut MatchContext,
    ) -> bool {
        match self {
            Matcher::Ruleset(rulesets) => package_context.has_any_ruleset(rulesets),
            Matcher::NoRuleset(rulesets) => !package_context.has_any_ruleset(rulesets),
            Matcher::Category(categories) => package
                .category
                .as_deref()
                .is_some_and(|c| categories.contains(&c.to_lowercase())),
            Matcher::Name(names) => names.iter().any(|name| *name == package.effname),
            Matcher::NamePat(pattern) => match pattern.captures(&package.effname) {
                Some(captures) => {
                    match_context.set_name_captures(&captures);
                    true
                }
                None => false,
            },
            Matcher::Ver(versions) => versions.contains(&package.version),
            Matcher::NotVer(versions) => !versions.contains(&package.version),
            Matcher::VerPat(pattern) => {
                match pattern.captures(&package.version.to_lowercase()) {
                    Some(captures) => {
                        match_context.set_ver_captures(&captures);
                        true
                    }
                    None => false,
                }
            }
            Matcher::VerLonger(count) => version_component_count(&package.version) > *count,
            Matcher::VerComps(count) => version_component_count(&package.version) == *count,
            Matcher::VerGt(version) => compare_versions(&package.version, version).is_gt(),
            Matcher::VerGe(version) => compare_versions(&package.version, version).is_ge(),
            Matcher::VerLt(version) => compare_versions(&package.version, version).is_lt(),
            Matcher::VerLe(version) => compare_versions(&package.version, version).is_le(),
            Matcher::VerEq(version) => compare_versions(&package.version, version).is_eq(),
            Matcher::VerNe(version) => compare_versions(&package.version, version).is_ne(),
            Matcher::WwwPat(pattern) => package
                .homepage
                .as_deref()
                .is_some_and(|www| pattern.is_match(&www.to_lowercase())),
            Matcher::WwwPart(parts) => package.homepage.as_deref().is_some_and(|www| {
                let www = www.to_lowercase();
                parts.iter().any(|part| www.contains(part))
            }),
            Matcher::SummPart(parts) => package.summary.as_deref().is_some_and(|summary| {
                let summary = summary.to_lowercase();
                parts.iter().any(|part| summary.contains(part))
            }),
            Matcher::Flag(flags) => package_context.has_any_flag(flags),
            Matcher::NoFlag(flags) => !package_context.has_any_flag(flags),
            Matcher::HasBranch(expected) => package.branch.is_some() == *expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn package() -> Package {
        Package {
            repo: "freebsd".to_string(),
            family: "freebsd".to_string(),
            effname: "firefox".to_string(),
            version: "102.0b3".to_string(),
            rawversion: "102.0b3".to_string(),
            category: Some("www".to_string()),
            homepage: Some("https://Firefox.example.ORG/download".to_string()),
            summary: Some("Web Browser".to_string()),
            ..Default::default()
        }
    }

    fn check(matcher: Matcher, package: &Package) -> bool {
        let package_context = PackageContext::default();
        let mut match_context = MatchContext::default();
        matcher.matches(package, &package_context, &mut match_context)
    }

    #[rstest]
    #[case(Matcher::Name(vec!["firefox".into()]), true)]
    #[case(Matcher::Name(vec!["chromium".into(), "firefox".into()]), true)]
    #[case(Matcher::Name(vec!["chromium".into()]), false)]
    #[case(Matcher::Ver(HashSet::from(["102.0b3".to_string()])), true)]
    #[case(Matcher::NotVer(HashSet::from(["102.0b3".to_string()])), false)]
    #[case(Matcher::VerLonger(1), true)]
    #[case(Matcher::VerLonger(2), false)]
    #[case(Matcher::VerComps(2), true)]
    #[case(Matcher::VerComps(3), false)]
    #[case(Matcher::VerGt("101".into()), true)]
    // a prerelease sorts below its base version
    #[case(Matcher::VerGt("102".into()), false)]
    #[case(Matcher::VerLt("102".into()), true)]
    #[case(Matcher::VerGe("102.0b3".into()), true)]
    #[case(Matcher::Category(HashSet::from(["www".to_string()])), true)]
    #[case(Matcher::Category(HashSet::from(["games".to_string()])), false)]
    #[case(Matcher::WwwPart(vec!["firefox.example.org".into()]), true)]
    #[case(Matcher::WwwPart(vec!["mozilla.example".into()]), false)]
    #[case(Matcher::SummPart(vec!["web browser".into()]), true)]
    #[case(Matcher::HasBranch(false), true)]
    #[case(Matcher::HasBranch(true), false)]
    fn simple_matchers(#[case] matcher: Matcher, #[case] expected: bool) {
        assert_eq!(check(matcher, &package()), expected);
    }

    #[test]
    fn name_pattern_records_captures() {
        let matcher = Matcher::NamePat(Regex::new("^(fire)(fox)$").unwrap());
        let package_context = PackageContext::default();
        let mut match_context = MatchContext::default();

        assert!(matcher.matches(&package(), &package_context, &mut match_context));
        assert_eq!(
            match_context.sub_name_dollars("$2-$1", "firefox"),
            Ok("fox-fire".to_string())
        );
    }

    #[test]
    fn version_pattern_matches_lowercased() {
        let matcher = Matcher::VerPat(Regex::new("^([0-9]+)\\.0b([0-9]+)$").unwrap());
        let package_context = PackageContext::default();
        let mut match_context = MatchContext::default();

        assert!(matcher.matches(&package(), &package_context, &mut match_context));
        assert_eq!(
            match_context.sub_ver_dollars("$1.$2", "102.0b3"),
            Ok("102.3".to_string())
        );
    }

    #[test]
    fn ruleset_matchers_use_package_context() {
        let package = package();
        let package_context = PackageContext::new(["freebsd".to_string()]);
        let mut match_context = MatchContext::default();

        assert!(
            Matcher::Ruleset(vec!["freebsd".into()])
                .matches(&package, &package_context, &mut match_context)
        );
        assert!(
            !Matcher::NoRuleset(vec!["freebsd".into()])
                .matches(&package, &package_context, &mut match_context)
        );
    }
}
