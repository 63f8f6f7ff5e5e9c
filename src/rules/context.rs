//! Per-package and per-match rule evaluation state
//!
//! [`PackageContext`] lives for the whole rule pipeline run on one package
//! and lets rules communicate through sticky context flags. A fresh
//! [`MatchContext`] is produced by every successful rule match and carries
//! the capture groups that actions may reference through `$N` tokens.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DOLLAR_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([0-9])").expect("static pattern"));

/// State shared by all rules applied to one package.
#[derive(Debug, Default)]
pub struct PackageContext {
    flags: HashSet<String>,
    rulesets: HashSet<String>,
    pub(crate) warnings: Vec<String>,
    pub(crate) matched_rules: Vec<usize>,
}

impl PackageContext {
    pub fn new(rulesets: impl IntoIterator<Item = String>) -> Self {
        Self {
            rulesets: rulesets.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn add_flag(&mut self, name: String) {
        self.flags.insert(name);
    }

    pub fn has_any_flag(&self, names: &[String]) -> bool {
        names.iter().any(|name| self.flags.contains(name))
    }

    pub fn has_any_ruleset(&self, rulesets: &[String]) -> bool {
        rulesets.iter().any(|name| self.rulesets.contains(name))
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_matched_rule(&mut self, number: usize) {
        self.matched_rules.push(number);
    }
}

/// Captures from one successful rule match, immutable once built.
#[derive(Debug, Default)]
pub struct MatchContext {
    name_captures: Option<Vec<Option<String>>>,
    ver_captures: Option<Vec<Option<String>>>,
    pub(crate) last: bool,
}

/// Outcome of `$N` substitution; the group index is resolved by the caller
/// into a [`TransformError`](super::TransformError) with rule context.
pub(crate) type SubstResult = Result<String, usize>;

impl MatchContext {
    pub fn set_name_captures(&mut self, captures: &Captures<'_>) {
        self.name_captures = Some(owned_captures(captures));
    }

    pub fn set_ver_captures(&mut self, captures: &Captures<'_>) {
        self.ver_captures = Some(owned_captures(captures));
    }

    /// Substitute `$N` tokens from the name pattern match, or `$0` with
    /// `fullstr` when the rule had no name pattern.
    pub(crate) fn sub_name_dollars(&self, template: &str, fullstr: &str) -> SubstResult {
        substitute(template, self.name_captures.as_deref(), fullstr)
    }

    /// Substitute `$N` tokens from the version pattern match, or `$0` with
    /// `fullstr` when the rule had no version pattern.
    pub(crate) fn sub_ver_dollars(&self, template: &str, fullstr: &str) -> SubstResult {
        substitute(template, self.ver_captures.as_deref(), fullstr)
    }
}

fn owned_captures(captures: &Captures<'_>) -> Vec<Option<String>> {
    (0..captures.len())
        .map(|i| captures.get(i).map(|m| m.as_str().to_string()))
        .collect()
}

fn substitute(
    template: &str,
    captures: Option<&[Option<String>]>,
    fullstr: &str,
) -> SubstResult {
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    for found in DOLLAR_REF.captures_iter(template) {
        let whole = found.get(0).expect("group 0 always participates");
        let group: usize = found[1].parse().expect("single digit");

        out.push_str(&template[pos..whole.start()]);
        pos = whole.end();

        match captures {
            None => {
                // without a pattern match only $0 means anything; it
                // stands for the whole subject string
                if group == 0 {
                    out.push_str(fullstr);
                } else {
                    out.push_str(whole.as_str());
                }
            }
            Some(captures) => match captures.get(group) {
                Some(Some(text)) => out.push_str(text),
                // group exists in the pattern but did not participate
                // in this particular match
                Some(None) | None => return Err(group),
            },
        }
    }

    out.push_str(&template[pos..]);
    Ok(out)
}
