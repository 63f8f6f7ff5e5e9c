//! Rule compilation from authored YAML documents
//!
//! A rule document is a mapping whose keys are matcher predicates and
//! actions; key order is evaluation order. Compilation turns it into
//! typed matcher and action vectors; any unknown key, bad value or
//! invalid back-reference aborts ruleset loading with the rule's source
//! position.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::package::{Package, PackageFlags};

use super::action::Action;
use super::context::{MatchContext, PackageContext};
use super::error::{RuleError, TransformError};
use super::matcher::Matcher;

static BACKREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([0-9])").expect("static pattern"));

/// Flag keys which compile to a plain set/clear action.
const FLAG_ACTIONS: &[(&str, PackageFlags)] = &[
    ("remove", PackageFlags::REMOVE),
    ("ignore", PackageFlags::IGNORE),
    ("devel", PackageFlags::DEVEL),
    ("stable", PackageFlags::STABLE),
    ("weak_devel", PackageFlags::WEAK_DEVEL),
    ("p_is_patch", PackageFlags::P_IS_PATCH),
    ("any_is_patch", PackageFlags::ANY_IS_PATCH),
    ("sink", PackageFlags::SINK),
    ("outdated", PackageFlags::OUTDATED),
    ("legacy", PackageFlags::LEGACY),
    ("nolegacy", PackageFlags::NOLEGACY),
    ("incorrect", PackageFlags::INCORRECT),
    ("untrusted", PackageFlags::UNTRUSTED),
    ("noscheme", PackageFlags::NOSCHEME),
    ("rolling", PackageFlags::ROLLING),
    ("trace", PackageFlags::TRACE),
    ("altver", PackageFlags::ALTVER),
    ("altscheme", PackageFlags::ALTSCHEME),
    ("vulnerable", PackageFlags::VULNERABLE),
    ("recalled", PackageFlags::RECALLED),
    // aliases kept for authored rules predating dedicated flags
    ("snapshot", PackageFlags::IGNORE),
    ("successor", PackageFlags::DEVEL),
    ("generated", PackageFlags::ROLLING),
];

/// One compiled, immutable rule.
#[derive(Debug)]
pub struct Rule {
    /// Stable sequence number within the ruleset; ties break by it.
    pub number: usize,
    /// Rendered rule text, for diagnostics.
    pub pretty: String,
    /// Stable hash of the rendered text; keys persisted statistics.
    pub hash: String,
    /// Exact names this rule is restricted to, for dispatch planning.
    pub names: Option<Vec<String>>,
    /// Name pattern source, for covering-block alternation.
    pub name_pattern: Option<String>,
    matchers: Vec<Matcher>,
    actions: Vec<Action>,
}

/// Which pattern's captures a template's `$N` tokens resolve against.
#[derive(Clone, Copy, PartialEq)]
enum BackrefKind {
    Name,
    Ver,
}

struct Compiler<'a> {
    path: &'a str,
    index: usize,
    names: Option<Vec<String>>,
    name_pattern: Option<String>,
    name_groups: usize,
    ver_groups: usize,
    matchers: Vec<Matcher>,
    actions: Vec<Action>,
    /// (key, template, kind) triples pending back-reference validation.
    backrefs: Vec<(String, String, BackrefKind)>,
}

impl Rule {
    /// Compile one rule document. `number` is the global sequence number,
    /// `index` the rule's position within its source file.
    pub fn compile(
        number: usize,
        path: &str,
        index: usize,
        data: &Mapping,
    ) -> Result<Rule, RuleError> {
        let pretty = serde_yaml::to_string(&Value::Mapping(data.clone())).map_err(|source| {
            RuleError::Parse {
                path: path.to_string(),
                source,
            }
        })?;
        let hash = hex::encode(Sha256::digest(pretty.as_bytes()));

        if data.contains_key("family") && data.contains_key("ruleset") {
            return Err(RuleError::ConflictingKeys {
                path: path.to_string(),
                index,
            });
        }

        let mut compiler = Compiler {
            path,
            index,
            names: None,
            name_pattern: None,
            name_groups: 0,
            ver_groups: 0,
            matchers: Vec::new(),
            actions: Vec::new(),
            backrefs: Vec::new(),
        };

        for (key, value) in data {
            let Some(key) = key.as_str() else {
                return Err(RuleError::NotAMapping {
                    path: path.to_string(),
                    index,
                });
            };
            compiler.compile_key(key, value)?;
        }

        compiler.validate_backrefs()?;

        Ok(Rule {
            number,
            pretty,
            hash,
            names: compiler.names,
            name_pattern: compiler.name_pattern,
            matchers: compiler.matchers,
            actions: compiler.actions,
        })
    }

    /// Evaluate this rule's predicates in order; the first failure
    /// rejects the rule with no side effects.
    pub fn match_package(
        &self,
        package: &Package,
        package_context: &PackageContext,
    ) -> Option<MatchContext> {
        let mut match_context = MatchContext::default();

        for matcher in &self.matchers {
            if !matcher.matches(package, package_context, &mut match_context) {
                return None;
            }
        }

        Some(match_context)
    }

    /// Apply this rule's actions in order.
    pub fn apply(
        &self,
        package: &mut Package,
        package_context: &mut PackageContext,
        match_context: &mut MatchContext,
    ) -> Result<(), TransformError> {
        for action in &self.actions {
            action.apply(self.number, package, package_context, match_context)?;
        }
        Ok(())
    }
}

impl Compiler<'_> {
    fn compile_key(&mut self, key: &str, value: &Value) -> Result<(), RuleError> {
        if let Some((_, flags)) = FLAG_ACTIONS.iter().find(|(name, _)| *name == key) {
            let value = self.as_bool(key, value)?;
            self.actions.push(Action::SetFlags(*flags, value));
            return Ok(());
        }

        match key {
            // matchers
            "ruleset" | "family" => {
                let rulesets = self.as_string_list(key, value)?;
                self.matchers.push(Matcher::Ruleset(rulesets));
            }
            "noruleset" => {
                let rulesets = self.as_string_list(key, value)?;
                self.matchers.push(Matcher::NoRuleset(rulesets));
            }
            "category" => {
                let categories = self
                    .as_string_list(key, value)?
                    .into_iter()
                    .map(|c| c.to_lowercase())
                    .collect();
                self.matchers.push(Matcher::Category(categories));
            }
            "name" => {
                let names = self.as_string_list(key, value)?;
                self.names = Some(names.clone());
                self.matchers.push(Matcher::Name(names));
            }
            "namepat" => {
                let pattern = self.as_string(key, value)?.replace('\n', "");
                let regex = self.full_match_regex(key, &pattern)?;
                self.name_groups = regex.captures_len() - 1;
                self.name_pattern = Some(pattern);
                self.matchers.push(Matcher::NamePat(regex));
            }
            "ver" => {
                let versions = self.as_string_set(key, value)?;
                self.matchers.push(Matcher::Ver(versions));
            }
            "notver" => {
                let versions = self.as_string_set(key, value)?;
                self.matchers.push(Matcher::NotVer(versions));
            }
            "verpat" => {
                let pattern = self.as_string(key, value)?.replace('\n', "").to_lowercase();
                let regex = self.full_match_regex(key, &pattern)?;
                self.ver_groups = regex.captures_len() - 1;
                self.matchers.push(Matcher::VerPat(regex));
            }
            "verlonger" => {
                let count = self.as_usize(key, value)?;
                self.matchers.push(Matcher::VerLonger(count));
            }
            "vercomps" => {
                let count = self.as_usize(key, value)?;
                self.matchers.push(Matcher::VerComps(count));
            }
            "vergt" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerGt(version));
            }
            "verge" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerGe(version));
            }
            "verlt" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerLt(version));
            }
            "verle" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerLe(version));
            }
            "vereq" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerEq(version));
            }
            "verne" => {
                let version = self.as_string(key, value)?;
                self.matchers.push(Matcher::VerNe(version));
            }
            "wwwpat" => {
                let pattern = self.as_string(key, value)?.replace('\n', "").to_lowercase();
                let regex = self.full_match_regex(key, &pattern)?;
                self.matchers.push(Matcher::WwwPat(regex));
            }
            "wwwpart" => {
                let parts = self
                    .as_string_list(key, value)?
                    .into_iter()
                    .map(|p| p.to_lowercase())
                    .collect();
                self.matchers.push(Matcher::WwwPart(parts));
            }
            "summpart" => {
                let parts = self
                    .as_string_list(key, value)?
                    .into_iter()
                    .map(|p| p.to_lowercase())
                    .collect();
                self.matchers.push(Matcher::SummPart(parts));
            }
            "flag" => {
                let flags = self.as_string_list(key, value)?;
                self.matchers.push(Matcher::Flag(flags));
            }
            "noflag" => {
                let flags = self.as_string_list(key, value)?;
                self.matchers.push(Matcher::NoFlag(flags));
            }
            "hasbranch" => {
                let expected = self.as_bool(key, value)?;
                self.matchers.push(Matcher::HasBranch(expected));
            }

            // actions
            "setname" => {
                let template = self.as_string(key, value)?;
                self.track_backrefs(key, &template, BackrefKind::Name);
                self.actions.push(Action::SetName(template));
            }
            "setver" => {
                let template = self.as_string(key, value)?;
                self.track_backrefs(key, &template, BackrefKind::Ver);
                self.actions.push(Action::SetVer(template));
            }
            "replaceinname" => {
                let Value::Mapping(items) = value else {
                    return Err(self.invalid_value(key, "expected a mapping"));
                };
                let mut replacements = Vec::with_capacity(items.len());
                for (pattern, replacement) in items {
                    let (Some(pattern), Some(replacement)) =
                        (pattern.as_str(), replacement.as_str())
                    else {
                        return Err(self.invalid_value(key, "expected string pairs"));
                    };
                    replacements.push((pattern.to_string(), replacement.to_string()));
                }
                self.actions.push(Action::ReplaceInName(replacements));
            }
            "tolowername" => {
                self.as_bool(key, value)?;
                self.actions.push(Action::ToLowerName);
            }
            "setsubrepo" => {
                let template = self.as_string(key, value)?;
                self.track_backrefs(key, &template, BackrefKind::Name);
                self.actions.push(Action::SetSubrepo(template));
            }
            "addflavor" => {
                let flavors = self.as_flavor_list(key, value)?;
                self.actions.push(Action::AddFlavor(flavors));
            }
            "setflavor" => {
                let flavors = self.as_flavor_list(key, value)?;
                self.actions.push(Action::SetFlavor(flavors));
            }
            "resetflavors" => {
                self.as_bool(key, value)?;
                self.actions.push(Action::ResetFlavors);
            }
            "setbranch" => {
                let template = self.as_string(key, value)?;
                self.track_backrefs(key, &template, BackrefKind::Ver);
                self.actions.push(Action::SetBranch(template));
            }
            "setbranchcomps" => {
                let count = self.as_usize(key, value)?;
                self.actions.push(Action::SetBranchComps(count));
            }
            "addflag" => {
                let flags = self.as_string_list(key, value)?;
                self.actions.push(Action::AddFlag(flags));
            }
            "warning" => {
                let warning = self.as_string(key, value)?;
                self.actions.push(Action::Warning(warning));
            }
            "last" => {
                self.as_bool(key, value)?;
                self.actions.push(Action::Last);
            }

            _ => {
                return Err(RuleError::UnknownKey {
                    path: self.path.to_string(),
                    index: self.index,
                    key: key.to_string(),
                });
            }
        }

        Ok(())
    }

    fn track_backrefs(&mut self, key: &str, template: &str, kind: BackrefKind) {
        self.backrefs
            .push((key.to_string(), template.to_string(), kind));
    }

    fn validate_backrefs(&self) -> Result<(), RuleError> {
        for (key, template, kind) in &self.backrefs {
            let available = match kind {
                BackrefKind::Name => self.name_groups,
                BackrefKind::Ver => self.ver_groups,
            };
            let has_pattern = match kind {
                BackrefKind::Name => self.name_pattern.is_some(),
                BackrefKind::Ver => self.ver_groups > 0 || self.has_ver_pattern(),
            };

            for found in BACKREF.captures_iter(template) {
                let group: usize = found[1].parse().expect("single digit");
                // $0 is the whole subject and always available; $N needs
                // a pattern with at least N groups
                if group > 0 && (!has_pattern || group > available) {
                    return Err(RuleError::BackrefOutOfRange {
                        path: self.path.to_string(),
                        index: self.index,
                        key: key.clone(),
                        group,
                        available,
                    });
                }
            }
        }
        Ok(())
    }

    fn has_ver_pattern(&self) -> bool {
        self.matchers
            .iter()
            .any(|m| matches!(m, Matcher::VerPat(_)))
    }

    fn full_match_regex(&self, key: &str, pattern: &str) -> Result<Regex, RuleError> {
        Regex::new(&format!("^(?:{pattern})$")).map_err(|source| RuleError::InvalidPattern {
            path: self.path.to_string(),
            index: self.index,
            key: key.to_string(),
            source: Box::new(source),
        })
    }

    fn invalid_value(&self, key: &str, message: &str) -> RuleError {
        RuleError::InvalidValue {
            path: self.path.to_string(),
            index: self.index,
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    fn as_scalar_string(&self, key: &str, value: &Value) -> Result<String, RuleError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid_value(key, "expected a string")),
        }
    }

    fn as_string(&self, key: &str, value: &Value) -> Result<String, RuleError> {
        self.as_scalar_string(key, value)
    }

    fn as_string_list(&self, key: &str, value: &Value) -> Result<Vec<String>, RuleError> {
        match value {
            Value::Sequence(seq) => seq
                .iter()
                .map(|item| self.as_scalar_string(key, item))
                .collect(),
            _ => Ok(vec![self.as_scalar_string(key, value)?]),
        }
    }

    fn as_string_set(&self, key: &str, value: &Value) -> Result<HashSet<String>, RuleError> {
        Ok(self.as_string_list(key, value)?.into_iter().collect())
    }

    fn as_bool(&self, key: &str, value: &Value) -> Result<bool, RuleError> {
        value
            .as_bool()
            .ok_or_else(|| self.invalid_value(key, "expected a boolean"))
    }

    fn as_usize(&self, key: &str, value: &Value) -> Result<usize, RuleError> {
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| self.invalid_value(key, "expected a non-negative integer"))
    }

    /// `true` means "derive from the canonical name" and compiles to an
    /// empty list; a string or list is taken as-is.
    fn as_flavor_list(&self, key: &str, value: &Value) -> Result<Vec<String>, RuleError> {
        match value {
            Value::Bool(_) => Ok(Vec::new()),
            _ => self.as_string_list(key, value),
        }
    }
}
