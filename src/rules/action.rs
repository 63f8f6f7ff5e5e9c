//! Actions compiled from rule documents
//!
//! Actions of a matched rule execute in declared order; later actions see
//! the mutations of earlier ones. `$N` substitution tokens resolve against
//! the captures recorded by the rule's own pattern predicates.

use crate::package::{Package, PackageFlags};

use super::context::{MatchContext, PackageContext, SubstResult};
use super::error::TransformError;

/// One compiled action.
#[derive(Debug)]
pub enum Action {
    /// Set or clear package flags. A single variant covers every plain
    /// flag key (`devel: true`, `ignore: false`, ...).
    SetFlags(PackageFlags, bool),
    /// Rewrite the canonical name with `$N` substitution.
    SetName(String),
    /// Rewrite the version with `$N` substitution, preserving the
    /// original version on first rewrite.
    SetVer(String),
    /// Literal substring replacements in the canonical name.
    ReplaceInName(Vec<(String, String)>),
    ToLowerName,
    /// Set the sub-repository with `$N` substitution from the name.
    SetSubrepo(String),
    /// Append flavors; an empty list means "use the canonical name".
    AddFlavor(Vec<String>),
    /// Replace flavors; an empty list means "use the canonical name".
    SetFlavor(Vec<String>),
    ResetFlavors,
    /// Set the branch with `$N` substitution from the version.
    SetBranch(String),
    /// Set the branch to the first N version components.
    SetBranchComps(usize),
    /// Set sticky context flags visible to later rules.
    AddFlag(Vec<String>),
    /// Record a warning to be reported for this package.
    Warning(String),
    /// Stop rule evaluation for this package.
    Last,
}

impl Action {
    pub fn apply(
        &self,
        rule_number: usize,
        package: &mut Package,
        package_context: &mut PackageContext,
        match_context: &mut MatchContext,
    ) -> Result<(), TransformError> {
        let resolve = |result: SubstResult| {
            result.map_err(|group| TransformError::MissingCaptureGroup {
                rule: rule_number,
                group,
            })
        };

        match self {
            Action::SetFlags(flags, value) => package.flags.set(*flags, *value),
            Action::SetName(template) => {
                package.effname =
                    resolve(match_context.sub_name_dollars(template, &package.effname))?;
            }
            Action::SetVer(template) => {
                if package.origversion.is_none() {
                    package.origversion = Some(package.version.clone());
                }
                package.version =
                    resolve(match_context.sub_ver_dollars(template, &package.version))?;
            }
            Action::ReplaceInName(replacements) => {
                for (pattern, replacement) in replacements {
                    package.effname = package.effname.replace(pattern, replacement);
                }
            }
            Action::ToLowerName => package.effname = package.effname.to_lowercase(),
            Action::SetSubrepo(template) => {
                package.subrepo =
                    Some(resolve(match_context.sub_name_dollars(template, &package.effname))?);
            }
            Action::AddFlavor(flavors) => {
                for flavor in substituted_flavors(flavors, package, match_context, resolve)? {
                    if !package.flavors.contains(&flavor) {
                        package.flavors.push(flavor);
                    }
                }
            }
            Action::SetFlavor(flavors) => {
                package.flavors =
                    substituted_flavors(flavors, package, match_context, resolve)?;
            }
            Action::ResetFlavors => package.flavors.clear(),
            Action::SetBranch(template) => {
                package.branch =
                    Some(resolve(match_context.sub_ver_dollars(template, &package.version))?);
            }
            Action::SetBranchComps(count) => {
                package.branch = Some(
                    package
                        .version
                        .split(|c: char| !c.is_ascii_alphanumeric())
                        .take(*count)
                        .collect::<Vec<_>>()
                        .join("."),
                );
            }
            Action::AddFlag(flags) => {
                for flag in flags {
                    package_context.add_flag(flag.clone());
                }
            }
            Action::Warning(warning) => package_context.add_warning(warning.clone()),
            Action::Last => match_context.last = true,
        }

        Ok(())
    }
}

fn substituted_flavors(
    flavors: &[String],
    package: &Package,
    match_context: &MatchContext,
    resolve: impl Fn(SubstResult) -> Result<String, TransformError>,
) -> Result<Vec<String>, TransformError> {
    let want: Vec<&str> = if flavors.is_empty() {
        vec![package.effname.as_str()]
    } else {
        flavors.iter().map(String::as_str).collect()
    };

    let mut out = Vec::with_capacity(want.len());
    for flavor in want {
        let flavor = resolve(match_context.sub_name_dollars(flavor, &package.effname))?;
        let flavor = flavor.trim_matches('-');
        if !flavor.is_empty() {
            out.push(flavor.to_string());
        }
    }
    Ok(out)
}
