//! Repository metadata table
//!
//! Maps a repository id to its family, ruleset memberships and a minimum
//! package count sanity threshold. The rule engine uses it to resolve
//! `ruleset`/`noruleset` predicates; everything else about repositories
//! (fetching, parsing) lives outside this crate.

use std::collections::HashMap;

use serde::Deserialize;

/// Static metadata for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryMetadata {
    /// Repository identifier, unique within the table.
    pub name: String,
    /// Packaging ecosystem, stable across repository renames.
    pub family: String,
    /// Ruleset groups this repository belongs to.
    #[serde(default)]
    pub rulesets: Vec<String>,
    /// Minimum expected package count; fewer suggests a broken scrape.
    #[serde(default)]
    pub minpackages: usize,
}

/// Lookup table over [`RepositoryMetadata`], keyed by repository id.
#[derive(Debug, Clone, Default)]
pub struct RepositoryTable {
    by_name: HashMap<String, RepositoryMetadata>,
}

impl RepositoryTable {
    pub fn new(repositories: impl IntoIterator<Item = RepositoryMetadata>) -> Self {
        Self {
            by_name: repositories
                .into_iter()
                .map(|repository| (repository.name.clone(), repository))
                .collect(),
        }
    }

    /// Parse a table from a YAML sequence of repository entries.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let repositories: Vec<RepositoryMetadata> = serde_yaml::from_str(text)?;
        Ok(Self::new(repositories))
    }

    pub fn get(&self, repo: &str) -> Option<&RepositoryMetadata> {
        self.by_name.get(repo)
    }

    /// Ruleset memberships for a repository; empty for unknown repositories.
    pub fn rulesets_for(&self, repo: &str) -> &[String] {
        self.get(repo).map(|r| r.rulesets.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
