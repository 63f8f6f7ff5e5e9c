//! Ruleset loading
//!
//! Rules come either from a single YAML document or from a directory
//! tree of `*.yaml` files walked in sorted order, so rule numbering is
//! reproducible across loads. A rule listing several exact names is
//! split into one single-name rule per name before compilation, which
//! keeps dispatch planning a plain name-to-rule map.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use super::error::RuleError;
use super::rule::Rule;

/// All compiled rules, in evaluation order.
#[derive(Debug, Default)]
pub struct Ruleset {
    pub rules: Vec<Rule>,
    /// Hash over the raw source text of all loaded files.
    pub hash: String,
}

impl Ruleset {
    /// Parse rules from one YAML document.
    pub fn from_yaml(text: &str) -> Result<Ruleset, RuleError> {
        let mut ruleset = Ruleset {
            rules: Vec::new(),
            hash: hex::encode(Sha256::digest(text.as_bytes())),
        };
        ruleset.append_document("<inline>", text)?;
        Ok(ruleset)
    }

    /// Load every `*.yaml` file under `root`, in sorted path order.
    /// Hidden files and directories are skipped.
    pub fn from_dir(root: &Path) -> Result<Ruleset, RuleError> {
        let mut ruleset = Ruleset::default();
        let mut source_hash = Sha256::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(|err| RuleError::Io {
                path: root.display().to_string(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file()
                || entry.path().extension().is_none_or(|ext| ext != "yaml")
            {
                continue;
            }

            let path = entry.path().display().to_string();
            let text = std::fs::read_to_string(entry.path()).map_err(|source| RuleError::Io {
                path: path.clone(),
                source,
            })?;
            source_hash.update(text.as_bytes());
            ruleset.append_document(&path, &text)?;
        }

        ruleset.hash = hex::encode(source_hash.finalize());
        debug!(rules = ruleset.rules.len(), hash = %ruleset.hash, "ruleset loaded");
        Ok(ruleset)
    }

    fn append_document(&mut self, path: &str, text: &str) -> Result<(), RuleError> {
        let parsed: Value = serde_yaml::from_str(text).map_err(|source| RuleError::Parse {
            path: path.to_string(),
            source,
        })?;

        // an empty document is a valid, empty rule list
        if matches!(parsed, Value::Null) {
            return Ok(());
        }
        let Value::Sequence(documents) = parsed else {
            return Err(RuleError::NotASequence {
                path: path.to_string(),
            });
        };

        for (index, document) in documents.into_iter().enumerate() {
            let Value::Mapping(mapping) = document else {
                return Err(RuleError::NotAMapping {
                    path: path.to_string(),
                    index,
                });
            };

            for mapping in split_multi_name(mapping) {
                let number = self.rules.len();
                self.rules.push(Rule::compile(number, path, index, &mapping)?);
            }
        }

        Ok(())
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Split `name: [a, b]` into one rule per name; all other rules pass
/// through unchanged.
fn split_multi_name(mapping: Mapping) -> Vec<Mapping> {
    let is_multi = matches!(mapping.get("name"), Some(Value::Sequence(_)));
    if !is_multi {
        return vec![mapping];
    }

    let Some(Value::Sequence(names)) = mapping.get("name").cloned() else {
        return vec![mapping];
    };

    names
        .into_iter()
        .map(|name| {
            // rebuild in place so the split rule keeps its key order
            let mut split = Mapping::new();
            for (key, value) in &mapping {
                if key.as_str() == Some("name") {
                    split.insert(key.clone(), name.clone());
                } else {
                    split.insert(key.clone(), value.clone());
                }
            }
            split
        })
        .collect()
}
