use thiserror::Error;

/// Fatal ruleset compilation error.
///
/// Any malformed rule aborts loading of the whole ruleset; rules are never
/// silently skipped. The source position (file and rule index within it)
/// is carried so the offending rule can be found in the authored documents.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{path}: failed to read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid YAML: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: expected a sequence of rule mappings")]
    NotASequence { path: String },

    #[error("{path}: rule #{index}: expected a mapping")]
    NotAMapping { path: String, index: usize },

    #[error("{path}: rule #{index}: unknown key `{key}`")]
    UnknownKey {
        path: String,
        index: usize,
        key: String,
    },

    #[error("{path}: rule #{index}: `{key}`: {message}")]
    InvalidValue {
        path: String,
        index: usize,
        key: String,
        message: String,
    },

    #[error("{path}: rule #{index}: `{key}`: invalid pattern: {source}")]
    InvalidPattern {
        path: String,
        index: usize,
        key: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error(
        "{path}: rule #{index}: `{key}`: back-reference ${group} exceeds \
         the {available} capture group(s) of the corresponding pattern"
    )]
    BackrefOutOfRange {
        path: String,
        index: usize,
        key: String,
        group: usize,
        available: usize,
    },

    #[error("{path}: rule #{index}: both `family` and `ruleset` present")]
    ConflictingKeys { path: String, index: usize },
}

/// Per-package transformation failure.
///
/// Fatal for the package (it must not be published half-transformed) but
/// isolated from the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error(
        "rule #{rule}: substitution references capture group ${group} \
         which did not participate in the match"
    )]
    MissingCaptureGroup { rule: usize, group: usize },
}
