//! # Writer Configuration
//!
//! Per-job settings shared by every writer: where output goes, the tenant
//! tag stamped on generated import scripts, and the optional truncation
//! policy for rendered values.

use crate::GraphSinkError;
use crate::primitives::{DEFAULT_IMPORT_BATCH_SIZE, DEFAULT_IMPORT_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration of one writer instance (one job / output directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Directory receiving every output file of the job.
    pub output_dir: PathBuf,

    /// Job identifier, also used as the tenant tag in generated scripts.
    pub job_id: String,

    /// Cap on each rendered scalar, in characters. `None` keeps values whole.
    pub max_value_len: Option<usize>,

    /// `batchSize` of generated bulk-import statements.
    pub import_batch_size: usize,

    /// `concurrency` of generated node bulk-import statements.
    pub import_concurrency: usize,

    /// Interpreter used for the NetworkX snapshot conversion.
    pub python: String,

    /// Keep the intermediate NetworkX JSON after a successful conversion.
    pub keep_intermediate_json: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            job_id: "default".to_string(),
            max_value_len: None,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            import_concurrency: DEFAULT_IMPORT_CONCURRENCY,
            python: "python3".to_string(),
            keep_intermediate_json: false,
        }
    }
}

impl WriterConfig {
    pub fn new(output_dir: impl Into<PathBuf>, job_id: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            job_id: job_id.into(),
            ..Self::default()
        }
    }

    /// Builder-style truncation policy.
    #[must_use]
    pub fn with_max_value_len(mut self, max: Option<usize>) -> Self {
        self.max_value_len = max;
        self
    }

    /// Reject values that would produce broken output.
    ///
    /// The job id is embedded in quoted script literals and in relative
    /// import paths, so quotes, backslashes and path separators are refused.
    pub fn validate(&self) -> Result<(), GraphSinkError> {
        if self.job_id.trim().is_empty() {
            return Err(GraphSinkError::Config("job_id must not be empty".to_string()));
        }
        if let Some(bad) = self
            .job_id
            .chars()
            .find(|c| matches!(c, '\'' | '"' | '`' | '\\' | '/') || c.is_control())
        {
            return Err(GraphSinkError::Config(format!(
                "job_id contains forbidden character {bad:?}"
            )));
        }
        if self.import_batch_size == 0 {
            return Err(GraphSinkError::Config(
                "import_batch_size must be at least 1".to_string(),
            ));
        }
        if self.import_concurrency == 0 {
            return Err(GraphSinkError::Config(
                "import_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_value_len == Some(0) {
            return Err(GraphSinkError::Config(
                "max_value_len must be at least 1 when set".to_string(),
            ));
        }
        if self.python.trim().is_empty() {
            return Err(GraphSinkError::Config("python must not be empty".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// WRITER KIND
// =============================================================================

/// The output representations graphsink can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterKind {
    /// MeTTa symbolic expressions, one file per label.
    Metta,
    /// Neo4j CSV files plus bulk-import Cypher scripts.
    Neo4j,
    /// NetworkX graph snapshot via a JSON interchange document.
    Networkx,
}

impl WriterKind {
    pub const ALL: [WriterKind; 3] = [Self::Metta, Self::Neo4j, Self::Networkx];

    pub fn name(self) -> &'static str {
        match self {
            Self::Metta => "metta",
            Self::Neo4j => "neo4j",
            Self::Networkx => "networkx",
        }
    }
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WriterKind {
    type Err = GraphSinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metta" => Ok(Self::Metta),
            "neo4j" | "neo4j-csv" | "csv" => Ok(Self::Neo4j),
            "networkx" | "nx" => Ok(Self::Networkx),
            other => Err(GraphSinkError::Config(format!(
                "Unknown writer: {other}. Use: metta, neo4j, networkx"
            ))),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(WriterConfig::default().validate().is_ok());
    }

    #[test]
    fn job_id_with_quote_rejected() {
        let config = WriterConfig::new("out", "job'1");
        assert!(matches!(config.validate(), Err(GraphSinkError::Config(_))));
    }

    #[test]
    fn job_id_with_separator_rejected() {
        assert!(WriterConfig::new("out", "a/b").validate().is_err());
        assert!(WriterConfig::new("out", "  ").validate().is_err());
    }

    #[test]
    fn zero_truncation_rejected() {
        let config = WriterConfig::new("out", "job").with_max_value_len(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn writer_kind_round_trip() {
        for kind in WriterKind::ALL {
            assert_eq!(kind.to_string().parse::<WriterKind>().expect("parse"), kind);
        }
        assert_eq!("CSV".parse::<WriterKind>().expect("parse"), WriterKind::Neo4j);
        assert!("parquet".parse::<WriterKind>().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: WriterConfig =
            serde_json::from_str(r#"{"job_id":"j1","max_value_len":1000}"#).expect("decode");
        assert_eq!(config.job_id, "j1");
        assert_eq!(config.max_value_len, Some(1000));
        assert_eq!(config.import_batch_size, DEFAULT_IMPORT_BATCH_SIZE);
        assert_eq!(config.python, "python3");
    }
}
