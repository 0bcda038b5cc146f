//! # Format Primitives
//!
//! Hardcoded delimiters, sentinels and file names shared by the writers.
//!
//! These are wire-format constants: downstream loaders (the Neo4j bulk
//! import scripts, the NetworkX converter) depend on them byte for byte.

/// Primary CSV field delimiter.
pub const CSV_DELIMITER: char = '|';

/// Secondary delimiter joining list elements inside one CSV field.
pub const ARRAY_DELIMITER: char = ';';

/// Rendering of an absent or null property in MeTTa output.
pub const METTA_NULL: &str = "N/A";

/// Property key dropped before rendering (redundant with the element id).
pub const ID_PROPERTY: &str = "id";

/// Property set by the Neo4j import scripts to the job id. Never a CSV column.
pub const TENANT_PROPERTY: &str = "tenant_id";

/// Fixed leading columns of every edge CSV file.
pub const EDGE_FIXED_COLUMNS: [&str; 5] =
    ["source_id", "target_id", "label", "source_type", "target_type"];

/// Fixed leading column of every node CSV file.
pub const NODE_FIXED_COLUMNS: [&str; 1] = [ID_PROPERTY];

/// MeTTa file extension.
pub const METTA_EXTENSION: &str = "metta";

/// Intermediate NetworkX JSON document (deleted after conversion).
pub const NETWORKX_TEMP_JSON: &str = "networkx_graph_temp.json";

/// Binary NetworkX snapshot produced by the converter.
pub const NETWORKX_SNAPSHOT: &str = "networkx_graph.pkl";

/// NetworkX summary metadata.
pub const NETWORKX_METADATA: &str = "networkx_metadata.json";

/// Script that deletes every element of one tenant.
pub const TENANT_CLEANUP_SCRIPT: &str = "tenant_cleanup.cypher";

/// Default `batchSize` of generated bulk-import statements.
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 1000;

/// Default `concurrency` of generated node bulk-import statements.
pub const DEFAULT_IMPORT_CONCURRENCY: usize = 4;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for labels and property keys.
///
/// Labels become file names and script identifiers; longer ones are rejected.
pub const MAX_LABEL_LENGTH: usize = 200;

/// Maximum size of one record file accepted by the decoder (512 MB).
pub const MAX_RECORD_FILE_SIZE: usize = 512 * 1024 * 1024;
