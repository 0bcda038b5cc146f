//! # graphsink-core
//!
//! The writer subsystem of graphsink - THE WRITERS.
//!
//! This crate turns batches of typed graph elements (labelled vertices and
//! edges with property maps) into on-disk target formats:
//! - MeTTa symbolic expressions, one file per label
//! - Neo4j CSV files plus `apoc.periodic.iterate` bulk-import scripts
//! - A NetworkX node-link document converted to a pickled graph
//!
//! ## Layering
//!
//! - `normalize` and `grouping` are pure transforms
//! - `append` owns the only shared mutable resource: the files on disk
//! - `writers` compose the above behind the [`GraphWriter`] trait
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Every write blocks until its batch is on stable storage or has failed
//! - Anything that reaches a file is ordered deterministically (`BTreeMap`)
//! - The only process boundary is the NetworkX converter

// =============================================================================
// MODULES
// =============================================================================

pub mod append;
pub mod config;
pub mod formats;
pub mod grouping;
pub mod ingestor;
pub mod manifest;
pub mod normalize;
pub mod primitives;
pub mod system;
pub mod types;
pub mod writers;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Edge, EdgeTypeKey, ElementId, GraphSinkError, Properties, PropertyValue, Record, Scalar,
    Vertex,
};

// =============================================================================
// RE-EXPORTS: Writers
// =============================================================================

pub use append::{AppendOutcome, AppendTarget, LockRegistry};
pub use config::{WriterConfig, WriterKind};
pub use writers::{
    ExchangePhase, GraphConverter, GraphWriter, MettaWriter, Neo4jCsvWriter, NetworkxWriter,
    PythonConverter, WriteReport, open_writer, open_writer_with_locks,
};

// =============================================================================
// RE-EXPORTS: Transforms
// =============================================================================

pub use grouping::{Grouped, LabelCase};
pub use ingestor::{Ingestor, Partitioned};
pub use normalize::{Normalized, OutputFormat, normalize, normalize_id};

// =============================================================================
// RE-EXPORTS: Formats, Manifest, System
// =============================================================================

pub use formats::{RecordFileFormat, records_from_bytes};
pub use manifest::{ManifestEntry, OutputManifest, OutputRole};
pub use system::{EdgeTypeCount, StatsCollector, WriterStats};
