//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use graphsink_core::primitives::MAX_RECORD_FILE_SIZE;
use graphsink_core::{
    GraphSinkError, GraphWriter, Ingestor, Neo4jCsvWriter, OutputManifest, Partitioned, Record,
    WriteReport, WriterConfig, WriterKind, open_writer, records_from_bytes,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphSinkError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphSinkError::io(format!("Cannot read metadata of {}", path.display()), e))?;

    if metadata.len() > max_size {
        return Err(GraphSinkError::Serialization(format!(
            "File {} is {} bytes, maximum allowed is {} bytes",
            path.display(),
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path: canonical, existing, and a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphSinkError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| GraphSinkError::io(format!("Invalid file path '{}'", path.display()), e))?;

    if !canonical.is_file() {
        return Err(GraphSinkError::InvalidRecord(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an existing output directory.
fn validate_output_dir(path: &Path) -> Result<PathBuf, GraphSinkError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphSinkError::io(format!("Invalid output directory '{}'", path.display()), e)
    })?;

    if !canonical.is_dir() {
        return Err(GraphSinkError::Config(format!(
            "Output path '{}' is not a directory",
            path.display()
        )));
    }
    Ok(canonical)
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Options of the `write` command after argument parsing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub format: WriterKind,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub job_id: Option<String>,
    pub config: Option<PathBuf>,
    pub truncate: Option<usize>,
    pub batch_size: usize,
    pub workers: usize,
    pub keep_json: bool,
}

/// Load a TOML writer configuration; missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<WriterConfig, GraphSinkError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| GraphSinkError::io(format!("Read config {}", path.display()), e))?;
    toml::from_str(&text)
        .map_err(|e| GraphSinkError::Config(format!("{}: {}", path.display(), e)))
}

/// Config file (or defaults) with command line overrides applied, validated.
pub fn build_config(opts: &WriteOptions) -> Result<WriterConfig, GraphSinkError> {
    let mut config = match &opts.config {
        Some(path) => load_config(path)?,
        None => WriterConfig::default(),
    };

    if let Some(output) = &opts.output {
        config.output_dir.clone_from(output);
    }
    if let Some(job_id) = &opts.job_id {
        config.job_id.clone_from(job_id);
    }
    if opts.truncate.is_some() {
        config.max_value_len = opts.truncate;
    }
    if opts.keep_json {
        config.keep_intermediate_json = true;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// RECORD INPUT
// =============================================================================

/// Read, decode and validate every input file, in order.
pub fn read_records(inputs: &[PathBuf]) -> Result<Partitioned, GraphSinkError> {
    let mut records = Vec::new();

    for input in inputs {
        let path = validate_file_path(input)?;
        validate_file_size(&path, MAX_RECORD_FILE_SIZE as u64)?;

        let bytes = std::fs::read(&path)
            .map_err(|e| GraphSinkError::io(format!("Read {}", path.display()), e))?;
        let decoded = records_from_bytes(&bytes).map_err(|e| match e {
            GraphSinkError::Serialization(msg) => {
                GraphSinkError::Serialization(format!("{}: {}", input.display(), msg))
            }
            other => other,
        })?;

        tracing::info!(file = %input.display(), records = decoded.len(), "decoded record file");
        records.extend(decoded);
    }

    Ingestor::partition(records)
}

// =============================================================================
// BATCH SUBMISSION
// =============================================================================

/// Which writer entry point a set of batches goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Nodes,
    Edges,
}

/// Split `records` into batches and submit them from `workers` threads.
///
/// Threads claim batches from a shared counter. The first failure stops
/// further claims and is returned once every thread has finished.
pub fn submit_batches(
    writer: &dyn GraphWriter,
    records: &[Record],
    kind: BatchKind,
    batch_size: usize,
    workers: usize,
) -> Result<WriteReport, GraphSinkError> {
    let batches: Vec<&[Record]> = records.chunks(batch_size.max(1)).collect();
    if batches.is_empty() {
        return Ok(WriteReport::default());
    }

    let next_batch = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let workers = workers.clamp(1, batches.len());

    let results: Vec<Result<WriteReport, GraphSinkError>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let batches = &batches;
                let next_batch = &next_batch;
                let failed = &failed;

                s.spawn(move || {
                    let mut report = WriteReport::default();
                    while !failed.load(Ordering::Relaxed) {
                        let index = next_batch.fetch_add(1, Ordering::Relaxed);
                        let Some(batch) = batches.get(index) else {
                            break;
                        };

                        let outcome = match kind {
                            BatchKind::Nodes => writer.write_nodes(batch),
                            BatchKind::Edges => writer.write_edges(batch),
                        };
                        match outcome {
                            Ok(done) => report.merge(done),
                            Err(e) => {
                                failed.store(true, Ordering::Relaxed);
                                tracing::error!(batch = index, error = %e, "batch failed");
                                return Err(e);
                            }
                        }
                    }
                    Ok(report)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });

    let mut total = WriteReport::default();
    for result in results {
        total.merge(result?);
    }
    Ok(total)
}

// =============================================================================
// WRITE COMMAND
// =============================================================================

/// Write record files in one output format.
///
/// Every vertex batch is written before the first edge batch, so the
/// NetworkX writer has seen every endpoint by the time edges arrive.
pub fn cmd_write(opts: &WriteOptions, json_mode: bool) -> Result<(), GraphSinkError> {
    let started = Instant::now();
    let config = build_config(opts)?;
    let records = read_records(&opts.inputs)?;

    tracing::info!(
        format = %opts.format,
        output = %config.output_dir.display(),
        job = %config.job_id,
        vertices = records.vertices.len(),
        edges = records.edges.len(),
        "writing"
    );

    let output_dir = config.output_dir.clone();
    let writer = open_writer(opts.format, config)?;

    let nodes = submit_batches(
        writer.as_ref(),
        &records.vertices,
        BatchKind::Nodes,
        opts.batch_size,
        opts.workers,
    )?;
    let edges = submit_batches(
        writer.as_ref(),
        &records.edges,
        BatchKind::Edges,
        opts.batch_size,
        opts.workers,
    )?;
    writer.finish()?;

    let stats = writer.stats();
    let elapsed_ms = started.elapsed().as_millis();

    if json_mode {
        let output = serde_json::json!({
            "format": opts.format,
            "output_dir": output_dir.to_string_lossy(),
            "nodes_written": nodes.written,
            "edges_written": edges.written,
            "skipped": nodes.skipped + edges.skipped,
            "elapsed_ms": elapsed_ms,
            "stats": stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("graphsink write ({})", opts.format);
    println!("======================");
    println!("Output:  {:?}", output_dir);
    println!("Nodes:   {}", nodes.written);
    println!("Edges:   {}", edges.written);
    println!("Skipped: {}", nodes.skipped + edges.skipped);
    println!("Elapsed: {} ms", elapsed_ms);

    let labels = stats.top_labels();
    if !labels.is_empty() {
        println!();
        println!("Vertices by label:");
        for (label, count) in labels {
            println!("  {:<24} {}", label, count);
        }
    }
    let types = stats.top_edge_types();
    if !types.is_empty() {
        println!();
        println!("Edges by type:");
        for entry in types {
            println!("  {:<40} {}", entry.key.to_string(), entry.count);
        }
    }

    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// List the files of an output directory.
pub fn cmd_inspect(output: &Path, json_mode: bool) -> Result<(), GraphSinkError> {
    let dir = validate_output_dir(output)?;
    let manifest = OutputManifest::scan(&dir)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&manifest).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Output Directory: {:?}", manifest.dir);
    println!();
    for entry in &manifest.entries {
        let role = serde_json::to_value(entry.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("  {:<48} {:<14} {:>12}", entry.name, role, entry.bytes);
        if let Some(digest) = &entry.digest {
            println!("    blake3 {}", digest);
        }
    }
    println!();
    println!(
        "{} files, {} bytes",
        manifest.entries.len(),
        manifest.total_bytes
    );

    Ok(())
}

// =============================================================================
// PLAN COMMAND
// =============================================================================

/// Print the Neo4j load order and write the tenant cleanup script.
pub fn cmd_plan(output: &Path, job_id: &str, json_mode: bool) -> Result<(), GraphSinkError> {
    let dir = validate_output_dir(output)?;
    let writer = Neo4jCsvWriter::new(WriterConfig::new(&dir, job_id))?;

    let cleanup = writer.write_tenant_cleanup()?;
    let plan = writer.load_plan()?;

    if json_mode {
        let output = serde_json::json!({
            "job_id": job_id,
            "load_order": plan,
            "cleanup": cleanup,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Neo4j load plan for job {}", job_id);
    println!("===========================");
    for (i, script) in plan.iter().enumerate() {
        println!("{:>4}. {}", i + 1, script.display());
    }
    println!();
    println!("Cleanup: {}", cleanup.display());

    Ok(())
}
