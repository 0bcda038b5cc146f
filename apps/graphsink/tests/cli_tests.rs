//! Integration tests for the graphsink command implementations.

use clap::Parser;
use graphsink::cli::{
    BatchKind, Cli, Commands, WriteOptions, build_config, cmd_inspect, cmd_plan, cmd_write,
    load_config, read_records, submit_batches,
};
use graphsink_core::{
    Edge, GraphSinkError, GraphWriter, MettaWriter, Record, Vertex, WriterConfig, WriterKind,
};
use std::path::{Path, PathBuf};

fn options(format: WriterKind, inputs: Vec<PathBuf>, output: &Path) -> WriteOptions {
    WriteOptions {
        format,
        inputs,
        output: Some(output.to_path_buf()),
        job_id: Some("cli_job".to_string()),
        config: None,
        truncate: None,
        batch_size: 2,
        workers: 3,
        keep_json: false,
    }
}

fn write_input(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write input");
    path
}

const NODES: &str = r#"[
  {"kind":"vertex","id":"G:1","label":"gene","properties":{"name":"BRCA1"}},
  {"kind":"vertex","id":"G:2","label":"gene","properties":{"name":"TP53"}},
  {"kind":"vertex","id":"P:1","label":"protein"}
]"#;

const EDGES: &str = r#"{"kind":"edge","label":"codes","source_id":"G:1","source_label":"gene","target_id":"P:1","target_label":"protein"}
{"kind":"edge","label":"codes","source_id":"G:2","source_label":"gene","target_id":"P:1","target_label":"protein"}
"#;

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

#[test]
fn parses_write_command() {
    let cli = Cli::try_parse_from([
        "graphsink", "write", "-f", "neo4j", "-i", "a.json", "-i", "b.jsonl", "-o", "out",
        "-j", "job1", "--truncate", "1000", "--json-mode",
    ])
    .expect("parse");

    assert!(cli.json_mode);
    let Commands::Write {
        format,
        input,
        truncate,
        batch_size,
        ..
    } = cli.command
    else {
        unreachable!("write command expected");
    };
    assert_eq!(format, WriterKind::Neo4j);
    assert_eq!(input.len(), 2);
    assert_eq!(truncate, Some(1000));
    assert_eq!(batch_size, 1000);
}

#[test]
fn rejects_unknown_format() {
    let result = Cli::try_parse_from(["graphsink", "write", "-f", "parquet", "-i", "a.json"]);
    assert!(result.is_err());
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn toml_config_then_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = write_input(
        dir.path(),
        "graphsink.toml",
        "job_id = \"from_file\"\nmax_value_len = 50\nimport_batch_size = 500\n",
    );

    let loaded = load_config(&config_path).expect("load");
    assert_eq!(loaded.job_id, "from_file");
    assert_eq!(loaded.import_batch_size, 500);

    let mut opts = options(WriterKind::Metta, Vec::new(), dir.path());
    opts.config = Some(config_path);
    opts.truncate = Some(10);

    let config = build_config(&opts).expect("build");
    assert_eq!(config.job_id, "cli_job");
    assert_eq!(config.max_value_len, Some(10));
    assert_eq!(config.import_batch_size, 500);
}

#[test]
fn invalid_toml_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_input(dir.path(), "bad.toml", "import_batch_size = \"many\"\n");
    assert!(matches!(load_config(&path), Err(GraphSinkError::Config(_))));
}

#[test]
fn override_with_bad_job_id_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut opts = options(WriterKind::Metta, Vec::new(), dir.path());
    opts.job_id = Some("it's".to_string());
    assert!(matches!(build_config(&opts), Err(GraphSinkError::Config(_))));
}

// =============================================================================
// RECORD INPUT
// =============================================================================

#[test]
fn reads_array_and_lines_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nodes = write_input(dir.path(), "nodes.json", NODES);
    let edges = write_input(dir.path(), "edges.jsonl", EDGES);

    let parts = read_records(&[nodes, edges]).expect("read");
    assert_eq!(parts.vertices.len(), 3);
    assert_eq!(parts.edges.len(), 2);
}

#[test]
fn missing_input_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = read_records(&[dir.path().join("absent.json")]);
    assert!(matches!(result, Err(GraphSinkError::Io { .. })));
}

#[test]
fn invalid_record_names_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bad = write_input(dir.path(), "bad.jsonl", "{\"kind\":\"vertex\"}\n");
    let err = read_records(&[bad]).expect_err("invalid");
    assert!(err.to_string().contains("bad.jsonl"));
}

// =============================================================================
// BATCH SUBMISSION
// =============================================================================

#[test]
fn workers_submit_every_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer = MettaWriter::new(WriterConfig::new(dir.path(), "job")).expect("writer");
    let records: Vec<Record> = (0..25)
        .map(|i| Vertex::new(format!("v{i}"), "item").into())
        .collect();

    let report =
        submit_batches(&writer, &records, BatchKind::Nodes, 3, 4).expect("submit");

    assert_eq!(report.written, 25);
    assert_eq!(writer.stats().node_count, 25);
    let content = std::fs::read_to_string(dir.path().join("item.metta")).expect("read");
    assert_eq!(content.lines().filter(|l| !l.is_empty()).count(), 25);
}

#[test]
fn empty_input_submits_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer = MettaWriter::new(WriterConfig::new(dir.path(), "job")).expect("writer");
    let report = submit_batches(&writer, &[], BatchKind::Edges, 10, 4).expect("submit");
    assert_eq!(report.written, 0);
}

#[test]
fn batch_failure_is_returned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer =
        graphsink_core::Neo4jCsvWriter::new(WriterConfig::new(dir.path(), "job")).expect("writer");
    let records: Vec<Record> = vec![
        Edge::new("a_b", ("c", "1"), ("d", "2")).into(),
        Edge::new("a", ("b_c", "1"), ("d", "2")).into(),
    ];

    let result = submit_batches(&writer, &records, BatchKind::Edges, 1, 1);
    assert!(matches!(result, Err(GraphSinkError::EdgeTypeConflict { .. })));
}

// =============================================================================
// COMMANDS
// =============================================================================

#[test]
fn write_neo4j_then_plan_and_inspect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("import");
    let nodes = write_input(dir.path(), "nodes.json", NODES);
    let edges = write_input(dir.path(), "edges.jsonl", EDGES);

    cmd_write(&options(WriterKind::Neo4j, vec![nodes, edges], &out), true).expect("write");

    let gene_csv = std::fs::read_to_string(out.join("nodes_gene.csv")).expect("csv");
    assert_eq!(gene_csv.lines().next(), Some("id|name"));
    assert_eq!(gene_csv.lines().count(), 3);
    let edge_csv =
        std::fs::read_to_string(out.join("edges_codes_gene_protein.csv")).expect("csv");
    assert_eq!(edge_csv.lines().count(), 3);

    cmd_plan(&out, "cli_job", true).expect("plan");
    assert!(out.join("tenant_cleanup.cypher").exists());

    cmd_inspect(&out, false).expect("inspect");
}

#[test]
fn write_metta_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("metta");
    let nodes = write_input(dir.path(), "nodes.json", NODES);
    let edges = write_input(dir.path(), "edges.jsonl", EDGES);

    cmd_write(&options(WriterKind::Metta, vec![nodes, edges], &out), false).expect("write");

    let codes = std::fs::read_to_string(out.join("codes.metta")).expect("read");
    assert!(codes.contains("(codes (gene g_1) (protein p_1))"));
    assert!(codes.contains("(codes (gene g_2) (protein p_1))"));
}

#[test]
fn plan_requires_existing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = cmd_plan(&dir.path().join("absent"), "job", false);
    assert!(matches!(result, Err(GraphSinkError::Io { .. })));
}
