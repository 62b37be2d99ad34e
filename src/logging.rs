//! Structured logging for the dashboard engine.
//!
//! Every record is a single JSON line with a stable envelope:
//! `ts`, `run_id`, `seq`, `lvl`, `component`, `event`, `msg`, promoted
//! correlation fields (`team_id`, `build_id`, `generation`) and a `data` object.
//!
//! Records always go to stdout. When `LOG_DIR` is set, they are also appended
//! to `<LOG_DIR>/<run_id>/events.jsonl` (info and above) and `trace.jsonl`
//! (trace/debug).

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fetch,     // Build page and metrics retrieval
    Selection, // Build selection ledger
    Keep,      // Keep-flag mutations
    Metrics,   // Payload aggregation, color assignment
    Context,   // Team / filter / date range transitions
    System,    // Startup, configuration
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Selection => "selection",
            Domain::Keep => "keep",
            Domain::Metrics => "metrics",
            Domain::Context => "context",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS is a comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context and sinks
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sink: Option<RunLog>,
}

/// Append-only JSONL files for one run.
#[derive(Debug)]
pub struct RunLog {
    dir: PathBuf,
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

impl RunLog {
    /// Creates `<base>/<run_id>/` with `events.jsonl`, `trace.jsonl` and a manifest.
    pub fn create(base: &Path, run_id: &str) -> Result<Self> {
        let dir = base.join(run_id);
        create_dir_all(&dir)?;
        std::fs::write(
            dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
            })
            .to_string(),
        )?;
        let open = |name: &str| -> Result<Mutex<BufWriter<File>>> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))?;
            Ok(Mutex::new(BufWriter::new(file)))
        };
        Ok(Self {
            events: open("events.jsonl")?,
            trace: open("trace.jsonl")?,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, level: Level, line: &str) {
        let writer = match level {
            Level::Trace | Level::Debug => &self.trace,
            _ => &self.events,
        };
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sink = std::env::var("LOG_DIR").ok().and_then(|base| {
            match RunLog::create(Path::new(&base), &run_id) {
                Ok(sink) => Some(sink),
                Err(err) => {
                    eprintln!("[log] failed to create run log under {}: {}", base, err);
                    None
                }
            }
        });
        RunContext { run_id, sink }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "api_token", "token"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["team_id", "build_id", "generation", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let ctx = ensure_run_context();
    let line = render_record(&ctx.run_id, level, domain.as_str(), event, fields);
    if let Some(sink) = &ctx.sink {
        sink.write(level, &line);
    }
    println!("{}", line);
}

fn render_record(
    run_id: &str,
    level: Level,
    component: &str,
    event: &str,
    fields: Map<String, Value>,
) -> String {
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

// =============================================================================
// Retrieval logs
// =============================================================================

pub fn log_fetch_issued(team_id: &str, generation: u64, skip: u64, limit: u64) {
    log(
        Level::Debug,
        Domain::Fetch,
        "page.issued",
        obj(&[
            ("team_id", v_str(team_id)),
            ("generation", json!(generation)),
            ("skip", json!(skip)),
            ("limit", json!(limit)),
        ]),
    );
}

pub fn log_fetch_applied(team_id: &str, generation: u64, builds: usize, total: u64) {
    log(
        Level::Info,
        Domain::Fetch,
        "page.applied",
        obj(&[
            ("team_id", v_str(team_id)),
            ("generation", json!(generation)),
            ("builds", json!(builds)),
            ("total", json!(total)),
        ]),
    );
}

/// A response arrived after a newer request was issued and was dropped.
pub fn log_fetch_superseded(event: &str, generation: u64, latest: u64) {
    log(
        Level::Debug,
        Domain::Fetch,
        event,
        obj(&[
            ("generation", json!(generation)),
            ("latest", json!(latest)),
            ("msg", v_str("stale response discarded")),
        ]),
    );
}

pub fn log_fetch_failed(event: &str, generation: u64, err: &anyhow::Error) {
    log(
        Level::Warn,
        Domain::Fetch,
        event,
        obj(&[
            ("generation", json!(generation)),
            ("msg", v_str(&format!("{:#}", err))),
        ]),
    );
}

// =============================================================================
// Keep-flag logs
// =============================================================================

pub fn log_keep_failure(build_id: &str, keep: bool, err: &anyhow::Error) {
    log(
        Level::Warn,
        Domain::Keep,
        "keep.update_failed",
        obj(&[
            ("build_id", v_str(build_id)),
            ("keep", json!(keep)),
            ("msg", v_str(&format!("{:#}", err))),
        ]),
    );
}

pub fn log_keep_settled(dispatched: usize, failed: usize) {
    let level = if failed > 0 { Level::Warn } else { Level::Info };
    log(
        level,
        Domain::Keep,
        "keep.settled",
        obj(&[
            ("dispatched", json!(dispatched)),
            ("failed", json!(failed)),
        ]),
    );
}

// =============================================================================
// Selection logs
// =============================================================================

fn selection_fields(build_id: Option<&str>, selected: Option<bool>, count: usize) -> Map<String, Value> {
    let mut fields = obj(&[("selected_count", json!(count))]);
    if let Some(id) = build_id {
        fields.insert("build_id".to_string(), v_str(id));
    }
    if let Some(selected) = selected {
        fields.insert("selected".to_string(), json!(selected));
    }
    fields
}

pub fn log_selection_toggled(build_id: &str, selected: bool, count: usize) {
    log(
        Level::Debug,
        Domain::Selection,
        "selection.toggled",
        selection_fields(Some(build_id), Some(selected), count),
    );
}

pub fn log_selection_cleared(previous_count: usize) {
    log(
        Level::Debug,
        Domain::Selection,
        "selection.cleared",
        selection_fields(None, None, previous_count),
    );
}

// =============================================================================
// Metrics logs
// =============================================================================

/// Payload did not match the expected shape and was treated as empty.
pub fn log_payload_degraded(reason: &str) {
    log(
        Level::Warn,
        Domain::Metrics,
        "payload.degraded",
        obj(&[("msg", v_str(reason))]),
    );
}

pub fn log_aggregated(periods: usize, phases: usize, platforms: usize) {
    log(
        Level::Debug,
        Domain::Metrics,
        "aggregate.done",
        obj(&[
            ("periods", json!(periods)),
            ("phases", json!(phases)),
            ("platforms", json!(platforms)),
        ]),
    );
}

// =============================================================================
// Helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

// =============================================================================
// Tests
// =============================================================================
