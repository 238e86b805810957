use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::parser::strategy::{Field, SignalSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "candidate", rename_all = "snake_case")]
pub enum Outcome {
    NoMatch,
    Rejected(String),
    Accepted(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NoMatch => f.write_str("no match"),
            Outcome::Rejected(c) => write!(f, "rejected {:?}", c),
            Outcome::Accepted(c) => write!(f, "accepted {:?}", c),
        }
    }
}

/// One strategy attempt, as seen by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub field: Field,
    pub strategy: &'static str,
    pub source: SignalSource,
    pub outcome: Outcome,
}

/// Optional observer of the extraction core. Sinks only watch: nothing they do
/// can change what the extractors return.
pub trait DiagnosticSink {
    fn record(&mut self, event: TraceEvent);

    /// Raw or intermediate text worth keeping for offline inspection.
    fn artifact(&mut self, _name: &str, _contents: &str) {}
}

pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Keeps everything in memory; tests inspect it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<TraceEvent>,
    pub artifacts: Vec<(String, String)>,
}

#[cfg(test)]
impl MemorySink {
    /// The strategy that resolved `field`, if any did.
    pub fn winner(&self, field: Field) -> Option<&'static str> {
        self.events
            .iter()
            .find(|e| e.field == field && matches!(e.outcome, Outcome::Accepted(_)))
            .map(|e| e.strategy)
    }
}

#[cfg(test)]
impl DiagnosticSink for MemorySink {
    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    fn artifact(&mut self, name: &str, contents: &str) {
        self.artifacts.push((name.to_string(), contents.to_string()));
    }
}

/// Writes artifacts as files and strategy events as JSON lines (`trace.jsonl`)
/// under one directory. I/O failures are logged and otherwise ignored.
pub struct DumpSink {
    dir: PathBuf,
    trace: Option<fs::File>,
}

impl DumpSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;
        let trace = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("trace.jsonl"))
            .context("Failed to open trace.jsonl")?;
        info!("Dumping diagnostics to {}", dir.display());
        Ok(DumpSink { dir, trace: Some(trace) })
    }
}

impl DiagnosticSink for DumpSink {
    fn record(&mut self, event: TraceEvent) {
        let Some(file) = self.trace.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(&event) {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to encode trace event: {}", e);
                return;
            }
        };
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("Failed to write trace event, disabling trace log: {}", e);
            self.trace = None;
        }
    }

    fn artifact(&mut self, name: &str, contents: &str) {
        let path = self.dir.join(name);
        if let Err(e) = fs::write(&path, contents) {
            warn!("Failed to write {}: {}", path.display(), e);
        }
    }
}
