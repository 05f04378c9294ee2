use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL trace of a pipeline run.
///
/// Each line is one compact object with `type`, `run_id` and `ts` first and the
/// caller payload merged after them. A writer built with [`EventWriter::disabled`]
/// accepts every event and writes nothing, so pipeline code can emit
/// unconditionally.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self::build(Some(path.into()), run_id.into())
    }

    pub fn for_run(path: Option<PathBuf>) -> Self {
        Self::build(path, new_run_id())
    }

    pub fn disabled() -> Self {
        Self::build(None, new_run_id())
    }

    fn build(path: Option<PathBuf>, run_id: String) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path,
                run_id,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_deref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

pub fn new_run_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("run-{}", &id[..12])
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("trace").join("events.jsonl");
        let writer = EventWriter::new(&path, "run-abc");

        let mut payload = EventPayload::new();
        payload.insert("query".to_string(), json!("AI agents"));
        let emitted = writer.emit("search_started", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("search_started"));
        assert_eq!(parsed["run_id"], json!("run-abc"));
        assert_eq!(parsed["query"], json!("AI agents"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn emit_appends_one_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::for_run(Some(path.clone()));

        writer.emit("candidate_downloaded", EventPayload::new())?;
        writer.emit("candidate_skipped", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let types = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect::<Vec<String>>();
        assert_eq!(types, vec!["candidate_downloaded", "candidate_skipped"]);
        Ok(())
    }

    #[test]
    fn disabled_writer_returns_event_without_touching_disk() -> anyhow::Result<()> {
        let writer = EventWriter::disabled();
        assert!(writer.path().is_none());
        assert!(writer.run_id().starts_with("run-"));
        let emitted = writer.emit("manifest_written", EventPayload::new())?;
        assert_eq!(emitted["type"], json!("manifest_written"));
        Ok(())
    }
}
