use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent_engine::action::ActionDescriptor;
use crate::errors::EyeControlResult;

/// Raw model text longer than this is cut when shown back to the model.
const MARKER_RAW_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerKind {
    InvalidCoords,
    MalformedResponse,
    MissingPayload,
}

impl MarkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCoords => "INVALID_COORDS",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::MissingPayload => "MISSING_PAYLOAD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Executed {
        ts: i64,
        action: ActionDescriptor,
    },
    /// A rejected proposal, kept for the audit trail and the next retry's context.
    Marker {
        ts: i64,
        marker: MarkerKind,
        reason: String,
        raw: serde_json::Value,
    },
}

impl HistoryEntry {
    pub fn executed(action: ActionDescriptor) -> Self {
        Self::Executed {
            ts: chrono::Utc::now().timestamp_millis(),
            action,
        }
    }

    pub fn marker(marker: MarkerKind, reason: impl Into<String>, raw: serde_json::Value) -> Self {
        Self::Marker {
            ts: chrono::Utc::now().timestamp_millis(),
            marker,
            reason: reason.into(),
            raw,
        }
    }

    pub fn as_executed(&self) -> Option<&ActionDescriptor> {
        match self {
            Self::Executed { action, .. } => Some(action),
            Self::Marker { .. } => None,
        }
    }

    /// Flat record shown to the model.
    pub fn to_prompt_value(&self) -> serde_json::Value {
        match self {
            Self::Executed { action, .. } => action.to_value(),
            Self::Marker {
                marker,
                reason,
                raw,
                ..
            } => {
                let raw = match raw {
                    serde_json::Value::String(s) => serde_json::Value::String(truncate(s, MARKER_RAW_LIMIT)),
                    other => other.clone(),
                };
                serde_json::json!({
                    "action": marker.as_str(),
                    "reason": reason,
                    "raw": raw,
                })
            }
        }
    }
}

fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// Append-only record of one objective. The full list is the audit trail;
/// only [`SessionHistory::window`] is ever shown to the model.
pub struct SessionHistory {
    pub session_id: String,
    entries: Vec<HistoryEntry>,
    file_path: Option<PathBuf>,
}

impl SessionHistory {
    /// History with a JSONL audit file under `audit_dir`.
    pub fn new(audit_dir: &Path) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = audit_dir.join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            entries: Vec::new(),
            file_path: Some(file_path),
        }
    }

    /// History that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            entries: Vec::new(),
            file_path: None,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, session = %self.session_id, "history audit write failed");
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The last `k` entries in their original order.
    pub fn window(&self, k: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(k);
        &self.entries[start..]
    }

    pub fn window_values(&self, k: usize) -> Vec<serde_json::Value> {
        self.window(k).iter().map(HistoryEntry::to_prompt_value).collect()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Append the latest entry to the JSONL file.
    fn flush(&self) -> EyeControlResult<()> {
        let (Some(path), Some(last)) = (&self.file_path, self.entries.last()) else {
            return Ok(());
        };
        let line = serde_json::to_string(last)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), "history entry flushed");
        Ok(())
    }
}

/// `<data_local_dir>/eyecontrol/sessions`, falling back to `./sessions`.
pub fn default_audit_dir() -> PathBuf {
    let dir = dirs::data_local_dir()
        .map(|d| d.join("eyecontrol").join("sessions"))
        .unwrap_or_else(|| PathBuf::from("sessions"));
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "cannot create audit dir");
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::action::ActionKind;

    fn typed(n: usize) -> HistoryEntry {
        HistoryEntry::executed(ActionDescriptor::type_text(format!("t{n}")))
    }

    #[test]
    fn window_keeps_last_k_in_order() {
        let mut h = SessionHistory::in_memory();
        for n in 0..10 {
            h.push(typed(n));
        }
        let w = h.window(4);
        assert_eq!(w.len(), 4);
        let texts: Vec<_> = w
            .iter()
            .map(|e| e.as_executed().unwrap().text.clone().unwrap())
            .collect();
        assert_eq!(texts, vec!["t6", "t7", "t8", "t9"]);
        assert_eq!(h.entries().len(), 10);
    }

    #[test]
    fn window_larger_than_history_returns_everything() {
        let mut h = SessionHistory::in_memory();
        h.push(typed(0));
        assert_eq!(h.window(6).len(), 1);
        assert!(SessionHistory::in_memory().window(3).is_empty());
    }

    #[test]
    fn marker_prompt_value_is_flat_and_truncated() {
        let long = "x".repeat(2 * MARKER_RAW_LIMIT);
        let m = HistoryEntry::marker(
            MarkerKind::MalformedResponse,
            "no JSON object",
            serde_json::Value::String(long),
        );
        let v = m.to_prompt_value();
        assert_eq!(v["action"], "MALFORMED_RESPONSE");
        assert_eq!(v["reason"], "no JSON object");
        assert_eq!(v["raw"].as_str().unwrap().chars().count(), MARKER_RAW_LIMIT + 1);
        assert!(m.as_executed().is_none());
    }

    #[test]
    fn audit_file_gets_one_line_per_entry() {
        let dir = std::env::temp_dir().join(format!("eyecontrol-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut h = SessionHistory::new(&dir);
        h.push(HistoryEntry::executed(ActionDescriptor::new(ActionKind::Noop)));
        h.push(HistoryEntry::marker(
            MarkerKind::InvalidCoords,
            "x too close to left edge",
            ActionDescriptor::click(0.01, 0.5).to_value(),
        ));
        let content = std::fs::read_to_string(h.file_path().unwrap()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: HistoryEntry = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(back, HistoryEntry::Marker { marker: MarkerKind::InvalidCoords, .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
