use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded ring of executor log lines kept for the active session.
pub const MAX_LOG_LINES: usize = 2000;

/// Completed sessions retained for status queries after the active one ends.
pub const MAX_HISTORY: usize = 32;

/// Every K executor lines, `Running` emits a `PersistSession` effect.
pub const PERSIST_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Starting,
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    UserMessage,
    AssistantMessage,
    ToolCall,
    ToolResult,
    Status,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub text: String,
}

/// A cached prose summary with the instant it was produced, used to satisfy
/// repeated status queries within the cache window without re-summarizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCache {
    pub value: String,
    pub at: DateTime<Utc>,
}

impl SummaryCache {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.at) < ttl
    }
}

/// The active (or just-terminated) session. Owned by the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub kind: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub logs: VecDeque<LogLine>,
    pub summary_cache: Option<SummaryCache>,
}

impl Session {
    pub fn new(id: String, kind: String, prompt: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            prompt,
            started_at,
            ended_at: None,
            status: SessionStatus::Starting,
            logs: VecDeque::new(),
            summary_cache: None,
        }
    }

    pub fn push_log(&mut self, kind: LogKind, text: String) {
        if self.logs.len() >= MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogLine { at: Utc::now(), kind, text });
    }

    pub fn recent_logs(&self, count: usize) -> Vec<String> {
        self.logs.iter().rev().take(count).map(|l| l.text.clone()).collect::<Vec<_>>().into_iter().rev().collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            kind: self.kind.clone(),
            prompt: self.prompt.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            status: self.status,
            log_count: self.logs.len(),
            logs: self.logs.iter().cloned().collect(),
            summary: self.summary_cache.as_ref().map(|c| c.value.clone()),
        }
    }
}

/// The serializable projection written by `SessionStorePort::save`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub kind: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub log_count: usize,
    pub logs: Vec<LogLine>,
    pub summary: Option<String>,
}

/// A terminated session retained for status queries and `time_aware_phrase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub kind: String,
    pub prompt: String,
    pub ended_at: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Bounded history of completed sessions, most-recent last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    entries: VecDeque<CompletedSession>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    pub fn push(&mut self, session: CompletedSession) {
        if self.entries.len() >= MAX_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(session);
    }

    pub fn most_recent(&self) -> Option<&CompletedSession> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validates the frozen session id shape: `YYYYMMDD_HHMMSS_XXXXXX`.
pub fn is_valid_session_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() != 22 {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| bytes[r].iter().all(|b| b.is_ascii_digit());
    let alnum = |r: std::ops::Range<usize>| bytes[r].iter().all(|b| b.is_ascii_alphanumeric());
    digits(0..8) && bytes[8] == b'_' && digits(9..15) && bytes[15] == b'_' && alnum(16..22)
}

/// Generates a fresh session id: today's date, current time, and six random
/// alphanumerics, matching the frozen `^[0-9]{8}_[0-9]{6}_[A-Za-z0-9]{6}$` shape.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let suffix: String = (0..6)
        .map(|_| {
            let n = rand::random::<u8>() % 62;
            match n {
                0..=9 => (b'0' + n) as char,
                10..=35 => (b'a' + (n - 10)) as char,
                _ => (b'A' + (n - 36)) as char,
            }
        })
        .collect();
    format!("{}_{}", stamp, suffix)
}

/// Deterministic natural-language preamble based on elapsed time since `end_time`.
pub fn time_aware_phrase(now: DateTime<Utc>, end_time: DateTime<Utc>, summary: &str) -> String {
    let elapsed = now.signed_duration_since(end_time);
    let lead = if elapsed < chrono::Duration::minutes(1) {
        "I just finished"
    } else if elapsed < chrono::Duration::minutes(5) {
        "A few minutes ago, I"
    } else if elapsed < chrono::Duration::hours(1) {
        "Earlier, I"
    } else {
        "Previously, I"
    };
    format!("{} {}", lead, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_session_id_shape() {
        assert!(is_valid_session_id("20260728_120000_ab3Xy9"));
        assert!(!is_valid_session_id("20260728-120000_ab3Xy9"));
        assert!(!is_valid_session_id("20260728_120000_ab3Xy"));
        assert!(!is_valid_session_id(""));
    }

    #[test]
    fn generated_session_id_is_valid() {
        let id = generate_session_id(Utc::now());
        assert!(is_valid_session_id(&id), "{id}");
    }

    #[test]
    fn time_aware_phrase_buckets() {
        let end = Utc::now();
        assert!(time_aware_phrase(end, end, "finished the task").starts_with("I just finished"));
        assert!(time_aware_phrase(end + chrono::Duration::minutes(3), end, "x").starts_with("A few minutes ago"));
        assert!(time_aware_phrase(end + chrono::Duration::minutes(30), end, "x").starts_with("Earlier"));
        assert!(time_aware_phrase(end + chrono::Duration::hours(5), end, "x").starts_with("Previously"));
    }

    #[test]
    fn history_caps_at_max_and_keeps_most_recent() {
        let mut h = SessionHistory::new();
        for i in 0..(MAX_HISTORY + 5) {
            h.push(CompletedSession {
                id: format!("s{i}"),
                kind: "claude".into(),
                prompt: "p".into(),
                ended_at: Utc::now(),
                summary: None,
            });
        }
        assert_eq!(h.len(), MAX_HISTORY);
        assert_eq!(h.most_recent().unwrap().id, format!("s{}", MAX_HISTORY + 4));
    }
}
