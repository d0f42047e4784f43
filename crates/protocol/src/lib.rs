use serde::{Deserialize, Serialize};

/// Protocol version (bumped when breaking changes are introduced).
pub const VERSION: u8 = 1;

/// Top-level message envelope exchanged between the workstation and its peers
/// (mobile app, TUI, HTTP ingest). Unknown top-level fields are ignored by
/// receivers; an unrecognized `type` fails to deserialize and the bridge
/// drops it as a protocol error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    UserText(UserText),
    Ack(Ack),
    ConfirmResponse(ConfirmResponse),
    PromptConfirmation(PromptConfirmation),
    Status(Status),
    SttRequest(SttRequest),
    SttResult(SttResult),
    GetLogs(GetLogs),
    Logs(Logs),
}

/// Text emitted by a user/input device (phone, TUI, API). Supports partial/final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>, // "phone" | "tui" | "api" | "unknown"
    #[serde(default, rename = "final", skip_serializing_if = "is_false")]
    pub final_: bool,
}

/// A simple acknowledgement, sent on receipt of a `user_text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub text: String,
}

/// Response to a `prompt_confirmation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "for")]
    pub for_: String,
    pub accept: bool,
}

/// Outbound request for the user to confirm launching an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfirmation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "for")]
    pub for_: String,
    pub executor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    pub prompt: String,
}

/// Outbound status line, spoken or displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    pub level: String, // "info" | "warn" | "error"
    pub text: String,
}

/// Mobile-only side channel: ask the workstation to transcribe recorded
/// audio. Bypasses the state machine entirely; handled directly by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    pub id: String,
    pub mime: String,
    pub data: String, // base64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub text: String,
    pub ok: bool,
}

/// Mobile-only side channel: fetch recent session log lines. Bypasses the
/// state machine entirely; handled directly by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLogs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    pub id: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub count: usize,
    pub logs: Vec<String>,
}

#[inline]
fn is_false(b: &bool) -> bool {
    !*b
}

impl Message {
    pub fn user_text<S: Into<String>>(text: S, source: Option<String>, final_: bool) -> Self {
        Message::UserText(UserText {
            v: Some(VERSION),
            id: None,
            text: text.into(),
            source,
            final_,
        })
    }

    pub fn ack<S: Into<String>>(text: S, reply_to: Option<String>) -> Self {
        Message::Ack(Ack {
            v: Some(VERSION),
            reply_to,
            text: text.into(),
        })
    }

    pub fn status<S: Into<String>>(level: &str, text: S) -> Self {
        Message::Status(Status {
            v: Some(VERSION),
            level: level.to_string(),
            text: text.into(),
        })
    }

    pub fn info<S: Into<String>>(text: S) -> Self {
        Self::status("info", text)
    }

    pub fn warn<S: Into<String>>(text: S) -> Self {
        Self::status("warn", text)
    }

    pub fn error<S: Into<String>>(text: S) -> Self {
        Self::status("error", text)
    }

    pub fn prompt_confirmation<S: Into<String>>(
        id: String,
        for_: S,
        executor: S,
        working_dir: Option<String>,
        prompt: S,
    ) -> Self {
        Message::PromptConfirmation(PromptConfirmation {
            v: Some(VERSION),
            id: Some(id),
            for_: for_.into(),
            executor: executor.into(),
            working_dir,
            prompt: prompt.into(),
        })
    }
}

/// Wire framing used by the relay transport. Kept separate from `Message`
/// since the relay forwards app frames opaquely inside its own envelope and
/// never interprets them.
pub mod relay {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Hello {
        #[serde(rename = "type")]
        pub msg_type: String,
        pub s: String,
        pub t: String,
        pub r: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        #[serde(rename = "type")]
        pub msg_type: String,
        pub sid: String,
        #[serde(rename = "fromRole")]
        pub from_role: String,
        pub at: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub frame: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub b64: Option<bool>,
    }

    pub const TYPE_HELLO: &str = "hello";
    pub const TYPE_HELLO_ACK: &str = "hello-ack";
    pub const TYPE_FRAME: &str = "frame";
    pub const TYPE_HEARTBEAT: &str = "hb";
    pub const TYPE_PEER_JOINED: &str = "peer-joined";
    pub const TYPE_PEER_LEFT: &str = "peer-left";
    pub const TYPE_SESSION_KILLED: &str = "session-killed";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(m: Message) {
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(format!("{:?}", m), format!("{:?}", back));
    }

    #[test]
    fn user_text_roundtrip() {
        roundtrip(Message::user_text("build me a cli", Some("phone".into()), true));
    }

    #[test]
    fn confirm_response_roundtrip() {
        roundtrip(Message::ConfirmResponse(ConfirmResponse {
            v: Some(VERSION),
            id: Some("confirm_1".into()),
            for_: "executor_launch".into(),
            accept: true,
        }));
    }

    #[test]
    fn prompt_confirmation_uses_for_field_name() {
        let m = Message::prompt_confirmation(
            "confirm_1".into(),
            "executor_launch",
            "claude",
            None,
            "fix the bug",
        );
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"for\":\"executor_launch\""));
        assert!(!json.contains("for_"));
        roundtrip(m);
    }

    #[test]
    fn status_roundtrip() {
        roundtrip(Message::info("Starting Claude Code for: fix the bug"));
    }

    #[test]
    fn unknown_type_fails_to_deserialize() {
        let json = r#"{"type":"bogus","text":"hi"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn final_field_serializes_as_final_not_final_underscore() {
        let m = Message::user_text("hi", None, true);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"final\":true"));
    }

    #[test]
    fn final_defaults_to_false_and_is_omitted() {
        let m = Message::user_text("hi", None, false);
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("final"));
    }

    #[test]
    fn logs_roundtrip() {
        roundtrip(Message::Logs(Logs {
            v: Some(VERSION),
            reply_to: Some("req_1".into()),
            count: 2,
            logs: vec!["line one".into(), "line two".into()],
        }));
    }
}
