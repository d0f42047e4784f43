use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outstanding request for the user to confirm launching an executor. At most
/// one is ever live; it is discarded on any transition out of
/// `RequestingConfirmation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationTicket {
    pub id: String,
    pub purpose: String,
    pub executor: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

pub const CONFIRMATION_TTL_SECS: i64 = 60;

impl ConfirmationTicket {
    pub fn new(id: String, executor: String, prompt: String, created_at: DateTime<Utc>) -> Self {
        Self { id, purpose: "executor_launch".to_string(), executor, prompt, created_at }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) >= chrono::Duration::seconds(CONFIRMATION_TTL_SECS)
    }
}

const ACCEPT_TOKENS: &[&str] = &["yes", "yeah", "yep", "ok", "okay", "go", "continue"];
const ACCEPT_PHRASES: &[&str] = &["do it"];
const DECLINE_TOKENS: &[&str] = &["no", "nope", "cancel", "stop"];
const DECLINE_PHRASES: &[&str] = &["don't"];
const AMBIGUOUS_TOKENS: &[&str] = &["new", "continue"];

/// Outcome of classifying a voice utterance spoken while a confirmation is
/// outstanding. This matcher never calls the Router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmVote {
    Accept,
    Decline,
    /// An accept vote (plain "yes" included) or a bare ambiguous token
    /// ("new"/"continue") landed while a prior session exists; caller
    /// should re-prompt with three explicit options rather than launch.
    Ambiguous,
    /// No token matched; the text should be routed normally.
    Unmatched,
}

/// Case-insensitive whole-word matcher over the accept/decline/ambiguous
/// token sets described for the confirmation flow. Per the spec's own
/// scenario ("ambiguous 'yes' with prior session"), any accept vote is
/// ambiguous rather than an immediate launch once there is a prior session
/// to possibly continue — not just the "new"/"continue" tokens.
pub fn classify(text: &str, has_prior_session: bool) -> ConfirmVote {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let has_phrase = |p: &str| lower.contains(p);
    let has_word = |w: &str| words.iter().any(|x| *x == w);

    let is_accept = ACCEPT_PHRASES.iter().any(|p| has_phrase(p)) || ACCEPT_TOKENS.iter().any(|t| has_word(t));
    let is_decline = DECLINE_PHRASES.iter().any(|p| has_phrase(p)) || DECLINE_TOKENS.iter().any(|t| has_word(t));
    let is_ambiguous_token = words.iter().any(|w| AMBIGUOUS_TOKENS.contains(w));

    if has_prior_session && (is_accept || is_ambiguous_token) {
        return ConfirmVote::Ambiguous;
    }
    if is_accept {
        return ConfirmVote::Accept;
    }
    if is_decline {
        return ConfirmVote::Decline;
    }
    ConfirmVote::Unmatched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_yes() {
        assert_eq!(classify("yes", false), ConfirmVote::Accept);
        assert_eq!(classify("Yeah go ahead", false), ConfirmVote::Accept);
        assert_eq!(classify("please do it", false), ConfirmVote::Accept);
    }

    #[test]
    fn declines_plain_no() {
        assert_eq!(classify("no thanks", false), ConfirmVote::Decline);
        assert_eq!(classify("don't", false), ConfirmVote::Decline);
    }

    #[test]
    fn ambiguous_with_prior_session() {
        assert_eq!(classify("new", true), ConfirmVote::Ambiguous);
        assert_eq!(classify("continue", true), ConfirmVote::Ambiguous);
    }

    /// A plain accept vote is ambiguous, not an immediate launch, once a
    /// prior session exists to possibly continue.
    #[test]
    fn plain_yes_is_ambiguous_with_prior_session() {
        assert_eq!(classify("yes", true), ConfirmVote::Ambiguous);
        assert_eq!(classify("yeah go ahead", true), ConfirmVote::Ambiguous);
    }

    #[test]
    fn new_without_prior_session_is_unmatched() {
        assert_eq!(classify("new", false), ConfirmVote::Unmatched);
    }

    #[test]
    fn unrelated_text_is_unmatched() {
        assert_eq!(classify("what's the weather", false), ConfirmVote::Unmatched);
    }

    #[test]
    fn ticket_expires_after_ttl() {
        let t = ConfirmationTicket::new("c1".into(), "claude".into(), "p".into(), Utc::now());
        assert!(!t.is_expired(Utc::now()));
        assert!(t.is_expired(Utc::now() + chrono::Duration::seconds(CONFIRMATION_TTL_SECS + 1)));
    }
}
