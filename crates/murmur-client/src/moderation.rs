//! Moderation gateway.
//!
//! The moderation signal comes from an external service. How it feeds the
//! session is a deployment choice, expressed as a [`ModerationPolicy`]:
//!
//! - [`ClientChecked`]: every outgoing text is analyzed before it is sent. A
//!   flagged text is replaced by its sanitized rewrite and the counter goes up
//!   by one. Service failures fail open.
//! - [`ServerAuthoritative`]: nothing is checked locally. The counter follows
//!   the `moderationCount` embedded in inbound `TALK` events and is seeded once
//!   from the count endpoint.
//!
//! The policy is pure. Network calls are made by a
//! [`ModerationService`](crate::ModerationService) and come back as events.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

/// Which policy a session uses. Chosen once, at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationMode {
    /// Analyze and possibly rewrite every outgoing message.
    #[default]
    ClientChecked,
    /// Trust the count embedded in inbound messages.
    ServerAuthoritative,
}

impl ModerationMode {
    /// Configuration name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientChecked => "client-checked",
            Self::ServerAuthoritative => "server-authoritative",
        }
    }
}

impl fmt::Display for ModerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationMode {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client-checked" => Ok(Self::ClientChecked),
            "server-authoritative" => Ok(Self::ServerAuthoritative),
            other => Err(crate::ConfigError::UnknownModerationMode(other.to_string())),
        }
    }
}

/// Number of flagged messages in the room.
///
/// Never decremented, except when an authoritative server value replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModerationCounter(u64);

impl ModerationCounter {
    /// Current value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Count one more flagged message.
    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// Replace with an authoritative value.
    pub fn replace(&mut self, value: u64) {
        self.0 = value;
    }
}

/// Outcome of analyzing one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// True if the text was judged offensive.
    pub flagged: bool,
    /// Sanitized replacement proposed by the service.
    pub rewritten_text: Option<String>,
    /// Classifier confidence, when reported.
    pub confidence: Option<f64>,
    /// Words that triggered the dictionary filter.
    pub detected_words: Vec<String>,
}

impl Verdict {
    /// A verdict that lets the text through unchanged.
    #[must_use]
    pub fn clean() -> Self {
        Self { flagged: false, rewritten_text: None, confidence: None, detected_words: Vec::new() }
    }

    /// A flagged verdict with the given rewrite.
    pub fn flagged(rewritten_text: impl Into<String>) -> Self {
        Self { flagged: true, rewritten_text: Some(rewritten_text.into()), ..Self::clean() }
    }
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    /// `1` if the text is flagged, `0` otherwise.
    pub final_decision: u8,
    /// Rewrite stage output.
    #[serde(default)]
    pub result: Option<RewriteSection>,
    /// Classifier stage output.
    #[serde(default)]
    pub kobert: Option<ClassifierSection>,
    /// Dictionary stage output.
    #[serde(default)]
    pub fasttext: Option<DictionarySection>,
}

/// `result` section of an analysis response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewriteSection {
    /// Sanitized replacement text.
    #[serde(default)]
    pub rewritten_text: Option<String>,
}

/// `kobert` section of an analysis response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierSection {
    /// Classifier confidence.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// `fasttext` section of an analysis response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DictionarySection {
    /// Words that matched.
    #[serde(default)]
    pub detected_words: Vec<String>,
}

impl From<AnalysisResponse> for Verdict {
    fn from(response: AnalysisResponse) -> Self {
        Self {
            flagged: response.final_decision == 1,
            rewritten_text: response.result.and_then(|r| r.rewritten_text),
            confidence: response.kobert.and_then(|k| k.confidence),
            detected_words: response.fasttext.map(|f| f.detected_words).unwrap_or_default(),
        }
    }
}

/// Failure calling the moderation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModerationError {
    /// Request could not be sent or completed.
    #[error("moderation request failed: {0}")]
    Request(String),

    /// Service did not answer in time.
    #[error("moderation request timed out")]
    Timeout,

    /// Service answered with a non-success status.
    #[error("moderation service returned status {0}")]
    Status(u16),

    /// Service answered with a body that could not be parsed.
    #[error("unparseable moderation response: {0}")]
    Parse(String),
}

/// How the moderation signal feeds a session.
pub trait ModerationPolicy: Send + fmt::Debug {
    /// Mode this policy implements.
    fn mode(&self) -> ModerationMode;

    /// Current counter value.
    fn current_count(&self) -> u64;

    /// True if outgoing text must be analyzed before it is sent.
    fn checks_outgoing(&self) -> bool;

    /// Decide what to transmit for `original` given the analysis outcome.
    ///
    /// Only called when [`Self::checks_outgoing`] is true.
    fn resolve_outgoing(
        &mut self,
        original: &str,
        verdict: Result<&Verdict, &ModerationError>,
    ) -> String;

    /// Observe the count carried by an inbound `TALK`. Returns true if the
    /// counter changed.
    fn observe_talk(&mut self, count: Option<u64>) -> bool;

    /// True if the counter should be seeded from the count endpoint.
    fn needs_seed(&self) -> bool;

    /// Apply the seed. Returns true if the counter changed.
    fn apply_seed(&mut self, count: u64) -> bool;
}

/// Analyze-then-send policy.
#[derive(Debug, Default)]
pub struct ClientChecked {
    counter: ModerationCounter,
}

impl ModerationPolicy for ClientChecked {
    fn mode(&self) -> ModerationMode {
        ModerationMode::ClientChecked
    }

    fn current_count(&self) -> u64 {
        self.counter.get()
    }

    fn checks_outgoing(&self) -> bool {
        true
    }

    fn resolve_outgoing(
        &mut self,
        original: &str,
        verdict: Result<&Verdict, &ModerationError>,
    ) -> String {
        match verdict {
            Ok(verdict) if verdict.flagged => {
                self.counter.increment();
                verdict.rewritten_text.clone().unwrap_or_else(|| mask(original))
            },
            Ok(_) | Err(_) => original.to_string(),
        }
    }

    fn observe_talk(&mut self, _count: Option<u64>) -> bool {
        false
    }

    fn needs_seed(&self) -> bool {
        false
    }

    fn apply_seed(&mut self, _count: u64) -> bool {
        false
    }
}

/// Server-counted policy.
#[derive(Debug, Default)]
pub struct ServerAuthoritative {
    counter: ModerationCounter,
    authoritative_seen: bool,
}

impl ModerationPolicy for ServerAuthoritative {
    fn mode(&self) -> ModerationMode {
        ModerationMode::ServerAuthoritative
    }

    fn current_count(&self) -> u64 {
        self.counter.get()
    }

    fn checks_outgoing(&self) -> bool {
        false
    }

    fn resolve_outgoing(
        &mut self,
        original: &str,
        _verdict: Result<&Verdict, &ModerationError>,
    ) -> String {
        original.to_string()
    }

    fn observe_talk(&mut self, count: Option<u64>) -> bool {
        let Some(count) = count else {
            return false;
        };
        self.authoritative_seen = true;
        let changed = self.counter.get() != count;
        self.counter.replace(count);
        changed
    }

    fn needs_seed(&self) -> bool {
        true
    }

    fn apply_seed(&mut self, count: u64) -> bool {
        // A TALK count is newer than whatever the seed request saw.
        if self.authoritative_seen || self.counter.get() == count {
            return false;
        }
        self.counter.replace(count);
        true
    }
}

/// One star per character.
fn mask(text: &str) -> String {
    "*".repeat(text.chars().count())
}

/// The session's moderation policy.
#[derive(Debug)]
pub struct ModerationGateway {
    policy: Box<dyn ModerationPolicy>,
}

impl ModerationGateway {
    /// Gateway running the policy for `mode`, counter at zero.
    #[must_use]
    pub fn new(mode: ModerationMode) -> Self {
        Self { policy: policy_for(mode) }
    }

    /// Reset to a fresh policy of the same mode.
    pub fn reset(&mut self) {
        self.policy = policy_for(self.policy.mode());
    }

    /// Mode of the active policy.
    #[must_use]
    pub fn mode(&self) -> ModerationMode {
        self.policy.mode()
    }

    /// Current counter value.
    #[must_use]
    pub fn current_count(&self) -> u64 {
        self.policy.current_count()
    }

    /// See [`ModerationPolicy::checks_outgoing`].
    #[must_use]
    pub fn checks_outgoing(&self) -> bool {
        self.policy.checks_outgoing()
    }

    /// See [`ModerationPolicy::resolve_outgoing`].
    pub fn resolve_outgoing(
        &mut self,
        original: &str,
        verdict: Result<&Verdict, &ModerationError>,
    ) -> String {
        self.policy.resolve_outgoing(original, verdict)
    }

    /// See [`ModerationPolicy::observe_talk`].
    pub fn observe_talk(&mut self, count: Option<u64>) -> bool {
        self.policy.observe_talk(count)
    }

    /// See [`ModerationPolicy::needs_seed`].
    #[must_use]
    pub fn needs_seed(&self) -> bool {
        self.policy.needs_seed()
    }

    /// See [`ModerationPolicy::apply_seed`].
    pub fn apply_seed(&mut self, count: u64) -> bool {
        self.policy.apply_seed(count)
    }
}

fn policy_for(mode: ModerationMode) -> Box<dyn ModerationPolicy> {
    match mode {
        ModerationMode::ClientChecked => Box::new(ClientChecked::default()),
        ModerationMode::ServerAuthoritative => Box::new(ServerAuthoritative::default()),
    }
}
