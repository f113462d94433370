//! Shared types for the join pipeline.

use crate::channels::Envelope;

/// Trigger word, compared case-insensitively after trimming.
pub const JOIN_TRIGGER: &str = "join";

/// Whether message text asks to join.
pub fn is_join_trigger(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(JOIN_TRIGGER)
}

// ── Join request ────────────────────────────────────────────────────

/// A requester asking to be let into the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Phone number (`+...`) or an opaque hidden-number token.
    pub source: String,
}

impl JoinRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Extract a join request from an envelope.
    ///
    /// Requires trigger text and a sender identity.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let text = envelope.text()?;
        if !is_join_trigger(text) {
            return None;
        }
        envelope.sender().map(Self::new)
    }

    /// Whether the requester's phone number is visible.
    pub fn has_visible_number(&self) -> bool {
        self.source.starts_with('+')
    }
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Number hidden by privacy settings. Warned, not moved.
    HiddenNumberWarning,
    /// Carrier reported a non-mobile line. Rejected, not moved.
    CarrierRejected,
    /// Allow-listed area code. Moved into the verified group.
    RoutedVerified,
    /// Anything else. Moved into the unverified group.
    RoutedUnverified,
}

impl Verdict {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HiddenNumberWarning => "hidden_number_warning",
            Self::CarrierRejected => "carrier_rejected",
            Self::RoutedVerified => "routed_verified",
            Self::RoutedUnverified => "routed_unverified",
        }
    }
}
