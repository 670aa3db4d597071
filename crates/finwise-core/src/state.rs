//! UI-agnostic request lifecycle types
//!
//! This module contains the state published by the request controller. Any
//! front-end (TUI, CLI, ...) renders from these types without depending on
//! how the request was issued.

use serde::{Deserialize, Serialize};

/// Message shown when the endpoint signals that the daily quota is used up.
pub const RATE_LIMIT_MESSAGE: &str =
    "You have no API requests remaining today. Try again after 24 hours.";

/// Message shown for any other rejection by the endpoint.
pub const REJECTED_MESSAGE: &str =
    "The service could not handle your request. Please try again.";

/// Message shown for network and stream failures.
pub const TRANSPORT_MESSAGE: &str = "An error occurred. Please try again.";

/// Identifies one `submit` call. Every published event carries the id of the
/// request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn next(self) -> Self {
        RequestId(self.0 + 1)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Phase of the current generation request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed(Failure),
}

impl LifecycleState {
    /// True while a request is waiting for headers or reading the body.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, LifecycleState::Submitting | LifecycleState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Failed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            LifecycleState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Submitting => "submitting",
            LifecycleState::Streaming => "streaming",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed(_) => "failed",
        }
    }
}

/// Rate-limit headers captured from a rejected response.
///
/// A header the server did not send is `None`; it is never replaced with an
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: Option<String>,
    pub remaining: Option<String>,
    pub reset_at: Option<String>,
}

impl RateLimitInfo {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_at.is_none()
    }

    /// The quota is reported as used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining
            .as_deref()
            .map(|r| r.trim() == "0")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The endpoint answered with a status outside 200-299.
    RejectedByServer { status: u16 },
    /// The connection failed before or during streaming.
    Transport,
    /// The body ended unexpectedly or could not be decoded.
    Decode,
}

/// Why a request ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Response body for rejections, error description otherwise.
    pub detail: String,
    /// Present only for rejections.
    pub rate_limit: Option<RateLimitInfo>,
}

impl Failure {
    pub fn rejected(status: u16, body: String, rate_limit: RateLimitInfo) -> Self {
        Self {
            kind: FailureKind::RejectedByServer { status },
            detail: body,
            rate_limit: Some(rate_limit),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            detail: detail.into(),
            rate_limit: None,
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Decode,
            detail: detail.into(),
            rate_limit: None,
        }
    }

    /// A rejection caused by the caller's quota (HTTP 429, or the server
    /// reporting zero remaining requests).
    pub fn is_rate_limited(&self) -> bool {
        match self.kind {
            FailureKind::RejectedByServer { status } => {
                status == 429
                    || self
                        .rate_limit
                        .as_ref()
                        .map(RateLimitInfo::is_exhausted)
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Human-readable reason for the rendering layer.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            FailureKind::RejectedByServer { .. } if self.is_rate_limited() => RATE_LIMIT_MESSAGE,
            FailureKind::RejectedByServer { .. } => REJECTED_MESSAGE,
            FailureKind::Transport | FailureKind::Decode => TRANSPORT_MESSAGE,
        }
    }
}

/// Notification sent from the controller to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    LifecycleChanged {
        request: RequestId,
        state: LifecycleState,
    },
    /// One decoded increment and the accumulated text after appending it.
    TextUpdated {
        request: RequestId,
        chunk: String,
        snapshot: String,
    },
    /// Fired once after a request completes so the view can bring the
    /// result into focus.
    ScrollToResult { request: RequestId },
}

impl ControllerEvent {
    pub fn request(&self) -> RequestId {
        match self {
            ControllerEvent::LifecycleChanged { request, .. }
            | ControllerEvent::TextUpdated { request, .. }
            | ControllerEvent::ScrollToResult { request } => *request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_by_status() {
        let failure = Failure::rejected(429, "slow down".into(), RateLimitInfo::default());
        assert!(failure.is_rate_limited());
        assert_eq!(failure.user_message(), RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn test_rate_limited_by_remaining_header() {
        let info = RateLimitInfo {
            limit: Some("5".into()),
            remaining: Some("0".into()),
            reset_at: Some("1700000000".into()),
        };
        let failure = Failure::rejected(403, String::new(), info);
        assert!(failure.is_rate_limited());
    }

    #[test]
    fn test_server_error_is_not_rate_limited() {
        let failure = Failure::rejected(500, "boom".into(), RateLimitInfo::default());
        assert!(!failure.is_rate_limited());
        assert_eq!(failure.user_message(), REJECTED_MESSAGE);
        assert_ne!(failure.user_message(), TRANSPORT_MESSAGE);
    }

    #[test]
    fn test_transport_and_decode_share_message() {
        assert_eq!(Failure::transport("reset").user_message(), TRANSPORT_MESSAGE);
        assert_eq!(Failure::decode("truncated").user_message(), TRANSPORT_MESSAGE);
        assert!(Failure::transport("reset").rate_limit.is_none());
    }

    #[test]
    fn test_in_flight_states() {
        assert!(!LifecycleState::Idle.is_in_flight());
        assert!(LifecycleState::Submitting.is_in_flight());
        assert!(LifecycleState::Streaming.is_in_flight());
        assert!(LifecycleState::Completed.is_terminal());
        assert!(LifecycleState::Failed(Failure::transport("x")).is_terminal());
    }
}
