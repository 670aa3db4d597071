//! Request lifecycle for a single generation session.
//!
//! [`RequestController`] is the only owner of the lifecycle state and the
//! accumulated response text. Front-ends receive [`ControllerEvent`]s over a
//! channel and read snapshots; they never mutate either value.
//!
//! ```text
//! Idle -> Submitting -> Failed
//!                    -> Streaming -> Completed
//!                                 -> Failed
//! ```

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_PROMPT_CHARS;
use crate::decoder::decode;
use crate::endpoint::{ByteChannel, EndpointResponse, GenerationEndpoint, GenerationRequest};
use crate::error::SubmitError;
use crate::input::char_count;
use crate::state::{ControllerEvent, Failure, LifecycleState, RequestId};

/// How a call to [`RequestController::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The body was streamed to the end.
    Completed,
    /// The request ended in `Failed`; see [`RequestController::state`].
    Failed,
    /// Success status without a body. The state went back to `Idle`.
    NoContent,
    /// Every observer went away mid-stream, so reading stopped.
    Abandoned,
}

impl SubmitOutcome {
    /// Whether the request ended without an error the user needs to see.
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Completed | SubmitOutcome::NoContent)
    }
}

pub struct RequestController<E> {
    endpoint: E,
    events: mpsc::UnboundedSender<ControllerEvent>,
    state: LifecycleState,
    text: String,
    request: RequestId,
    max_prompt_chars: usize,
}

impl<E: GenerationEndpoint> RequestController<E> {
    /// Create a controller and the receiving end of its event channel.
    pub fn new(endpoint: E) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            endpoint,
            events,
            state: LifecycleState::Idle,
            text: String::new(),
            request: RequestId::default(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        };
        (controller, rx)
    }

    pub fn with_prompt_limit(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Accumulated response text of the current (or last) request.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn current_request(&self) -> RequestId {
        self.request
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn prompt_limit(&self) -> usize {
        self.max_prompt_chars
    }

    /// Return a finished controller to `Idle`, clearing the text.
    pub fn reset(&mut self) {
        self.text.clear();
        self.transition(LifecycleState::Idle);
    }

    /// Run one request/response cycle for `prompt`.
    ///
    /// Only prompt validation produces an `Err`; once the request has been
    /// issued every failure ends up in [`LifecycleState::Failed`]. Dropping
    /// the returned future abandons the request without publishing anything
    /// further, and the next `submit` starts from a cleared buffer.
    pub async fn submit(&mut self, prompt: &str) -> Result<SubmitOutcome, SubmitError> {
        if prompt.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        let len = char_count(prompt);
        if len > self.max_prompt_chars {
            return Err(SubmitError::PromptTooLong {
                len,
                max: self.max_prompt_chars,
            });
        }

        self.request = self.request.next();
        self.text.clear();
        // A new submission passes through Idle; observers only need the new phase.
        self.state = LifecycleState::Idle;
        self.transition(LifecycleState::Submitting);
        info!(request = %self.request, chars = len, "submitting prompt");

        let response = match self.endpoint.generate(&GenerationRequest::new(prompt)).await {
            Ok(response) => response,
            Err(err) => {
                warn!(request = %self.request, kind = "transport", error = %err, "generation request failed");
                self.transition(LifecycleState::Failed(Failure::transport(err.to_string())));
                return Ok(SubmitOutcome::Failed);
            }
        };

        match response {
            EndpointResponse::Rejected {
                status,
                body,
                rate_limit,
            } => {
                warn!(
                    request = %self.request,
                    status,
                    limit = ?rate_limit.limit,
                    remaining = ?rate_limit.remaining,
                    reset = ?rate_limit.reset_at,
                    "generation endpoint rejected request"
                );
                self.transition(LifecycleState::Failed(Failure::rejected(status, body, rate_limit)));
                Ok(SubmitOutcome::Failed)
            }
            EndpointResponse::Success { body: None } => {
                info!(request = %self.request, "response has no body");
                self.transition(LifecycleState::Idle);
                Ok(SubmitOutcome::NoContent)
            }
            EndpointResponse::Success { body: Some(channel) } => {
                self.transition(LifecycleState::Streaming);
                Ok(self.consume(channel).await)
            }
        }
    }

    async fn consume(&mut self, channel: ByteChannel) -> SubmitOutcome {
        let chunks = decode(channel);
        futures_util::pin_mut!(chunks);

        loop {
            if self.events.is_closed() {
                info!(request = %self.request, chars = self.text.len(), "observers gone, abandoning stream");
                // Nobody will see the rest, so the partial text goes with it.
                self.text.clear();
                self.state = LifecycleState::Idle;
                return SubmitOutcome::Abandoned;
            }

            let Some(item) = chunks.next().await else {
                break;
            };

            match item {
                Ok(chunk) => {
                    self.text.push_str(&chunk);
                    debug!(
                        request = %self.request,
                        chunk_bytes = chunk.len(),
                        total_bytes = self.text.len(),
                        "appended chunk"
                    );
                    let snapshot = self.text.clone();
                    self.publish(ControllerEvent::TextUpdated {
                        request: self.request,
                        chunk,
                        snapshot,
                    });
                }
                Err(err) => {
                    let failure = if err.is_malformed_body() {
                        warn!(request = %self.request, kind = "decode", bytes_read = err.bytes_read, error = %err, "response body malformed");
                        Failure::decode(err.to_string())
                    } else {
                        warn!(request = %self.request, kind = "transport", bytes_read = err.bytes_read, error = %err, "stream interrupted");
                        Failure::transport(err.to_string())
                    };
                    // Partial text stays in place for the user.
                    self.transition(LifecycleState::Failed(failure));
                    return SubmitOutcome::Failed;
                }
            }
        }

        info!(request = %self.request, chars = char_count(&self.text), "stream completed");
        self.transition(LifecycleState::Completed);
        self.publish(ControllerEvent::ScrollToResult {
            request: self.request,
        });
        SubmitOutcome::Completed
    }

    fn transition(&mut self, state: LifecycleState) {
        self.state = state.clone();
        self.publish(ControllerEvent::LifecycleChanged {
            request: self.request,
            state,
        });
    }

    fn publish(&self, event: ControllerEvent) {
        // A closed channel means nobody is rendering; that is not an error.
        let _ = self.events.send(event);
    }
}
