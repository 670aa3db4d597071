pub mod config;
pub mod controller;
pub mod decoder;
pub mod endpoint;
pub mod error;
pub mod input;
pub mod state;

// Re-export main types for convenience
pub use config::Config;
pub use controller::{RequestController, SubmitOutcome};
pub use decoder::{decode, Utf8Decoder};
pub use endpoint::{EndpointResponse, GenerationEndpoint, GenerationRequest, HttpEndpoint};
pub use error::{DecodeError, EndpointError, SubmitError};
pub use state::{ControllerEvent, Failure, FailureKind, LifecycleState, RateLimitInfo, RequestId};
