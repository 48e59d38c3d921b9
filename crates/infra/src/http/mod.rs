//! HTTP transport and the send pipeline built on it

pub mod client;
pub mod clone;
pub mod errors;
pub mod pipeline;

pub use client::{HttpClient, HttpClientBuilder};
pub use clone::clone_request;
pub use errors::{classify_status, SendError, SendErrorCategory};
pub use pipeline::{backoff_delay, HttpReply, SendOptions, SendPipeline};
