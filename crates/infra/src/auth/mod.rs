//! Authentication plumbing for the send pipeline
//!
//! Token acquisition itself is a collaborator ([`erpsync_core::CredentialProvider`]);
//! this module only caches the current token and serializes renewals.

pub mod token_cache;

pub use token_cache::TokenCache;
