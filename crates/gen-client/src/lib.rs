//! `gen-client`: driver for the external content-generation collaborator.
//!
//! The decision core never produces natural-language content itself; it asks
//! an external model for it through the [`Generate`] trait. This crate owns
//! that boundary: the trait, an HTTP backend ([`HttpGenerator`]), and the
//! timeout/retry policy ([`GenPolicy`], [`generate_with_policy`]) that turns
//! a slow or flaky collaborator into a single, bounded failure the caller can
//! convert into a stage failure.

pub mod error;
pub mod http;
pub mod policy;

pub use error::GenClientError;
pub use http::HttpGenerator;
pub use policy::{generate_with_policy, GenPolicy};

use futures::future::BoxFuture;
use serde_json::Value;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GenClientError>;

/// A fallible, potentially slow external content generator.
///
/// `context` is ambient data for the generation call (prior stage outputs,
/// existing artifacts); implementations pass it through opaquely.
pub trait Generate: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str, context: &'a Value) -> BoxFuture<'a, Result<String>>;
}
