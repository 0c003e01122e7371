//! Concrete domain agents built from the generic core.
//!
//! Each agent wires a capability descriptor to its stage functions, score
//! rules, detectors, and fix generators, and hands the result back as a
//! plain [`crate::agent::Agent`].

pub mod backend;
pub mod cloud;

pub use backend::BackendCoderAgent;
pub use cloud::CloudArchitectAgent;
