//! Domain types and rules for SceneCast video generation.
//!
//! Nothing in this crate performs I/O; remote calls are only described as
//! traits in [`collaborators`]. The orchestration layer
//! (`scenecast-pipeline`) and the HTTP collaborators (`scenecast-genai`)
//! both build on these types.

pub mod artifact;
pub mod collaborators;
pub mod credential;
pub mod error;
pub mod failure;
pub mod generation;
pub mod job;
pub mod types;
