//! Single-job video generation orchestration.
//!
//! [`gate::CredentialGate`] decides whether generation is permitted;
//! [`controller::GenerationJobController`] drives one job at a time
//! through submit -> poll -> resolve -> fetch and publishes its state.
//! Both talk to the outside world only through the collaborator traits in
//! [`scenecast_core::collaborators`].

pub mod config;
pub mod controller;
pub mod events;
pub mod fakes;
pub mod gate;
