//! Identity Stack Library
//!
//! Synthesizes a federated identity stack from environment configuration and
//! publishes its discovery parameters.

pub mod parameter_store;
pub mod stack;

pub use parameter_store::{
    publish_parameters, FileParameterStore, MemoryParameterStore, ParameterStore, PublishSummary,
};
pub use stack::{synthesize, StackConfig, StackError, Synthesis};
