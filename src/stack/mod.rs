//! Federated Identity Stack
//!
//! Turns a flat environment into a dependency-ordered plan for a hosted
//! identity directory: user pool, login domain, federated providers, app
//! client and managed login branding, plus the parameters downstream
//! services read to find them.
//!
//! ## Pipeline
//!
//! - **Configuration**: [`StackConfig::resolve`] validates the environment
//! - **Providers**: [`select_providers`] enables Google, Facebook and OIDC
//!   from their credential pairs
//! - **Branding**: [`BrandingMerger`] layers overrides over the built-in theme
//! - **Graph**: [`IdentityGraphBuilder`] defines, links and orders the nodes
//! - **Export**: [`ParameterExporter`] derives `/{app}/Cognito/*` parameters
//!
//! ## Concurrency
//!
//! Synthesis is synchronous and holds no shared state. Two runs publishing
//! to the same store at once are not coordinated and may interleave; run one
//! deployment per target at a time.
//!
//! ## Example Usage
//!
//! ```ignore
//! use identity_stack::stack::{synthesize, BrandingInput, StackConfig};
//!
//! let config = StackConfig::from_env()?;
//! let synthesis = synthesize(&config, BrandingInput::default())?;
//!
//! println!("{}", synthesis.template().to_json()?);
//! ```

pub mod branding;
pub mod builder;
pub mod config;
pub mod exporter;
pub mod graph;
pub mod providers;
pub mod resources;
pub mod synth;
pub mod types;

pub use branding::{BrandingDocument, BrandingInput, BrandingMerger, MergedBranding, SettingsTree};
pub use builder::IdentityGraphBuilder;
pub use config::{DomainSpec, EnvSource, StackConfig};
pub use exporter::{ExportedParameter, ParameterExporter, ParameterTier, ParameterValue};
pub use graph::{FinalizedGraph, LinkedGraph, NodeState, ResourceGraph, ResourceNode};
pub use providers::{provider_catalog, select_providers, ProviderKind, ProviderSpec, ProviderStatus};
pub use synth::{synthesize, synthesize_with, StackTemplate, Synthesis};
pub use types::{AttributeRef, Capability, LogicalId, ResourceKind, StackError, StackResult};
