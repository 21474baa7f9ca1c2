//! Stack Synthesis
//!
//! Runs the whole pipeline in strict sequence: capabilities, provider
//! selection, branding merge, graph construction, parameter export. The first
//! failure aborts the run, so a [`Synthesis`] only exists for a fully valid
//! configuration.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use super::branding::{BrandingInput, BrandingMerger};
use super::builder::IdentityGraphBuilder;
use super::config::StackConfig;
use super::exporter::{ExportedParameter, ParameterExporter};
use super::graph::{FinalizedGraph, ResourceNode};
use super::providers::select_providers;
use super::types::{Capability, StackResult};

/// Suffix of the stack name
pub const STACK_SUFFIX: &str = "CognitoStack";

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct Synthesis {
    stack_name: String,
    capabilities: BTreeSet<Capability>,
    graph: FinalizedGraph,
    parameters: Vec<ExportedParameter>,
}

impl Synthesis {
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn graph(&self) -> &FinalizedGraph {
        &self.graph
    }

    pub fn parameters(&self) -> &[ExportedParameter] {
        &self.parameters
    }

    /// Document handed to the provisioning system
    pub fn template(&self) -> StackTemplate<'_> {
        StackTemplate {
            stack_name: &self.stack_name,
            capabilities: &self.capabilities,
            resources: self.graph.nodes(),
            parameters: &self.parameters,
        }
    }
}

/// Serializable view of a [`Synthesis`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTemplate<'a> {
    pub stack_name: &'a str,
    pub capabilities: &'a BTreeSet<Capability>,
    pub resources: &'a [ResourceNode],
    pub parameters: &'a [ExportedParameter],
}

impl StackTemplate<'_> {
    /// Pretty JSON; identical inputs render byte-identical output
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Synthesize with the built-in branding defaults
pub fn synthesize(config: &StackConfig, branding: BrandingInput) -> StackResult<Synthesis> {
    synthesize_with(config, &BrandingMerger::default(), branding)
}

pub fn synthesize_with(
    config: &StackConfig,
    merger: &BrandingMerger,
    branding: BrandingInput,
) -> StackResult<Synthesis> {
    let capabilities = config.capabilities();
    info!(
        app = %config.app_name,
        capabilities = ?capabilities,
        "Synthesizing identity stack"
    );

    let providers = select_providers(config);
    let branding = merger.merge(branding)?;
    let graph = IdentityGraphBuilder::new(config, &providers, &branding).build()?;
    let parameters = ParameterExporter::new(config).export(&graph)?;

    info!(
        app = %config.app_name,
        resources = graph.len(),
        parameters = parameters.len(),
        "Identity stack synthesized"
    );

    Ok(Synthesis {
        stack_name: format!("{}{}", config.app_name, STACK_SUFFIX),
        capabilities,
        graph,
        parameters,
    })
}
