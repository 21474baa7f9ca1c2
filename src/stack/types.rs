//! Identity Stack Types
//!
//! Identifiers, cross-node references and the error taxonomy shared by every
//! synthesis stage.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Stable logical identifier of a resource node
///
/// Always derived from the application name plus a fixed per-kind suffix so
/// repeated builds produce identical identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive an identifier from the application name and a kind suffix
    pub fn derive(app_name: &str, suffix: &str) -> Self {
        Self(format!("{app_name}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an attribute that only exists once the node is provisioned
///
/// Serialized as the token `${LogicalId.Attribute}`, which the provisioning
/// system substitutes with the live value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub node: LogicalId,
    pub attribute: &'static str,
}

impl AttributeRef {
    pub fn new(node: &LogicalId, attribute: &'static str) -> Self {
        Self {
            node: node.clone(),
            attribute,
        }
    }

    /// Render the reference token
    pub fn token(&self) -> String {
        format!("${{{}.{}}}", self.node, self.attribute)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl Serialize for AttributeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token())
    }
}

/// OAuth client secret of a federated provider
///
/// Serialized as-is into the plan (the provisioning system needs it) but
/// never printed by `Debug`, so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(***)")
    }
}

/// Kind tag of a provisioned entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Directory,
    Domain,
    Provider,
    Client,
    Branding,
    Parameter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Directory => write!(f, "directory"),
            ResourceKind::Domain => write!(f, "domain"),
            ResourceKind::Provider => write!(f, "provider"),
            ResourceKind::Client => write!(f, "client"),
            ResourceKind::Branding => write!(f, "branding"),
            ResourceKind::Parameter => write!(f, "parameter"),
        }
    }
}

/// Feature set a deployment ends up with, derived from its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    NativeOnly,
    WithGoogle,
    WithFacebook,
    WithOidc,
    WithCustomDomain,
    WithManagedDomain,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::NativeOnly => write!(f, "nativeOnly"),
            Capability::WithGoogle => write!(f, "withGoogle"),
            Capability::WithFacebook => write!(f, "withFacebook"),
            Capability::WithOidc => write!(f, "withOidc"),
            Capability::WithCustomDomain => write!(f, "withCustomDomain"),
            Capability::WithManagedDomain => write!(f, "withManagedDomain"),
        }
    }
}

/// Errors that abort a synthesis run
///
/// Every variant is fatal: nothing is handed to the provisioning system or
/// the parameter store once one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// A required input is absent or empty
    #[error("Missing configuration: {key}")]
    MissingConfiguration { key: String },

    /// Inputs contradict each other (domain modes, duplicate assets)
    #[error("Configuration conflict: {message}")]
    ConfigurationConflict { message: String },

    /// A node depends on a logical id that is not in the graph
    #[error("Dangling reference: {node} depends on {reference}, which is not defined")]
    DanglingReference {
        node: LogicalId,
        reference: LogicalId,
    },

    /// An edge was attached to a node that was never defined
    #[error("Unknown node: {0}")]
    UnknownNode(LogicalId),

    /// Two nodes share a logical id
    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(LogicalId),

    /// The dependency edges cannot be ordered
    #[error("Dependency cycle between: {}", .nodes.join(", "))]
    DependencyCycle { nodes: Vec<String> },

    /// A provider maps onto an attribute the directory does not declare
    #[error("Invalid attribute mapping on {provider}: {attribute} is not a declared directory attribute")]
    InvalidAttributeMapping { provider: String, attribute: String },

    /// The branding override document could not be interpreted
    #[error("Invalid branding document: {0}")]
    InvalidBranding(String),
}

impl StackError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingConfiguration { key: key.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            message: message.into(),
        }
    }

    pub fn dangling(node: &LogicalId, reference: &LogicalId) -> Self {
        Self::DanglingReference {
            node: node.clone(),
            reference: reference.clone(),
        }
    }
}

pub type StackResult<T> = Result<T, StackError>;
