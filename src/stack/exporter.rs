//! Parameter Export
//!
//! Derives the namespaced parameters other systems read to find the
//! provisioned identity stack. Keys are fixed per application so a re-export
//! overwrites the previous values.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::info;

use super::builder::{attributes, suffixes};
use super::config::{DomainSpec, StackConfig};
use super::graph::FinalizedGraph;
use super::resources::{ClientProperties, ResourceProperties};
use super::types::{AttributeRef, LogicalId, ResourceKind, StackError, StackResult};

/// Second segment of every parameter key
pub const NAMESPACE: &str = "Cognito";

/// Path appended to the base URL for the token endpoint
pub const TOKEN_PATH: &str = "/oauth2/token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterTier {
    Standard,
}

/// Value of an exported parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Literal(String),
    /// Resolved by the provisioning system once the node exists
    Attribute(AttributeRef),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Literal(value) => f.write_str(value),
            ParameterValue::Attribute(reference) => write!(f, "{}", reference),
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One namespaced key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedParameter {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,
    pub name: String,
    pub value: ParameterValue,
    pub description: String,
    pub tier: ParameterTier,
}

impl ExportedParameter {
    fn new(app_name: &str, logical_name: &str, what: &str, value: ParameterValue) -> Self {
        let depends_on = match &value {
            ParameterValue::Attribute(reference) => vec![reference.node.clone()],
            ParameterValue::Literal(_) => Vec::new(),
        };
        Self {
            logical_id: parameter_id(app_name, logical_name),
            kind: ResourceKind::Parameter,
            depends_on,
            name: parameter_key(app_name, logical_name),
            value,
            description: format!("Cognito {} for application {}", what, app_name),
            tier: ParameterTier::Standard,
        }
    }

    /// Value as the plain string written to the store
    pub fn string_value(&self) -> String {
        self.value.to_string()
    }
}

/// Logical id of the parameter node named `logical_name`
pub fn parameter_id(app_name: &str, logical_name: &str) -> LogicalId {
    LogicalId::derive(app_name, &format!("StringParameter{}{}", NAMESPACE, logical_name))
}

/// `/{app}/Cognito/{logicalName}`
pub fn parameter_key(app_name: &str, logical_name: &str) -> String {
    format!("/{}/{}/{}", app_name, NAMESPACE, logical_name)
}

pub struct ParameterExporter<'a> {
    config: &'a StackConfig,
}

impl<'a> ParameterExporter<'a> {
    pub fn new(config: &'a StackConfig) -> Self {
        Self { config }
    }

    /// Walk the finalized graph and emit the parameter set
    pub fn export(&self, graph: &FinalizedGraph) -> StackResult<Vec<ExportedParameter>> {
        let app = self.config.app_name.as_str();

        let pool_id = self.require(graph, "UserPoolId", suffixes::USER_POOL, ResourceKind::Directory)?;
        let client_id = self.require(graph, "UserPoolClientId", suffixes::CLIENT, ResourceKind::Client)?;
        let client = self.client_properties(graph, &client_id)?;
        let domain = self.domain_spec(graph, endpoint_name(&self.config.domain))?;

        let base_url = domain.base_url(&self.config.region);
        let endpoint = match domain {
            DomainSpec::Custom { .. } => ExportedParameter::new(
                app,
                endpoint_name(domain),
                "base URL",
                ParameterValue::Literal(base_url),
            ),
            DomainSpec::Managed { .. } => ExportedParameter::new(
                app,
                endpoint_name(domain),
                "OAuth2 token URL",
                ParameterValue::Literal(format!("{}{}", base_url, TOKEN_PATH)),
            ),
        };

        let parameters = vec![
            ExportedParameter::new(
                app,
                "UserPoolId",
                "user pool id",
                ParameterValue::Attribute(AttributeRef::new(&pool_id, attributes::USER_POOL_ID)),
            ),
            ExportedParameter::new(
                app,
                "UserPoolClientId",
                "user pool client id",
                ParameterValue::Attribute(AttributeRef::new(&client_id, attributes::CLIENT_ID)),
            ),
            ExportedParameter::new(
                app,
                "Region",
                "region",
                ParameterValue::Literal(self.config.region.clone()),
            ),
            ExportedParameter::new(
                app,
                "Callbacks",
                "callback URLs",
                ParameterValue::Literal(client.oauth.callback_urls.join(",")),
            ),
            ExportedParameter::new(
                app,
                "Logouts",
                "logout URLs",
                ParameterValue::Literal(client.oauth.logout_urls.join(",")),
            ),
            endpoint,
        ];

        info!(app = %app, count = parameters.len(), "Parameters exported");
        Ok(parameters)
    }

    /// Logical id of a node the exporter reads, which must be in the graph
    fn require(
        &self,
        graph: &FinalizedGraph,
        logical_name: &str,
        suffix: &str,
        kind: ResourceKind,
    ) -> StackResult<LogicalId> {
        let app = self.config.app_name.as_str();
        let id = LogicalId::derive(app, suffix);
        match graph.get(&id) {
            Some(node) if node.kind() == kind => Ok(id),
            _ => Err(StackError::dangling(&parameter_id(app, logical_name), &id)),
        }
    }

    fn client_properties<'g>(
        &self,
        graph: &'g FinalizedGraph,
        client_id: &LogicalId,
    ) -> StackResult<&'g ClientProperties> {
        match graph.get(client_id).map(|node| node.properties()) {
            Some(ResourceProperties::Client(props)) => Ok(props),
            _ => Err(StackError::UnknownNode(client_id.clone())),
        }
    }

    fn domain_spec<'g>(
        &self,
        graph: &'g FinalizedGraph,
        logical_name: &str,
    ) -> StackResult<&'g DomainSpec> {
        let app = self.config.app_name.as_str();
        let id = LogicalId::derive(app, suffixes::DOMAIN);
        match graph.get(&id).map(|node| node.properties()) {
            Some(ResourceProperties::Domain(props)) => Ok(&props.domain),
            _ => Err(StackError::dangling(&parameter_id(app, logical_name), &id)),
        }
    }
}

/// Custom domains publish their base URL, managed ones the token endpoint
fn endpoint_name(domain: &DomainSpec) -> &'static str {
    match domain {
        DomainSpec::Custom { .. } => "BaseUrl",
        DomainSpec::Managed { .. } => "OAuth2TokenUrl",
    }
}
