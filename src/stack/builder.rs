//! Identity Graph Builder
//!
//! Composes directory, domain, providers, app client and branding into one
//! dependency-ordered plan.

use tracing::info;

use super::branding::MergedBranding;
use super::config::StackConfig;
use super::graph::{FinalizedGraph, ResourceGraph, ResourceNode};
use super::providers::{ProviderKind, ProviderSpec};
use super::resources::{
    AuthFlow, BrandingProperties, ClientProperties, DirectoryProperties, DomainProperties,
    OAuthFlow, OAuthScope, OAuthSettings, ProviderProperties, ResourceProperties,
    MANAGED_LOGIN_VERSION,
};
use super::types::{AttributeRef, LogicalId, StackResult};

/// Fixed per-kind suffixes appended to the application name
pub mod suffixes {
    pub const USER_POOL: &str = "UserPool";
    pub const DOMAIN: &str = "CognitoDomain";
    pub const CLIENT: &str = "UserPoolClient";
    pub const BRANDING: &str = "ManagedLoginBranding";
    pub const PROVIDER_PREFIX: &str = "IdentityProvider";
}

/// Attributes exposed by provisioned nodes
pub mod attributes {
    pub const USER_POOL_ID: &str = "UserPoolId";
    pub const CLIENT_ID: &str = "ClientId";
}

/// Logical id of the provider node for `kind`
pub fn provider_id(app_name: &str, kind: ProviderKind) -> LogicalId {
    LogicalId::derive(
        app_name,
        &format!("{}{}", suffixes::PROVIDER_PREFIX, kind.provider_name()),
    )
}

pub struct IdentityGraphBuilder<'a> {
    config: &'a StackConfig,
    providers: &'a [ProviderSpec],
    branding: &'a MergedBranding,
}

impl<'a> IdentityGraphBuilder<'a> {
    pub fn new(
        config: &'a StackConfig,
        providers: &'a [ProviderSpec],
        branding: &'a MergedBranding,
    ) -> Self {
        Self {
            config,
            providers,
            branding,
        }
    }

    /// Build, link and finalize the graph
    pub fn build(&self) -> StackResult<FinalizedGraph> {
        let app = self.config.app_name.as_str();
        let mut graph = ResourceGraph::new();

        // Directory
        let pool_id = LogicalId::derive(app, suffixes::USER_POOL);
        let directory = DirectoryProperties::from_config(self.config, &pool_id);
        let declared = directory.declared_attributes();
        graph.define(ResourceNode::new(
            pool_id.clone(),
            ResourceProperties::Directory(directory),
        ))?;
        let pool_ref = AttributeRef::new(&pool_id, attributes::USER_POOL_ID);

        // Domain
        graph.define(ResourceNode::new(
            LogicalId::derive(app, suffixes::DOMAIN),
            ResourceProperties::Domain(DomainProperties {
                user_pool_id: pool_ref.clone(),
                domain: self.config.domain.clone(),
                managed_login_version: MANAGED_LOGIN_VERSION,
            }),
        ))?;

        // Federated providers; the native directory has no node of its own
        let mut provider_ids = Vec::new();
        let mut sign_in_sources = vec![ProviderKind::Native.provider_name()];
        for spec in self.providers {
            if spec.kind() == ProviderKind::Native {
                continue;
            }
            spec.validate_mapping(&declared)?;

            let id = graph.define(ResourceNode::new(
                provider_id(app, spec.kind()),
                ResourceProperties::Provider(ProviderProperties {
                    user_pool_id: pool_ref.clone(),
                    provider_name: spec.provider_name(),
                    spec: spec.clone(),
                }),
            ))?;
            sign_in_sources.push(spec.provider_name());
            provider_ids.push(id);
        }

        // App client
        let client_id = LogicalId::derive(app, suffixes::CLIENT);
        graph.define(ResourceNode::new(
            client_id.clone(),
            ResourceProperties::Client(ClientProperties {
                user_pool_client_name: client_id.to_string(),
                user_pool_id: pool_ref.clone(),
                generate_secret: false,
                prevent_user_existence_errors: true,
                auth_flows: vec![AuthFlow::UserSrp],
                supported_identity_providers: sign_in_sources,
                oauth: OAuthSettings {
                    callback_urls: self.config.callback_urls.clone(),
                    logout_urls: self.config.logout_urls.clone(),
                    flows: vec![OAuthFlow::AuthorizationCode],
                    scopes: vec![OAuthScope::Openid, OAuthScope::Email, OAuthScope::Profile],
                },
            }),
        ))?;

        // Supporting a provider does not imply ordering to the provisioning
        // system, so the client waits on every provider explicitly
        for provider in &provider_ids {
            graph.add_dependency(&client_id, provider)?;
        }

        // Branding
        graph.define(ResourceNode::new(
            LogicalId::derive(app, suffixes::BRANDING),
            ResourceProperties::Branding(BrandingProperties::new(
                pool_ref,
                AttributeRef::new(&client_id, attributes::CLIENT_ID),
                self.branding,
            )),
        ))?;

        info!(
            app = %app,
            nodes = graph.len(),
            providers = provider_ids.len(),
            "Identity graph defined"
        );

        graph.link()?.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::branding::{BrandingInput, BrandingMerger};
    use crate::stack::config::keys;
    use crate::stack::config::tests::{base_env, with};
    use crate::stack::graph::NodeState;
    use crate::stack::providers::select_providers;
    use crate::stack::types::ResourceKind;

    fn build(env: &std::collections::BTreeMap<String, String>) -> FinalizedGraph {
        let config = StackConfig::resolve(env).unwrap();
        let providers = select_providers(&config);
        let branding = BrandingMerger::default()
            .merge(BrandingInput::default())
            .unwrap();
        IdentityGraphBuilder::new(&config, &providers, &branding)
            .build()
            .unwrap()
    }

    fn client(graph: &FinalizedGraph) -> (&ResourceNode, &ClientProperties) {
        let node = graph.of_kind(ResourceKind::Client).next().unwrap();
        match node.properties() {
            ResourceProperties::Client(props) => (node, props),
            other => panic!("unexpected properties {other:?}"),
        }
    }

    fn all_providers_env() -> std::collections::BTreeMap<String, String> {
        with(
            base_env(),
            &[
                (keys::GOOGLE_CLIENT_ID, "g-id"),
                (keys::GOOGLE_CLIENT_SECRET, "g-secret"),
                (keys::FACEBOOK_CLIENT_ID, "fb-id"),
                (keys::FACEBOOK_CLIENT_SECRET, "fb-secret"),
                (keys::MICROSOFT_CLIENT_ID, "ms-id"),
                (keys::MICROSOFT_CLIENT_SECRET, "ms-secret"),
            ],
        )
    }

    #[test]
    fn test_native_only_client() {
        let graph = build(&base_env());
        let (node, props) = client(&graph);

        assert_eq!(graph.count(ResourceKind::Provider), 0);
        assert_eq!(props.supported_identity_providers, vec!["COGNITO"]);
        assert_eq!(node.depends_on(), &[LogicalId::derive("Shop", "UserPool")]);
    }

    #[test]
    fn test_client_depends_on_every_provider() {
        let graph = build(&all_providers_env());
        let (node, props) = client(&graph);

        assert_eq!(graph.count(ResourceKind::Provider), 3);
        for provider in graph.of_kind(ResourceKind::Provider) {
            assert!(node.depends_on().contains(provider.logical_id()));
        }
        assert_eq!(
            props.supported_identity_providers,
            vec!["COGNITO", "Google", "Facebook", "Microsoft"]
        );
    }

    #[test]
    fn test_dependency_order() {
        let graph = build(&all_providers_env());
        let ids: Vec<_> = graph.nodes().iter().map(|n| n.logical_id().as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "ShopUserPool",
                "ShopCognitoDomain",
                "ShopIdentityProviderGoogle",
                "ShopIdentityProviderFacebook",
                "ShopIdentityProviderMicrosoft",
                "ShopUserPoolClient",
                "ShopManagedLoginBranding",
            ]
        );
        assert!(graph.nodes().iter().all(|n| n.state() == NodeState::Finalized));

        let branding = graph.get(&LogicalId::derive("Shop", "ManagedLoginBranding")).unwrap();
        assert_eq!(
            branding.depends_on(),
            &[
                LogicalId::derive("Shop", "UserPool"),
                LogicalId::derive("Shop", "UserPoolClient"),
            ]
        );
    }

    #[test]
    fn test_native_spec_is_not_a_node() {
        let config = StackConfig::resolve(&base_env()).unwrap();
        let branding = BrandingMerger::default()
            .merge(BrandingInput::default())
            .unwrap();
        let providers = vec![ProviderSpec::Native];
        let graph = IdentityGraphBuilder::new(&config, &providers, &branding)
            .build()
            .unwrap();

        assert_eq!(graph.count(ResourceKind::Provider), 0);
        assert_eq!(client(&graph).1.supported_identity_providers, vec!["COGNITO"]);
    }

    #[test]
    fn test_builds_are_byte_identical() {
        let first = serde_json::to_string(build(&all_providers_env()).nodes()).unwrap();
        let second = serde_json::to_string(build(&all_providers_env()).nodes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_provider_node_serialization() {
        let graph = build(&with(
            base_env(),
            &[
                (keys::GOOGLE_CLIENT_ID, "g-id"),
                (keys::GOOGLE_CLIENT_SECRET, "g-secret"),
            ],
        ));
        let node = graph.get(&provider_id("Shop", ProviderKind::Google)).unwrap();
        let value = serde_json::to_value(node).unwrap();

        assert_eq!(value["kind"], "provider");
        assert_eq!(value["dependsOn"], serde_json::json!(["ShopUserPool"]));
        assert_eq!(value["properties"]["userPoolId"], "${ShopUserPool.UserPoolId}");
        assert_eq!(value["properties"]["providerName"], "Google");
        assert_eq!(value["properties"]["providerType"], "google");
        assert_eq!(value["properties"]["scopes"], serde_json::json!(["email", "profile"]));
    }
}
