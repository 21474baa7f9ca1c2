//! Identity Provider Selection
//!
//! Decides which federated providers a deployment enables and builds their
//! fixed scope lists and attribute-mapping contracts.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use super::config::{keys, OidcSettings, ProviderCredentials, StackConfig};
use super::types::{ClientSecret, StackError, StackResult};

/// Supported identity provider kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The directory's own username/password sign-in
    Native,
    Google,
    Facebook,
    /// Generic OIDC provider (Microsoft Entra ID)
    Oidc,
}

impl ProviderKind {
    /// Federated kinds in selection order
    pub const FEDERATED: [ProviderKind; 3] =
        [ProviderKind::Google, ProviderKind::Facebook, ProviderKind::Oidc];

    /// Name under which the client lists this provider as a sign-in source
    pub fn provider_name(&self) -> &'static str {
        match self {
            ProviderKind::Native => "COGNITO",
            ProviderKind::Google => "Google",
            ProviderKind::Facebook => "Facebook",
            ProviderKind::Oidc => "Microsoft",
        }
    }

    /// Environment keys holding this provider's credentials
    pub fn credential_keys(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Native => &[],
            ProviderKind::Google => &[keys::GOOGLE_CLIENT_ID, keys::GOOGLE_CLIENT_SECRET],
            ProviderKind::Facebook => &[keys::FACEBOOK_CLIENT_ID, keys::FACEBOOK_CLIENT_SECRET],
            ProviderKind::Oidc => &[keys::MICROSOFT_CLIENT_ID, keys::MICROSOFT_CLIENT_SECRET],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Native => write!(f, "native"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Facebook => write!(f, "facebook"),
            ProviderKind::Oidc => write!(f, "oidc"),
        }
    }
}

/// Standard attributes a directory can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardAttribute {
    Email,
    GivenName,
    FamilyName,
    EmailVerified,
}

impl fmt::Display for StandardAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StandardAttribute::Email => write!(f, "email"),
            StandardAttribute::GivenName => write!(f, "given_name"),
            StandardAttribute::FamilyName => write!(f, "family_name"),
            StandardAttribute::EmailVerified => write!(f, "email_verified"),
        }
    }
}

/// Directory attribute → external claim supplying it
pub type AttributeMapping = BTreeMap<StandardAttribute, &'static str>;

// ============================================================
// Provider policy constants
// ============================================================

pub const GOOGLE_SCOPES: &[&str] = &["email", "profile"];
pub const GOOGLE_ATTRIBUTES: &[(StandardAttribute, &str)] = &[
    (StandardAttribute::Email, "email"),
    (StandardAttribute::GivenName, "given_name"),
    (StandardAttribute::FamilyName, "family_name"),
    (StandardAttribute::EmailVerified, "email_verified"),
];

pub const FACEBOOK_SCOPES: &[&str] = &["public_profile", "email"];
pub const FACEBOOK_ATTRIBUTES: &[(StandardAttribute, &str)] = &[
    (StandardAttribute::Email, "email"),
    (StandardAttribute::GivenName, "first_name"),
    (StandardAttribute::FamilyName, "last_name"),
];

pub const OIDC_SCOPES: &[&str] = &["openid", "email", "profile"];
pub const OIDC_ATTRIBUTES: &[(StandardAttribute, &str)] = &[
    (StandardAttribute::Email, "email"),
    (StandardAttribute::GivenName, "given_name"),
    (StandardAttribute::FamilyName, "family_name"),
];

/// Credentials and contract shared by every federated provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProvider {
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub scopes: Vec<&'static str>,
    pub attribute_mapping: AttributeMapping,
}

impl FederatedProvider {
    fn new(
        credentials: &ProviderCredentials,
        scopes: &[&'static str],
        attributes: &[(StandardAttribute, &'static str)],
    ) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scopes: scopes.to_vec(),
            attribute_mapping: attributes.iter().copied().collect(),
        }
    }
}

/// A sign-in source of the app client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "providerType", rename_all = "camelCase")]
pub enum ProviderSpec {
    Native,
    Google(FederatedProvider),
    Facebook(FederatedProvider),
    Oidc(OidcProvider),
}

/// Generic OIDC provider: the federated contract plus its issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcProvider {
    #[serde(flatten)]
    pub provider: FederatedProvider,
    pub issuer_url: String,
}

impl ProviderSpec {
    pub fn google(credentials: &ProviderCredentials) -> Self {
        Self::Google(FederatedProvider::new(credentials, GOOGLE_SCOPES, GOOGLE_ATTRIBUTES))
    }

    pub fn facebook(credentials: &ProviderCredentials) -> Self {
        Self::Facebook(FederatedProvider::new(credentials, FACEBOOK_SCOPES, FACEBOOK_ATTRIBUTES))
    }

    pub fn oidc(settings: &OidcSettings) -> Self {
        Self::Oidc(OidcProvider {
            provider: FederatedProvider::new(&settings.credentials, OIDC_SCOPES, OIDC_ATTRIBUTES),
            issuer_url: settings.issuer_url.clone(),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSpec::Native => ProviderKind::Native,
            ProviderSpec::Google(_) => ProviderKind::Google,
            ProviderSpec::Facebook(_) => ProviderKind::Facebook,
            ProviderSpec::Oidc(_) => ProviderKind::Oidc,
        }
    }

    /// Federated settings, `None` for the native directory
    pub fn federated(&self) -> Option<&FederatedProvider> {
        match self {
            ProviderSpec::Native => None,
            ProviderSpec::Google(provider) | ProviderSpec::Facebook(provider) => Some(provider),
            ProviderSpec::Oidc(oidc) => Some(&oidc.provider),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.kind().provider_name()
    }

    /// Every mapped attribute must be declared by the directory
    pub fn validate_mapping(&self, declared: &BTreeSet<StandardAttribute>) -> StackResult<()> {
        let Some(provider) = self.federated() else {
            return Ok(());
        };

        match provider
            .attribute_mapping
            .keys()
            .find(|attribute| !declared.contains(*attribute))
        {
            Some(attribute) => Err(StackError::InvalidAttributeMapping {
                provider: self.provider_name().to_string(),
                attribute: attribute.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Whether a known provider kind is enabled for this deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProviderStatus {
    Active,
    Inactive { missing: Vec<&'static str> },
}

/// Status entry of the provider catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAvailability {
    pub kind: ProviderKind,
    #[serde(flatten)]
    pub status: ProviderStatus,
}

/// Enabled federated providers in deterministic order (Google, Facebook, OIDC)
pub fn select_providers(config: &StackConfig) -> Vec<ProviderSpec> {
    let mut providers = Vec::new();

    if let Some(credentials) = &config.google {
        providers.push(ProviderSpec::google(credentials));
    }
    if let Some(credentials) = &config.facebook {
        providers.push(ProviderSpec::facebook(credentials));
    }
    if let Some(settings) = &config.oidc {
        providers.push(ProviderSpec::oidc(settings));
    }

    for provider in &providers {
        debug!(
            provider = %provider.kind(),
            scopes = ?provider.federated().map(|p| &p.scopes),
            "Provider enabled"
        );
    }
    info!(count = providers.len(), "Federated providers selected");

    providers
}

/// Every known federated kind, active or not
pub fn provider_catalog(config: &StackConfig) -> Vec<ProviderAvailability> {
    ProviderKind::FEDERATED
        .iter()
        .map(|&kind| {
            let enabled = match kind {
                ProviderKind::Google => config.google.is_some(),
                ProviderKind::Facebook => config.facebook.is_some(),
                ProviderKind::Oidc => config.oidc.is_some(),
                ProviderKind::Native => true,
            };
            let status = if enabled {
                ProviderStatus::Active
            } else {
                ProviderStatus::Inactive {
                    missing: kind.credential_keys().to_vec(),
                }
            };
            ProviderAvailability { kind, status }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::config::tests::{base_env, with};

    fn all_declared() -> BTreeSet<StandardAttribute> {
        [
            StandardAttribute::Email,
            StandardAttribute::GivenName,
            StandardAttribute::FamilyName,
            StandardAttribute::EmailVerified,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_no_credentials_selects_nothing() {
        let config = StackConfig::resolve(&base_env()).unwrap();
        assert!(select_providers(&config).is_empty());
    }

    #[test]
    fn test_selection_order_is_fixed() {
        let env = with(
            base_env(),
            &[
                (keys::MICROSOFT_CLIENT_ID, "ms-id"),
                (keys::MICROSOFT_CLIENT_SECRET, "ms-secret"),
                (keys::FACEBOOK_CLIENT_ID, "fb-id"),
                (keys::FACEBOOK_CLIENT_SECRET, "fb-secret"),
                (keys::GOOGLE_CLIENT_ID, "g-id"),
                (keys::GOOGLE_CLIENT_SECRET, "g-secret"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        let kinds: Vec<_> = select_providers(&config).iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![ProviderKind::Google, ProviderKind::Facebook, ProviderKind::Oidc]
        );
    }

    #[test]
    fn test_facebook_contract() {
        let env = with(
            base_env(),
            &[
                (keys::FACEBOOK_CLIENT_ID, "fb-id"),
                (keys::FACEBOOK_CLIENT_SECRET, "fb-secret"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        let providers = select_providers(&config);
        let facebook = providers[0].federated().unwrap();

        assert_eq!(facebook.client_id, "fb-id");
        assert_eq!(facebook.scopes, vec!["public_profile", "email"]);
        assert_eq!(
            facebook.attribute_mapping.get(&StandardAttribute::GivenName),
            Some(&"first_name")
        );
        assert_eq!(
            facebook.attribute_mapping.get(&StandardAttribute::FamilyName),
            Some(&"last_name")
        );
        assert!(providers[0].validate_mapping(&all_declared()).is_ok());
    }

    #[test]
    fn test_mapping_outside_declared_attributes_is_rejected() {
        let credentials = ProviderCredentials {
            client_id: "g-id".to_string(),
            client_secret: ClientSecret::new("g-secret"),
        };
        let google = ProviderSpec::google(&credentials);
        let mut declared = all_declared();
        declared.remove(&StandardAttribute::EmailVerified);

        assert_eq!(
            google.validate_mapping(&declared).unwrap_err(),
            StackError::InvalidAttributeMapping {
                provider: "Google".to_string(),
                attribute: "email_verified".to_string(),
            }
        );
        assert!(ProviderSpec::Native.validate_mapping(&BTreeSet::new()).is_ok());
    }

    #[test]
    fn test_catalog_reports_inactive_oidc() {
        let env = with(
            base_env(),
            &[
                (keys::GOOGLE_CLIENT_ID, "g-id"),
                (keys::GOOGLE_CLIENT_SECRET, "g-secret"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        let catalog = provider_catalog(&config);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].status, ProviderStatus::Active);
        assert_eq!(
            catalog[2],
            ProviderAvailability {
                kind: ProviderKind::Oidc,
                status: ProviderStatus::Inactive {
                    missing: vec![keys::MICROSOFT_CLIENT_ID, keys::MICROSOFT_CLIENT_SECRET],
                },
            }
        );
    }

    #[test]
    fn test_oidc_serializes_issuer_and_type() {
        let env = with(
            base_env(),
            &[
                (keys::MICROSOFT_CLIENT_ID, "ms-id"),
                (keys::MICROSOFT_CLIENT_SECRET, "ms-secret"),
                (keys::OIDC_ISSUER_URL, "https://issuer.example/v2.0"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        let value = serde_json::to_value(&select_providers(&config)[0]).unwrap();

        assert_eq!(value["providerType"], "oidc");
        assert_eq!(value["issuerUrl"], "https://issuer.example/v2.0");
        assert_eq!(value["clientId"], "ms-id");
        assert_eq!(value["attributeMapping"]["email"], "email");
    }
}
