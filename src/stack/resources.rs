//! Resource Definitions
//!
//! Typed properties of each provisioned entity. Cross-node references are
//! carried as [`AttributeRef`]s so the graph can derive dependency edges from
//! them.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::branding::{AssetDeclaration, MergedBranding, SettingsTree};
use super::config::{DomainSpec, StackConfig};
use super::providers::{ProviderSpec, StandardAttribute};
use super::types::{AttributeRef, LogicalId, ResourceKind};

// ============================================================
// Directory (user pool)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationEmailStyle {
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVerification {
    pub email_subject: String,
    pub email_body: String,
    pub email_style: VerificationEmailStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignInAliases {
    pub username: bool,
    pub email: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MfaMode {
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MfaSettings {
    pub mode: MfaMode,
    pub otp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRecovery {
    EmailOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributePolicy {
    pub required: bool,
    pub mutable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    pub min_length: u8,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_digits: bool,
    pub require_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_lowercase: true,
            require_uppercase: true,
            require_digits: true,
            require_symbols: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryProperties {
    pub user_pool_name: String,
    pub self_sign_up_enabled: bool,
    pub sign_in_case_sensitive: bool,
    pub user_verification: UserVerification,
    pub sign_in_aliases: SignInAliases,
    pub auto_verify: BTreeSet<StandardAttribute>,
    pub keep_original: BTreeSet<StandardAttribute>,
    pub mfa: MfaSettings,
    pub account_recovery: AccountRecovery,
    pub standard_attributes: BTreeMap<StandardAttribute, AttributePolicy>,
    pub password_policy: PasswordPolicy,
}

impl DirectoryProperties {
    pub fn from_config(config: &StackConfig, name: &LogicalId) -> Self {
        let required = AttributePolicy {
            required: true,
            mutable: true,
        };
        let standard_attributes = BTreeMap::from([
            (StandardAttribute::Email, required),
            (StandardAttribute::GivenName, required),
            (StandardAttribute::FamilyName, required),
            (
                StandardAttribute::EmailVerified,
                AttributePolicy {
                    required: false,
                    mutable: true,
                },
            ),
        ]);

        Self {
            user_pool_name: name.to_string(),
            self_sign_up_enabled: true,
            sign_in_case_sensitive: false,
            user_verification: UserVerification {
                email_subject: config.verification.subject.clone(),
                email_body: config.verification.body.clone(),
                email_style: VerificationEmailStyle::Code,
            },
            sign_in_aliases: SignInAliases {
                username: false,
                email: true,
            },
            auto_verify: BTreeSet::from([StandardAttribute::Email]),
            keep_original: BTreeSet::from([StandardAttribute::Email]),
            mfa: MfaSettings {
                mode: MfaMode::Optional,
                otp: true,
            },
            account_recovery: AccountRecovery::EmailOnly,
            standard_attributes,
            password_policy: PasswordPolicy::default(),
        }
    }

    /// Attributes providers may map onto
    pub fn declared_attributes(&self) -> BTreeSet<StandardAttribute> {
        self.standard_attributes.keys().copied().collect()
    }
}

// ============================================================
// Domain, provider, client, branding
// ============================================================

/// Newer managed login pages
pub const MANAGED_LOGIN_VERSION: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProperties {
    pub user_pool_id: AttributeRef,
    #[serde(flatten)]
    pub domain: DomainSpec,
    pub managed_login_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProperties {
    pub user_pool_id: AttributeRef,
    pub provider_name: &'static str,
    #[serde(flatten)]
    pub spec: ProviderSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFlow {
    UserSrp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthFlow {
    AuthorizationCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthScope {
    Openid,
    Email,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSettings {
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
    pub flows: Vec<OAuthFlow>,
    pub scopes: Vec<OAuthScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProperties {
    pub user_pool_client_name: String,
    pub user_pool_id: AttributeRef,
    pub generate_secret: bool,
    pub prevent_user_existence_errors: bool,
    pub auth_flows: Vec<AuthFlow>,
    /// Native directory first, then federated providers in selection order
    pub supported_identity_providers: Vec<&'static str>,
    pub oauth: OAuthSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingProperties {
    pub user_pool_id: AttributeRef,
    pub client_id: AttributeRef,
    pub return_merged_resources: bool,
    pub settings: SettingsTree,
    pub assets: Vec<AssetDeclaration>,
}

impl BrandingProperties {
    pub fn new(user_pool_id: AttributeRef, client_id: AttributeRef, branding: &MergedBranding) -> Self {
        Self {
            user_pool_id,
            client_id,
            return_merged_resources: true,
            settings: branding.settings.clone(),
            assets: branding.assets.clone(),
        }
    }
}

/// Properties of a node, one variant per resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceProperties {
    Directory(DirectoryProperties),
    Domain(DomainProperties),
    Provider(ProviderProperties),
    Client(ClientProperties),
    Branding(BrandingProperties),
}

impl ResourceProperties {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceProperties::Directory(_) => ResourceKind::Directory,
            ResourceProperties::Domain(_) => ResourceKind::Domain,
            ResourceProperties::Provider(_) => ResourceKind::Provider,
            ResourceProperties::Client(_) => ResourceKind::Client,
            ResourceProperties::Branding(_) => ResourceKind::Branding,
        }
    }

    /// Nodes referenced through attribute tokens, in field order
    pub fn references(&self) -> Vec<LogicalId> {
        let refs: Vec<&AttributeRef> = match self {
            ResourceProperties::Directory(_) => vec![],
            ResourceProperties::Domain(p) => vec![&p.user_pool_id],
            ResourceProperties::Provider(p) => vec![&p.user_pool_id],
            ResourceProperties::Client(p) => vec![&p.user_pool_id],
            ResourceProperties::Branding(p) => vec![&p.user_pool_id, &p.client_id],
        };
        refs.into_iter().map(|r| r.node.clone()).collect()
    }
}
