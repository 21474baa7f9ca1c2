//! Stack Configuration
//!
//! Resolves raw environment values into a validated [`StackConfig`].
//! Resolution is fail-fast: the first absent required key aborts with
//! [`StackError::MissingConfiguration`] naming that key.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use super::types::{Capability, ClientSecret, StackError, StackResult};

/// Environment keys read by the resolver
pub mod keys {
    pub const APP_NAME: &str = "APP_NAME";
    pub const REGION: &str = "REGION_AWS";
    pub const VERIFICATION_SUBJECT: &str = "VERIFICATION_SUBJECT";
    pub const VERIFICATION_BODY: &str = "VERIFICATION_BODY";

    pub const CUSTOM_DOMAIN: &str = "COGNITO_CUSTOM_DOMAIN";
    pub const CERTIFICATE_ARN: &str = "ARN_COGNITO_CERTIFICATE";
    pub const MANAGED_DOMAIN: &str = "COGNITO_DOMAIN";

    pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
    pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
    pub const FACEBOOK_CLIENT_ID: &str = "FACEBOOK_CLIENT_ID";
    pub const FACEBOOK_CLIENT_SECRET: &str = "FACEBOOK_CLIENT_SECRET";
    pub const MICROSOFT_CLIENT_ID: &str = "MICROSOFT_CLIENT_ID";
    pub const MICROSOFT_CLIENT_SECRET: &str = "MICROSOFT_CLIENT_SECRET";
    pub const OIDC_ISSUER_URL: &str = "OIDC_ISSUER_URL";

    pub const CALLBACK_URLS: &str = "CALLBACK_URLS";
    pub const LOGOUT_URLS: &str = "LOGOUT_URLS";
}

/// Issuer used by the generic OIDC provider when none is configured
pub const DEFAULT_OIDC_ISSUER: &str = "https://login.microsoftonline.com/common/v2.0";

/// Lookup of raw configuration values by key
pub trait EnvSource {
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl EnvSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// Client id/secret pair of a federated provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: ClientSecret,
}

/// Credentials plus issuer of the generic OIDC provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcSettings {
    pub credentials: ProviderCredentials,
    pub issuer_url: String,
}

/// Subject and body of the sign-up verification email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMessage {
    pub subject: String,
    pub body: String,
}

/// Hosted login domain, either deployer-owned or a managed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "domainMode", rename_all = "camelCase")]
pub enum DomainSpec {
    #[serde(rename_all = "camelCase")]
    Custom {
        domain_name: String,
        certificate_arn: String,
    },
    #[serde(rename_all = "camelCase")]
    Managed { domain_prefix: String },
}

impl DomainSpec {
    /// Base URL of the hosted login pages
    pub fn base_url(&self, region: &str) -> String {
        match self {
            DomainSpec::Custom { domain_name, .. } => format!("https://{}", domain_name),
            DomainSpec::Managed { domain_prefix } => {
                format!("https://{}.auth.{}.amazoncognito.com", domain_prefix, region)
            }
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            DomainSpec::Custom { .. } => Capability::WithCustomDomain,
            DomainSpec::Managed { .. } => Capability::WithManagedDomain,
        }
    }
}

/// Validated, immutable stack configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub app_name: String,
    pub region: String,
    pub verification: VerificationMessage,
    pub domain: DomainSpec,
    pub google: Option<ProviderCredentials>,
    pub facebook: Option<ProviderCredentials>,
    pub oidc: Option<OidcSettings>,
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
}

impl StackConfig {
    /// Resolve a configuration from raw key/value input
    pub fn resolve<E: EnvSource + ?Sized>(env: &E) -> StackResult<Self> {
        let app_name = required(env, keys::APP_NAME)?;
        let region = required(env, keys::REGION)?;
        let verification = VerificationMessage {
            subject: required(env, keys::VERIFICATION_SUBJECT)?,
            body: required(env, keys::VERIFICATION_BODY)?,
        };
        let domain = resolve_domain(env)?;

        let google = credential_pair(env, keys::GOOGLE_CLIENT_ID, keys::GOOGLE_CLIENT_SECRET)?;
        let facebook =
            credential_pair(env, keys::FACEBOOK_CLIENT_ID, keys::FACEBOOK_CLIENT_SECRET)?;
        let oidc = credential_pair(env, keys::MICROSOFT_CLIENT_ID, keys::MICROSOFT_CLIENT_SECRET)?
            .map(|credentials| OidcSettings {
                credentials,
                issuer_url: optional(env, keys::OIDC_ISSUER_URL)
                    .unwrap_or_else(|| DEFAULT_OIDC_ISSUER.to_string()),
            });

        let callback_urls = split_list(&required(env, keys::CALLBACK_URLS)?);
        let logout_urls = split_list(&required(env, keys::LOGOUT_URLS)?);

        let config = Self {
            app_name,
            region,
            verification,
            domain,
            google,
            facebook,
            oidc,
            callback_urls,
            logout_urls,
        };

        debug!(
            app = %config.app_name,
            region = %config.region,
            callbacks = config.callback_urls.len(),
            logouts = config.logout_urls.len(),
            "Stack configuration resolved"
        );

        Ok(config)
    }

    /// Resolve from the current process environment
    pub fn from_env() -> StackResult<Self> {
        let vars: BTreeMap<String, String> = std::env::vars().collect();
        Self::resolve(&vars)
    }

    /// Capability set implied by this configuration
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        let mut capabilities = BTreeSet::new();
        if self.google.is_some() {
            capabilities.insert(Capability::WithGoogle);
        }
        if self.facebook.is_some() {
            capabilities.insert(Capability::WithFacebook);
        }
        if self.oidc.is_some() {
            capabilities.insert(Capability::WithOidc);
        }
        if capabilities.is_empty() {
            capabilities.insert(Capability::NativeOnly);
        }
        capabilities.insert(self.domain.capability());
        capabilities
    }
}

fn optional<E: EnvSource + ?Sized>(env: &E, key: &str) -> Option<String> {
    env.lookup(key)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required<E: EnvSource + ?Sized>(env: &E, key: &str) -> StackResult<String> {
    optional(env, key).ok_or_else(|| StackError::missing(key))
}

/// Both halves present enables the provider; exactly one half is an error
fn credential_pair<E: EnvSource + ?Sized>(
    env: &E,
    id_key: &str,
    secret_key: &str,
) -> StackResult<Option<ProviderCredentials>> {
    match (optional(env, id_key), optional(env, secret_key)) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(StackError::missing(secret_key)),
        (None, Some(_)) => Err(StackError::missing(id_key)),
        (Some(client_id), Some(secret)) => Ok(Some(ProviderCredentials {
            client_id,
            client_secret: ClientSecret::new(secret),
        })),
    }
}

fn resolve_domain<E: EnvSource + ?Sized>(env: &E) -> StackResult<DomainSpec> {
    let custom = optional(env, keys::CUSTOM_DOMAIN);
    let certificate = optional(env, keys::CERTIFICATE_ARN);
    let managed = optional(env, keys::MANAGED_DOMAIN);

    match (custom, certificate, managed) {
        (None, None, None) => Err(StackError::conflict(format!(
            "no domain mode configured: set {} and {}, or {}",
            keys::CUSTOM_DOMAIN,
            keys::CERTIFICATE_ARN,
            keys::MANAGED_DOMAIN
        ))),
        (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(StackError::conflict(format!(
            "custom domain ({}/{}) and managed domain ({}) are mutually exclusive",
            keys::CUSTOM_DOMAIN,
            keys::CERTIFICATE_ARN,
            keys::MANAGED_DOMAIN
        ))),
        (Some(domain_name), Some(certificate_arn), None) => Ok(DomainSpec::Custom {
            domain_name,
            certificate_arn,
        }),
        (Some(_), None, None) => Err(StackError::missing(keys::CERTIFICATE_ARN)),
        (None, Some(_), None) => Err(StackError::missing(keys::CUSTOM_DOMAIN)),
        (None, None, Some(domain_prefix)) => Ok(DomainSpec::Managed { domain_prefix }),
    }
}

/// Split a comma-separated list verbatim (no trimming, no dedup)
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn base_env() -> BTreeMap<String, String> {
        [
            (keys::APP_NAME, "Shop"),
            (keys::REGION, "us-east-1"),
            (keys::VERIFICATION_SUBJECT, "Verify your account"),
            (keys::VERIFICATION_BODY, "Your code is {####}"),
            (keys::MANAGED_DOMAIN, "shop-login"),
            (keys::CALLBACK_URLS, "https://shop.example/callback,http://localhost:3000/callback"),
            (keys::LOGOUT_URLS, "https://shop.example/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    pub(crate) fn with(
        mut env: BTreeMap<String, String>,
        pairs: &[(&str, &str)],
    ) -> BTreeMap<String, String> {
        for (k, v) in pairs {
            env.insert(k.to_string(), v.to_string());
        }
        env
    }

    fn without(mut env: BTreeMap<String, String>, key: &str) -> BTreeMap<String, String> {
        env.remove(key);
        env
    }

    #[test]
    fn test_resolve_is_pure() {
        let env = base_env();
        let first = StackConfig::resolve(&env).unwrap();
        let second = StackConfig::resolve(&env).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.app_name, "Shop");
        assert!(first.google.is_none());
    }

    /// `base_env` switched to a custom domain with its certificate
    fn custom_env() -> BTreeMap<String, String> {
        with(
            without(base_env(), keys::MANAGED_DOMAIN),
            &[
                (keys::CUSTOM_DOMAIN, "auth.shop.example"),
                (keys::CERTIFICATE_ARN, "arn:aws:acm:us-east-1:123:certificate/abc"),
            ],
        )
    }

    const BASE_REQUIRED: [&str; 6] = [
        keys::APP_NAME,
        keys::REGION,
        keys::VERIFICATION_SUBJECT,
        keys::VERIFICATION_BODY,
        keys::CALLBACK_URLS,
        keys::LOGOUT_URLS,
    ];

    #[test]
    fn test_each_missing_required_key_is_named() {
        for key in BASE_REQUIRED {
            let err = StackConfig::resolve(&without(base_env(), key)).unwrap_err();
            assert_eq!(err, StackError::missing(key), "removing {key}");
        }
    }

    #[test]
    fn test_each_missing_key_is_named_in_custom_domain_mode() {
        assert!(StackConfig::resolve(&custom_env()).is_ok());

        let custom_required = [keys::CUSTOM_DOMAIN, keys::CERTIFICATE_ARN];
        for key in BASE_REQUIRED.into_iter().chain(custom_required) {
            let err = StackConfig::resolve(&without(custom_env(), key)).unwrap_err();
            assert_eq!(err, StackError::missing(key), "removing {key}");
        }
    }

    #[test]
    fn test_certificate_without_custom_domain_is_missing() {
        let env = with(custom_env(), &[(keys::CUSTOM_DOMAIN, "")]);
        assert_eq!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::missing(keys::CUSTOM_DOMAIN)
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let env = with(base_env(), &[(keys::REGION, "")]);
        assert_eq!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::missing(keys::REGION)
        );
    }

    #[test]
    fn test_first_missing_key_wins() {
        let env = without(without(base_env(), keys::VERIFICATION_BODY), keys::LOGOUT_URLS);
        assert_eq!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::missing(keys::VERIFICATION_BODY)
        );
    }

    #[test]
    fn test_lists_split_without_trimming() {
        let env = with(base_env(), &[(keys::CALLBACK_URLS, "a, b,,a")]);
        let config = StackConfig::resolve(&env).unwrap();
        assert_eq!(config.callback_urls, vec!["a", " b", "", "a"]);
    }

    #[test]
    fn test_custom_domain_mode() {
        let env = with(
            without(base_env(), keys::MANAGED_DOMAIN),
            &[
                (keys::CUSTOM_DOMAIN, "auth.shop.example"),
                (keys::CERTIFICATE_ARN, "arn:aws:acm:us-east-1:123:certificate/abc"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        assert_eq!(
            config.domain,
            DomainSpec::Custom {
                domain_name: "auth.shop.example".to_string(),
                certificate_arn: "arn:aws:acm:us-east-1:123:certificate/abc".to_string(),
            }
        );
        assert_eq!(config.domain.base_url(&config.region), "https://auth.shop.example");
        assert!(config.capabilities().contains(&Capability::WithCustomDomain));
    }

    #[test]
    fn test_managed_domain_base_url() {
        let config = StackConfig::resolve(&base_env()).unwrap();
        assert_eq!(
            config.domain.base_url(&config.region),
            "https://shop-login.auth.us-east-1.amazoncognito.com"
        );
    }

    #[test]
    fn test_both_domain_modes_conflict() {
        let env = with(
            base_env(),
            &[
                (keys::CUSTOM_DOMAIN, "auth.shop.example"),
                (keys::CERTIFICATE_ARN, "arn:cert"),
            ],
        );
        assert!(matches!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::ConfigurationConflict { .. }
        ));
    }

    #[test]
    fn test_no_domain_mode_conflicts() {
        let env = without(base_env(), keys::MANAGED_DOMAIN);
        assert!(matches!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::ConfigurationConflict { .. }
        ));
    }

    #[test]
    fn test_custom_domain_without_certificate_is_missing() {
        let env = with(
            without(base_env(), keys::MANAGED_DOMAIN),
            &[(keys::CUSTOM_DOMAIN, "auth.shop.example")],
        );
        assert_eq!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::missing(keys::CERTIFICATE_ARN)
        );
    }

    #[test]
    fn test_partial_provider_credentials_fail() {
        let env = with(base_env(), &[(keys::GOOGLE_CLIENT_ID, "google-id")]);
        assert_eq!(
            StackConfig::resolve(&env).unwrap_err(),
            StackError::missing(keys::GOOGLE_CLIENT_SECRET)
        );
    }

    #[test]
    fn test_secret_without_client_id_fails() {
        for (id_key, secret_key) in [
            (keys::GOOGLE_CLIENT_ID, keys::GOOGLE_CLIENT_SECRET),
            (keys::FACEBOOK_CLIENT_ID, keys::FACEBOOK_CLIENT_SECRET),
            (keys::MICROSOFT_CLIENT_ID, keys::MICROSOFT_CLIENT_SECRET),
        ] {
            let env = with(base_env(), &[(secret_key, "orphan-secret")]);
            assert_eq!(
                StackConfig::resolve(&env).unwrap_err(),
                StackError::missing(id_key),
                "setting only {secret_key}"
            );
        }
    }

    #[test]
    fn test_capabilities() {
        let native = StackConfig::resolve(&base_env()).unwrap();
        assert_eq!(
            native.capabilities().into_iter().collect::<Vec<_>>(),
            vec![Capability::NativeOnly, Capability::WithManagedDomain]
        );

        let env = with(
            base_env(),
            &[
                (keys::FACEBOOK_CLIENT_ID, "fb-id"),
                (keys::FACEBOOK_CLIENT_SECRET, "fb-secret"),
                (keys::MICROSOFT_CLIENT_ID, "ms-id"),
                (keys::MICROSOFT_CLIENT_SECRET, "ms-secret"),
            ],
        );
        let config = StackConfig::resolve(&env).unwrap();
        let capabilities = config.capabilities();
        assert!(capabilities.contains(&Capability::WithFacebook));
        assert!(capabilities.contains(&Capability::WithOidc));
        assert!(!capabilities.contains(&Capability::NativeOnly));
        assert_eq!(
            config.oidc.unwrap().issuer_url,
            DEFAULT_OIDC_ISSUER.to_string()
        );
    }
}
