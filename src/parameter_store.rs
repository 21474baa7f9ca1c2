//! Parameter Store
//!
//! Sink for exported parameters. Writes are upserts keyed by parameter name:
//! a new key is created, a changed value bumps the version, and an identical
//! value is left alone.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::stack::{ExportedParameter, ParameterTier};

/// A parameter as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredParameter {
    pub value: String,
    pub description: String,
    pub tier: ParameterTier,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
}

/// What an upsert did (or would do) to one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PutOutcome {
    Created,
    Updated,
    Unchanged,
}

impl PutOutcome {
    /// Outcome of writing `parameter` over `existing`
    pub fn plan(existing: Option<&StoredParameter>, parameter: &ExportedParameter) -> Self {
        match existing {
            None => PutOutcome::Created,
            Some(stored) if stored.value == parameter.string_value() => PutOutcome::Unchanged,
            Some(_) => PutOutcome::Updated,
        }
    }
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<Option<StoredParameter>>;

    async fn put_parameter(&self, parameter: &ExportedParameter) -> Result<PutOutcome>;
}

/// Apply one upsert to an in-memory table
fn upsert(
    table: &mut BTreeMap<String, StoredParameter>,
    parameter: &ExportedParameter,
) -> PutOutcome {
    let outcome = PutOutcome::plan(table.get(&parameter.name), parameter);
    if outcome == PutOutcome::Unchanged {
        return outcome;
    }

    let version = table.get(&parameter.name).map_or(1, |stored| stored.version + 1);
    table.insert(
        parameter.name.clone(),
        StoredParameter {
            value: parameter.string_value(),
            description: parameter.description.clone(),
            tier: parameter.tier,
            version,
            last_modified: Utc::now(),
        },
    );
    outcome
}

/// JSON file keyed by parameter name
///
/// The whole file is rewritten on every change. Writers in one process are
/// serialized; separate processes sharing a file are not.
pub struct FileParameterStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, StoredParameter>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse parameter store {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Parameter store does not exist yet");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read parameter store {}", self.path.display())),
        }
    }

    /// Sibling file the table is staged in before replacing the store
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Stage the table next to the store, then rename it into place so
    /// readers see either the old file or the new one
    async fn save(&self, table: &BTreeMap<String, StoredParameter>) -> Result<()> {
        let raw = serde_json::to_string_pretty(table).context("Failed to encode parameter store")?;
        let staging = self.staging_path();

        tokio::fs::write(&staging, raw)
            .await
            .with_context(|| format!("Failed to write parameter store {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace parameter store {}", self.path.display()))
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<Option<StoredParameter>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(name))
    }

    async fn put_parameter(&self, parameter: &ExportedParameter) -> Result<PutOutcome> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let outcome = upsert(&mut table, parameter);
        if outcome != PutOutcome::Unchanged {
            self.save(&table).await?;
        }
        Ok(outcome)
    }
}

/// Store kept in process memory
#[derive(Default)]
pub struct MemoryParameterStore {
    table: Mutex<BTreeMap<String, StoredParameter>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<Option<StoredParameter>> {
        Ok(self.table.lock().await.get(name).cloned())
    }

    async fn put_parameter(&self, parameter: &ExportedParameter) -> Result<PutOutcome> {
        Ok(upsert(&mut *self.table.lock().await, parameter))
    }
}

/// Counts of a publish run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl PublishSummary {
    fn record(&mut self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Created => self.created += 1,
            PutOutcome::Updated => self.updated += 1,
            PutOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Upsert every parameter in order, stopping at the first store error
///
/// With `dry_run` the store is only read, and the summary reports what a
/// real run would do.
pub async fn publish_parameters<S: ParameterStore + ?Sized>(
    store: &S,
    parameters: &[ExportedParameter],
    dry_run: bool,
) -> Result<PublishSummary> {
    let mut summary = PublishSummary::default();

    for parameter in parameters {
        let outcome = if dry_run {
            let existing = store.get_parameter(&parameter.name).await?;
            PutOutcome::plan(existing.as_ref(), parameter)
        } else {
            store
                .put_parameter(parameter)
                .await
                .with_context(|| format!("Failed to publish parameter {}", parameter.name))?
        };

        debug!(
            parameter = %parameter.name,
            outcome = ?outcome,
            dry_run = dry_run,
            "Parameter processed"
        );
        summary.record(outcome);
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        dry_run = dry_run,
        "Parameter publish complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::config::keys;
    use crate::stack::config::tests::{base_env, with};
    use crate::stack::{synthesize, BrandingInput, StackConfig};

    fn parameters(env: &BTreeMap<String, String>) -> Vec<ExportedParameter> {
        let config = StackConfig::resolve(env).unwrap();
        synthesize(&config, BrandingInput::default())
            .unwrap()
            .parameters()
            .to_vec()
    }

    #[tokio::test]
    async fn test_memory_store_upserts() {
        let store = MemoryParameterStore::new();
        let first = parameters(&base_env());

        let summary = publish_parameters(&store, &first, false).await.unwrap();
        assert_eq!(summary.created, 6);
        assert_eq!(summary.total(), 6);
        assert_eq!(store.len().await, 6);

        let again = publish_parameters(&store, &first, false).await.unwrap();
        assert_eq!(
            again,
            PublishSummary {
                created: 0,
                updated: 0,
                unchanged: 6
            }
        );

        let changed = parameters(&with(base_env(), &[(keys::REGION, "eu-west-1")]));
        let summary = publish_parameters(&store, &changed, false).await.unwrap();
        // Region and the token URL both embed the region
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.unchanged, 4);

        let region = store.get_parameter("/Shop/Cognito/Region").await.unwrap().unwrap();
        assert_eq!(region.value, "eu-west-1");
        assert_eq!(region.version, 2);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let params = parameters(&base_env());

        let store = FileParameterStore::new(&path);
        assert!(store.get_parameter("/Shop/Cognito/Region").await.unwrap().is_none());
        publish_parameters(&store, &params, false).await.unwrap();

        let reopened = FileParameterStore::new(&path);
        let pool = reopened
            .get_parameter("/Shop/Cognito/UserPoolId")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pool.value, "${ShopUserPool.UserPoolId}");
        assert_eq!(pool.tier, ParameterTier::Standard);
        assert_eq!(pool.version, 1);

        let summary = publish_parameters(&reopened, &params, false).await.unwrap();
        assert_eq!(summary.unchanged, params.len());
    }

    #[tokio::test]
    async fn test_file_store_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let store = FileParameterStore::new(&path);
        // A staging file left by an interrupted run is overwritten, never read
        std::fs::write(dir.path().join("parameters.json.tmp"), "{ truncated").unwrap();

        publish_parameters(&store, &parameters(&base_env()), false)
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["parameters.json".to_string()]);

        let raw = std::fs::read_to_string(&path).unwrap();
        let table: BTreeMap<String, StoredParameter> = serde_json::from_str(&raw).unwrap();
        assert_eq!(table.len(), 6);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let store = FileParameterStore::new(&path);

        let summary = publish_parameters(&store, &parameters(&base_env()), true)
            .await
            .unwrap();
        assert_eq!(summary.created, 6);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_store_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileParameterStore::new(&path);
        let err = store.get_parameter("/Shop/Cognito/Region").await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse parameter store"));
    }
}
