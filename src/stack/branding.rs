//! Managed Login Branding
//!
//! Layered settings trees (category → component → color mode → property)
//! merged right-biased against the built-in theme, plus the binary asset
//! declarations that accompany them.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::{StackError, StackResult};

/// A settings entry: either a nested tree or a scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsNode {
    Tree(SettingsTree),
    Leaf(Value),
}

impl From<Value> for SettingsNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => SettingsNode::Tree(map.into()),
            other => SettingsNode::Leaf(other),
        }
    }
}

/// Recursive string-keyed settings mapping
///
/// Keys are kept sorted so serialized output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsTree(BTreeMap<String, SettingsNode>);

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document whose root must be an object
    pub fn from_json(value: Value) -> StackResult<Self> {
        match value {
            Value::Object(map) => Ok(map.into()),
            other => Err(StackError::InvalidBranding(format!(
                "settings root must be an object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&SettingsNode> {
        self.0.get(key)
    }

    /// Follow a key path through nested trees
    pub fn lookup(&self, path: &[&str]) -> Option<&SettingsNode> {
        let (first, rest) = path.split_first()?;
        let node = self.0.get(*first)?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            SettingsNode::Tree(tree) => tree.lookup(rest),
            SettingsNode::Leaf(_) => None,
        }
    }

    /// Set a value at `path`, creating intermediate trees and replacing
    /// any leaf standing in the way
    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        if rest.is_empty() {
            let value: Value = value.into();
            self.0.insert(first.to_string(), SettingsNode::from(value));
            return;
        }
        let entry = self
            .0
            .entry(first.to_string())
            .or_insert_with(|| SettingsNode::Tree(SettingsTree::new()));
        if let SettingsNode::Leaf(_) = entry {
            *entry = SettingsNode::Tree(SettingsTree::new());
        }
        if let SettingsNode::Tree(tree) = entry {
            tree.set(rest, value);
        }
    }

    /// Right-biased deep merge
    ///
    /// Overlapping subtrees merge recursively; at any other overlap the
    /// override replaces the default wholesale, including a leaf replacing a
    /// subtree. Keys present on one side only are kept.
    pub fn merge(&self, overrides: &SettingsTree) -> SettingsTree {
        let mut merged = self.0.clone();
        for (key, over) in &overrides.0 {
            let node = match (merged.remove(key), over) {
                (Some(SettingsNode::Tree(base)), SettingsNode::Tree(over)) => {
                    SettingsNode::Tree(base.merge(over))
                }
                (_, over) => over.clone(),
            };
            merged.insert(key.clone(), node);
        }
        SettingsTree(merged)
    }

    /// Every path ending in a leaf, depth-first in key order
    pub fn leaf_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        for (key, node) in &self.0 {
            match node {
                SettingsNode::Leaf(_) => paths.push(vec![key.clone()]),
                SettingsNode::Tree(tree) => {
                    for mut path in tree.leaf_paths() {
                        path.insert(0, key.clone());
                        paths.push(path);
                    }
                }
            }
        }
        paths
    }
}

impl From<Map<String, Value>> for SettingsTree {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

// ============================================================
// Assets
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetCategory {
    FaviconIco,
    FaviconSvg,
    EmailGraphic,
    SmsGraphic,
    AuthAppGraphic,
    PasswordGraphic,
    PasskeyGraphic,
    PageHeaderLogo,
    PageHeaderBackground,
    PageFooterLogo,
    PageFooterBackground,
    PageBackground,
    FormBackground,
    FormLogo,
    IdpButtonIcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorMode {
    Light,
    Dark,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetExtension {
    Ico,
    Jpeg,
    Png,
    Svg,
    Webp,
}

/// A binary branding asset; the payload is passed through untouched
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDeclaration {
    pub category: AssetCategory,
    pub color_mode: ColorMode,
    pub extension: AssetExtension,
    #[serde(serialize_with = "encode_base64")]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AssetDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDeclaration")
            .field("category", &self.category)
            .field("color_mode", &self.color_mode)
            .field("extension", &self.extension)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

fn encode_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Where to read an asset from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetSource {
    pub category: AssetCategory,
    pub color_mode: ColorMode,
    pub extension: AssetExtension,
    pub file: PathBuf,
}

impl AssetSource {
    fn new(
        category: AssetCategory,
        color_mode: ColorMode,
        extension: AssetExtension,
        file: &str,
    ) -> Self {
        Self {
            category,
            color_mode,
            extension,
            file: PathBuf::from(file),
        }
    }

    /// Read the payload; relative paths resolve against `assets_dir`
    pub fn load(&self, assets_dir: &Path) -> Result<AssetDeclaration> {
        let path = assets_dir.join(&self.file);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read branding asset {}", path.display()))?;

        debug!(
            category = ?self.category,
            color_mode = ?self.color_mode,
            size = bytes.len(),
            "Loaded branding asset"
        );

        Ok(AssetDeclaration {
            category: self.category,
            color_mode: self.color_mode,
            extension: self.extension,
            bytes,
        })
    }
}

/// Placeholder images compiled into the binary
const BUNDLED_FORM_LOGO: &[u8] = include_bytes!("../../assets/FORM_LOGO.png");
const BUNDLED_FAVICON: &[u8] = include_bytes!("../../assets/FAVICON.ico");

/// Bundled payload standing in for a default manifest entry
fn bundled_default(source: &AssetSource) -> Option<&'static [u8]> {
    match (source.category, source.color_mode) {
        (AssetCategory::FormLogo, ColorMode::Light) => Some(BUNDLED_FORM_LOGO),
        (AssetCategory::FaviconIco, ColorMode::Light) => Some(BUNDLED_FAVICON),
        _ => None,
    }
}

/// Assets used when a deployment supplies no manifest of its own
pub fn default_asset_manifest() -> Vec<AssetSource> {
    vec![
        AssetSource::new(
            AssetCategory::FormLogo,
            ColorMode::Light,
            AssetExtension::Png,
            "FORM_LOGO.png",
        ),
        AssetSource::new(
            AssetCategory::FaviconIco,
            ColorMode::Light,
            AssetExtension::Ico,
            "FAVICON.ico",
        ),
    ]
}

/// Per-deployment branding document
///
/// ```json
/// { "settings": { "components": { ... } },
///   "assets": [ { "category": "FORM_LOGO", "colorMode": "LIGHT",
///                 "extension": "PNG", "file": "logo.png" } ] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrandingDocument {
    #[serde(default)]
    pub settings: SettingsTree,
    #[serde(default)]
    pub assets: Option<Vec<AssetSource>>,
}

impl BrandingDocument {
    pub fn from_json(raw: &str) -> StackResult<Self> {
        serde_json::from_str(raw).map_err(|e| StackError::InvalidBranding(e.to_string()))
    }

    pub fn asset_manifest(&self) -> Vec<AssetSource> {
        self.assets.clone().unwrap_or_else(default_asset_manifest)
    }

    /// Load every asset of the manifest into a merger input
    ///
    /// Files named by the document must exist. Default entries prefer a file
    /// in `assets_dir` and otherwise use the bundled placeholder.
    pub fn load(&self, assets_dir: &Path) -> Result<BrandingInput> {
        let assets = match &self.assets {
            Some(manifest) => manifest
                .iter()
                .map(|source| source.load(assets_dir))
                .collect::<Result<Vec<_>>>()?,
            None => default_asset_manifest()
                .iter()
                .map(|source| load_default(source, assets_dir))
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(BrandingInput {
            overrides: self.settings.clone(),
            assets,
        })
    }
}

fn load_default(source: &AssetSource, assets_dir: &Path) -> Result<AssetDeclaration> {
    match bundled_default(source) {
        Some(bytes) if !assets_dir.join(&source.file).is_file() => {
            debug!(category = ?source.category, "Using bundled branding asset");
            Ok(AssetDeclaration {
                category: source.category,
                color_mode: source.color_mode,
                extension: source.extension,
                bytes: bytes.to_vec(),
            })
        }
        _ => source.load(assets_dir),
    }
}

/// Override tree and assets supplied for one deployment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrandingInput {
    pub overrides: SettingsTree,
    pub assets: Vec<AssetDeclaration>,
}

/// Result of merging a deployment's branding over the defaults
#[derive(Debug, Clone, PartialEq)]
pub struct MergedBranding {
    pub settings: SettingsTree,
    pub assets: Vec<AssetDeclaration>,
}

/// Merges per-deployment branding over a default theme
pub struct BrandingMerger {
    defaults: SettingsTree,
}

impl Default for BrandingMerger {
    fn default() -> Self {
        Self::new(default_settings())
    }
}

impl BrandingMerger {
    pub fn new(defaults: SettingsTree) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &SettingsTree {
        &self.defaults
    }

    /// Merge settings and validate the asset list
    ///
    /// Assets are not merged: the deployment's list is taken as given, but
    /// two declarations for the same (category, color mode) are rejected.
    pub fn merge(&self, input: BrandingInput) -> StackResult<MergedBranding> {
        let mut seen = BTreeSet::new();
        for asset in &input.assets {
            if !seen.insert((asset.category, asset.color_mode)) {
                return Err(StackError::conflict(format!(
                    "duplicate branding asset for category {:?} in color mode {:?}",
                    asset.category, asset.color_mode
                )));
            }
        }

        let settings = self.defaults.merge(&input.overrides);

        info!(
            override_leaves = input.overrides.leaf_paths().len(),
            merged_leaves = settings.leaf_paths().len(),
            assets = input.assets.len(),
            "Branding merged"
        );

        Ok(MergedBranding {
            settings,
            assets: input.assets,
        })
    }
}

/// Built-in light theme of the hosted login pages
pub fn default_settings() -> SettingsTree {
    let theme = json!({
        "categories": {
            "form": {
                "languageSelector": { "enabled": true }
            },
            "global": {
                "colorSchemeMode": "LIGHT"
            }
        },
        "componentClasses": {
            "focusState": {
                "lightMode": { "borderColor": "0069d9ff" }
            },
            "input": {
                "lightMode": {
                    "defaults": {},
                    "placeholderColor": "6c757dff"
                }
            },
            "inputLabel": {
                "lightMode": {}
            },
            "link": {
                "lightMode": {
                    "defaults": { "textColor": "1b6ec2ff" },
                    "hover": { "textColor": "0069d9ff" }
                }
            }
        },
        "components": {
            "favicon": {
                "enabledTypes": ["ICO"]
            },
            "form": {
                "logo": { "enabled": true }
            },
            "pageBackground": {
                "image": { "enabled": false }
            },
            "pageText": {
                "lightMode": {
                    "headingColor": "212529ff",
                    "bodyColor": "212529ff",
                    "descriptionColor": "212529ff"
                }
            },
            "primaryButton": {
                "lightMode": {
                    "defaults": {
                        "backgroundColor": "1b6ec2ff",
                        "textColor": "ffffffff"
                    },
                    "hover": {
                        "backgroundColor": "0069d9ff",
                        "textColor": "ffffffff"
                    }
                }
            },
            "secondaryButton": {
                "lightMode": {
                    "defaults": {
                        "backgroundColor": "ffffffff",
                        "borderColor": "1b6ec2ff",
                        "textColor": "1b6ec2ff"
                    },
                    "hover": {
                        "backgroundColor": "f2f8fdff",
                        "borderColor": "0069d9ff",
                        "textColor": "0069d9ff"
                    }
                }
            }
        }
    });

    match theme {
        Value::Object(map) => map.into(),
        _ => SettingsTree::new(),
    }
}
