//! Spec configuration model and normalization.
//!
//! The raw configuration is either a single spec object or a list of them. [`normalize`]
//! flattens it into a [`ConfigSet`], the ordered worklist every other component consumes.
//!
//! # Example
//!
//! ```
//! use openapi_devkit::config::{normalize, RawConfig};
//!
//! let raw: RawConfig = serde_yaml::from_str(
//!     "- projectName: pets\n  schemaPath: https://example.com/pets.json\n\
//!      - projectName: users\n  schemaPath: ./users.yaml\n",
//! ).unwrap();
//! let set = normalize(&raw);
//! assert_eq!(set.names(), vec!["pets", "users"]);
//! ```

use crate::error::{Error, Result};
use log::debug;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Display name used for a spec without a `projectName`.
pub const FALLBACK_NAME: &str = "openapi";

/// Config file names looked up in the project root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["openapi.yaml", "openapi.yml", "openapi.json"];

/// Context handed to a computed API prefix for each generated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPrefixContext {
    pub path: String,
    pub method: String,
    pub namespace: String,
    pub function_name: String,
}

pub type PrefixFn = Arc<dyn Fn(&ApiPrefixContext) -> String + Send + Sync>;

/// Callback used to rename a generated function or class. Receives the default name.
pub type NameHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Prefix prepended to request paths in generated services.
#[derive(Clone)]
pub enum ApiPrefix {
    /// A fixed prefix, the only form a config file can express
    Literal(String),
    /// A prefix computed per operation, for hosts that configure specs in code
    Computed(PrefixFn),
}

impl ApiPrefix {
    pub fn resolve(&self, ctx: &ApiPrefixContext) -> String {
        match self {
            ApiPrefix::Literal(prefix) => prefix.clone(),
            ApiPrefix::Computed(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ApiPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiPrefix::Literal(prefix) => f.debug_tuple("Literal").field(prefix).finish(),
            ApiPrefix::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl PartialEq for ApiPrefix {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ApiPrefix::Literal(a), ApiPrefix::Literal(b)) => a == b,
            (ApiPrefix::Computed(a), ApiPrefix::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for ApiPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ApiPrefix::Literal(prefix) => serializer.serialize_str(prefix),
            ApiPrefix::Computed(_) => Err(serde::ser::Error::custom(
                "a computed apiPrefix cannot be serialized",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ApiPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(ApiPrefix::Literal)
    }
}

/// Naming hooks applied by in-process generators.
#[derive(Clone, Default)]
pub struct Hooks {
    pub custom_function_name: Option<NameHook>,
    pub custom_class_name: Option<NameHook>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.custom_function_name.is_none() && self.custom_class_name.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("custom_function_name", &self.custom_function_name.is_some())
            .field("custom_class_name", &self.custom_class_name.is_some())
            .finish()
    }
}

impl PartialEq for Hooks {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &Option<NameHook>, b: &Option<NameHook>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.custom_function_name, &other.custom_function_name)
            && same(&self.custom_class_name, &other.custom_class_name)
    }
}

/// Configuration of a single API spec.
///
/// Field names follow the camelCase keys of the config file. `projectName` is the spec's
/// display name: it names the published artifact and labels the viewer option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpecConfig {
    #[serde(
        rename = "projectName",
        alias = "displayName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,

    #[serde(rename = "schemaPath", alias = "schemaLocation", default)]
    pub schema_location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_lib_path: Option<String>,

    #[serde(rename = "mock", default)]
    pub mock_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<ApiPrefix>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_style: Option<String>,

    #[serde(skip)]
    pub hooks: Hooks,

    /// `hook` as written in a config file. Hooks are callbacks, so a file can only name them;
    /// the entry is accepted and ignored.
    #[serde(rename = "hook", default, skip_serializing)]
    file_hook: Option<IgnoredAny>,
}

impl SpecConfig {
    pub fn new(schema_location: impl Into<String>) -> Self {
        Self {
            schema_location: schema_location.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_mock(mut self, enabled: bool) -> Self {
        self.mock_enabled = enabled;
        self
    }

    /// The effective display name, falling back to [`FALLBACK_NAME`] when unset or empty.
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_NAME)
    }
}

/// Configuration exactly as written: one spec, or a (possibly nested) list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawConfig {
    Many(Vec<RawConfig>),
    One(SpecConfig),
}

impl From<SpecConfig> for RawConfig {
    fn from(spec: SpecConfig) -> Self {
        RawConfig::One(spec)
    }
}

impl From<Vec<SpecConfig>> for RawConfig {
    fn from(specs: Vec<SpecConfig>) -> Self {
        RawConfig::Many(specs.into_iter().map(RawConfig::One).collect())
    }
}

/// Ordered list of spec configurations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSet {
    specs: Vec<SpecConfig>,
}

impl ConfigSet {
    pub fn new(specs: Vec<SpecConfig>) -> Self {
        Self { specs }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpecConfig> {
        self.specs.iter()
    }

    pub fn specs(&self) -> &[SpecConfig] {
        &self.specs
    }

    /// Effective display names in configuration order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(SpecConfig::display_name).collect()
    }

    /// Name selected when the viewer first loads.
    pub fn initial_name(&self) -> &str {
        self.specs
            .first()
            .map(SpecConfig::display_name)
            .unwrap_or(FALLBACK_NAME)
    }

    /// Rejects entries that would silently break artifact publishing: a missing schema
    /// location, or a display name already used by an earlier entry.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.specs {
            let name = spec.display_name();
            if spec.schema_location.trim().is_empty() {
                return Err(Error::configuration(name, "schemaPath is missing or empty"));
            }
            if !seen.insert(name) {
                return Err(Error::configuration(
                    name,
                    "display name is used by more than one spec; set a distinct projectName",
                ));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ConfigSet {
    type Item = &'a SpecConfig;
    type IntoIter = std::slice::Iter<'a, SpecConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

/// Flattens a raw configuration into an ordered [`ConfigSet`].
///
/// Entries are never dropped, reordered or deduplicated.
pub fn normalize(raw: &RawConfig) -> ConfigSet {
    fn flatten_into(raw: &RawConfig, out: &mut Vec<SpecConfig>) {
        match raw {
            RawConfig::One(spec) => {
                if spec.file_hook.is_some() {
                    debug!(
                        "Ignoring hook entry of '{}': hooks can only be set in code",
                        spec.display_name()
                    );
                }
                out.push(spec.clone())
            }
            RawConfig::Many(items) => {
                for item in items {
                    flatten_into(item, out);
                }
            }
        }
    }

    let mut specs = Vec::new();
    flatten_into(raw, &mut specs);
    debug!("Normalized configuration into {} spec(s)", specs.len());
    ConfigSet::new(specs)
}

/// Parses a raw configuration from YAML or JSON text.
///
/// Lists and spec objects are told apart by shape, so an error inside a spec names the
/// offending field instead of only reporting that nothing matched.
pub fn parse_config(content: &str) -> std::result::Result<RawConfig, serde_yaml::Error> {
    fn from_value(value: serde_yaml::Value) -> std::result::Result<RawConfig, serde_yaml::Error> {
        match value {
            serde_yaml::Value::Sequence(items) => items
                .into_iter()
                .map(from_value)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(RawConfig::Many),
            other => serde_yaml::from_value::<SpecConfig>(other).map(RawConfig::One),
        }
    }

    from_value(serde_yaml::from_str(content)?)
}

/// Loads a raw configuration from a YAML or JSON file.
pub fn load_config(path: &Path) -> Result<RawConfig> {
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_config(&content).map_err(|e| Error::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Finds the first known config file in `root`.
pub fn discover_config(root: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|candidate| candidate.is_file())
}
