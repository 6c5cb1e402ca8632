use semver::Version;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::errors::ConfigErrorKind;

/// Config files looked up in this order
pub const CONFIG_FILES: &[&str] = &["digen.yaml", "digen.yml", "digen.json"];

/// Oldest config schema this build understands
pub const SCHEMA_VERSION: Version = Version::new(0, 1, 0);

const MACRO_SUFFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: Version,
    pub container: ContainerConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub factories: FactoriesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    /// Root directory of the generated container, relative to the config file
    pub dir: PathBuf,
    /// Type threaded into every getter and factory
    #[serde(default = "default_context")]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandlingConfig {
    #[serde(rename = "type", default = "default_error_type")]
    pub ty: String,
    #[serde(default = "default_new")]
    pub new: FunctionConfig,
    #[serde(default = "default_join")]
    pub join: FunctionConfig,
    #[serde(default)]
    pub wrap: WrapConfig,
}

/// A function or, with a `!` suffix, a macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    #[serde(default)]
    pub package: String,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapConfig {
    #[serde(default)]
    pub package: String,
    pub function: String,
    /// Format spec the wrapped error is rendered with by macro wrappers
    #[serde(default = "default_verb")]
    pub verb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoriesConfig {
    /// Generated stubs return `Result<T, E>`
    #[serde(default)]
    pub return_error: bool,
}

fn default_context() -> String {
    "tokio_util::sync::CancellationToken".to_owned()
}

fn default_error_type() -> String {
    "anyhow::Error".to_owned()
}

fn default_new() -> FunctionConfig {
    FunctionConfig {
        package: "anyhow::Error".to_owned(),
        function: "msg".to_owned(),
    }
}

fn default_join() -> FunctionConfig {
    FunctionConfig {
        package: "anyhow::Error".to_owned(),
        function: "context".to_owned(),
    }
}

fn default_verb() -> String {
    "{:#}".to_owned()
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            ty: default_error_type(),
            new: default_new(),
            join: default_join(),
            wrap: WrapConfig::default(),
        }
    }
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            package: "anyhow::Error".to_owned(),
            function: "context".to_owned(),
            verb: default_verb(),
        }
    }
}

impl Config {
    /// Config for a fresh project with the container generated into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            version: Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(SCHEMA_VERSION),
            container: ContainerConfig {
                dir: dir.into(),
                context: default_context(),
            },
            error_handling: ErrorHandlingConfig::default(),
            factories: FactoriesConfig::default(),
        }
    }

    /// Finds the first of [`CONFIG_FILES`] in `dir`
    pub fn discover(dir: impl AsRef<Path>) -> Result<PathBuf, ConfigErrorKind> {
        let dir = dir.as_ref();
        CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigErrorKind::NotFound { dir: dir.to_path_buf() })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigErrorKind> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigErrorKind::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&text).map_err(|source| ConfigErrorKind::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&text).map_err(|source| ConfigErrorKind::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        if config.version < SCHEMA_VERSION {
            return Err(ConfigErrorKind::VersionMismatch {
                actual: config.version,
                expected: SCHEMA_VERSION,
            });
        }

        debug!(path = %path.display(), version = %config.version, "Config loaded");

        Ok(config)
    }

    /// Serializes the config as YAML, or JSON for a `.json` path
    pub fn to_bytes(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, ConfigErrorKind> {
        let path = path.as_ref();
        if is_json(path) {
            let mut text = serde_json::to_string_pretty(self).map_err(|source| ConfigErrorKind::Json {
                path: path.to_path_buf(),
                source,
            })?;
            text.push('\n');
            Ok(text.into_bytes())
        } else {
            serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|source| ConfigErrorKind::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigErrorKind> {
        let path = path.as_ref();
        let bytes = self.to_bytes(path)?;
        fs::write(path, bytes).map_err(|source| ConfigErrorKind::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses the Rust paths of the config into the form the emitters splice into generated code
    pub fn options(&self) -> Result<Options, ConfigErrorKind> {
        let handling = &self.error_handling;
        Ok(Options {
            context: parse_type("container.context", &self.container.context)?,
            error: parse_type("errorHandling.type", &handling.ty)?,
            new: Callable::parse("errorHandling.new", &handling.new.package, &handling.new.function)?,
            join: Callable::parse("errorHandling.join", &handling.join.package, &handling.join.function)?,
            wrap: Callable::parse("errorHandling.wrap", &handling.wrap.package, &handling.wrap.function)?,
            verb: handling.wrap.verb.clone(),
            return_error: self.factories.return_error,
        })
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn parse_type(key: &'static str, value: &str) -> Result<syn::Type, ConfigErrorKind> {
    syn::parse_str(value).map_err(|_| ConfigErrorKind::InvalidPath {
        key,
        value: value.to_owned(),
    })
}

/// Config values ready to be quoted into generated code
#[derive(Debug, Clone)]
pub struct Options {
    pub context: syn::Type,
    pub error: syn::Type,
    pub new: Callable,
    pub join: Callable,
    pub wrap: Callable,
    pub verb: String,
    pub return_error: bool,
}

/// Path of an error constructor and whether it's invoked as a macro
#[derive(Debug, Clone)]
pub struct Callable {
    pub path: syn::Path,
    pub is_macro: bool,
}

impl Callable {
    fn parse(key: &'static str, package: &str, function: &str) -> Result<Self, ConfigErrorKind> {
        let (function, is_macro) = match function.strip_suffix(MACRO_SUFFIX) {
            Some(function) => (function, true),
            None => (function, false),
        };
        let full = if package.is_empty() {
            function.to_owned()
        } else {
            format!("{package}::{function}")
        };

        let path = syn::parse_str(&full).map_err(|_| ConfigErrorKind::InvalidPath { key, value: full })?;

        Ok(Self { path, is_macro })
    }
}
