//! Configuration for generation passes.
//!
//! Loads, lowest precedence first:
//! 1. Global: ~/.config/codecgen/config.toml
//! 2. Per-project: .codecgen/config.toml
//! 3. An explicit file named by the caller
//!
//! Command-line flags are merged on top by the binary.
//!
//! Example config.toml:
//! ```toml
//! [codegen]
//! module = "codecs"
//! serialize_nulls = true
//! notation = "hungarian"
//!
//! [manifest]
//! external = ["../core/src/codecs/codecgen.types"]
//! ```

use crate::accessor::Notation;
use crate::error::{Error, Result};
use crate::manifest;
use crate::merge::Merge;
use crate::output::RenderContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `[codegen]`: how codecs are synthesized and rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    /// Name of the generated module directory.
    pub module: Option<String>,
    /// Write absent fields as `null` instead of omitting them.
    pub serialize_nulls: Option<bool>,
    pub notation: Option<Notation>,
    /// Crate providing the streaming reader/writer and known adapters.
    pub runtime_crate: Option<String>,
    /// Rust path under which declared model types live.
    pub model_root: Option<String>,
    /// Synthesize and render units on the rayon pool.
    pub parallel: Option<bool>,
}

impl CodegenConfig {
    pub fn module(&self) -> &str {
        self.module.as_deref().unwrap_or("codecs")
    }

    pub fn serialize_nulls(&self) -> bool {
        self.serialize_nulls.unwrap_or(false)
    }

    pub fn notation(&self) -> Notation {
        self.notation.unwrap_or_default()
    }

    pub fn runtime_crate(&self) -> &str {
        self.runtime_crate.as_deref().unwrap_or("codec_runtime")
    }

    pub fn model_root(&self) -> &str {
        self.model_root.as_deref().unwrap_or("crate")
    }

    pub fn parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }
}

impl Merge for CodegenConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            module: self.module.merge(other.module),
            serialize_nulls: self.serialize_nulls.merge(other.serialize_nulls),
            notation: self.notation.merge(other.notation),
            runtime_crate: self.runtime_crate.merge(other.runtime_crate),
            model_root: self.model_root.merge(other.model_root),
            parallel: self.parallel.merge(other.parallel),
        }
    }
}

/// `[manifest]`: the known-types files read and written by a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    /// File name of this module's manifest inside the output directory.
    pub file: Option<String>,
    /// Manifests of other modules whose codecs are referenced, not generated.
    pub external: Option<Vec<PathBuf>>,
}

impl ManifestConfig {
    pub fn file(&self) -> &str {
        self.file.as_deref().unwrap_or(manifest::DEFAULT_FILE)
    }

    pub fn external(&self) -> &[PathBuf] {
        self.external.as_deref().unwrap_or_default()
    }
}

impl Merge for ManifestConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            file: self.file.merge(other.file),
            external: self.external.merge(other.external),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecgenConfig {
    pub codegen: CodegenConfig,
    pub manifest: ManifestConfig,
}

impl Merge for CodecgenConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            codegen: self.codegen.merge(other.codegen),
            manifest: self.manifest.merge(other.manifest),
        }
    }
}

impl CodecgenConfig {
    /// Load the global and project layers for `root`, then `explicit` if given.
    ///
    /// Missing global or project files are skipped; a missing explicit file is
    /// an error. Any file that fails to parse is an error.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let mut layers: Vec<PathBuf> = Vec::new();
        layers.extend(Self::global_config_path());
        layers.push(Self::project_config_path(root));
        for path in &layers {
            if let Some(layer) = Self::load_file(path)? {
                config = config.merge(layer);
            }
        }
        if let Some(path) = explicit {
            let layer = Self::load_file(path)?.ok_or_else(|| Error::Io {
                path: path.to_path_buf(),
                source: std::io::ErrorKind::NotFound.into(),
            })?;
            config = config.merge(layer);
        }
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
        Some(config_home.join("codecgen").join("config.toml"))
    }

    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(".codecgen").join("config.toml")
    }

    /// Read one layer; `None` when the file does not exist.
    pub fn load_file(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        debug!(path = %path.display(), "loaded config layer");
        Self::parse(&text, path).map(Some)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            runtime_crate: self.codegen.runtime_crate().to_string(),
            model_root: self.codegen.model_root().to_string(),
            module: self.codegen.module().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project_config(dir: &TempDir, text: &str) {
        let path = CodecgenConfig::project_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = CodecgenConfig::default();
        assert_eq!(config.codegen.module(), "codecs");
        assert!(!config.codegen.serialize_nulls());
        assert!(config.codegen.parallel());
        assert_eq!(config.codegen.notation(), Notation::Standard);
        assert_eq!(config.manifest.file(), "codecgen.types");
        assert!(config.manifest.external().is_empty());
        assert_eq!(config.render_context(), RenderContext::default());
    }

    #[test]
    fn test_explicit_file_overrides_project() {
        let dir = TempDir::new().unwrap();
        write_project_config(
            &dir,
            r#"
[codegen]
serialize_nulls = true
notation = "hungarian"
"#,
        );
        let explicit = dir.path().join("ci.toml");
        std::fs::write(&explicit, "[codegen]\nserialize_nulls = false\n").unwrap();

        let config = CodecgenConfig::load(dir.path(), Some(&explicit)).unwrap();
        assert!(!config.codegen.serialize_nulls());
        // Unset in the explicit layer, so the project value survives.
        assert_eq!(config.codegen.notation(), Notation::Hungarian);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = CodecgenConfig::load(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_invalid_config() {
        let err = CodecgenConfig::parse("[codegen]\nunknown = 1\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().starts_with("invalid config c.toml: unknown field `unknown`"));
    }
}
