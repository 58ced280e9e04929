//! JSON configuration for the `bitrpc-codegen` CLI: which schema file to
//! compile and which target languages to emit it as.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::codegen::Target;
use crate::CodegenError;

#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    /// Path to the `.pdl` schema, relative to the config file's directory.
    pub schema: PathBuf,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// One of "rust" or "csharp".
    pub language: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the schema's own `namespace` declaration for this target.
    #[serde(default)]
    pub namespace: Option<String>,
    pub out_dir: PathBuf,
    /// Overrides the emitted file's base name; defaults to the schema's stem.
    #[serde(default)]
    pub module_name: Option<String>,
    /// A directory of hand-written runtime source to copy into
    /// `out_dir/runtime/` alongside the generated file (spec.md §6.5).
    #[serde(default)]
    pub runtime_source_path: Option<PathBuf>,
    /// Free-form per-target options (spec.md §6.5); unused by the `rust` and
    /// `csharp` emitters today, but threaded through so a future target can
    /// read them without a config-format change.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl GeneratorConfig {
    pub fn from_str(contents: &str) -> Result<Self, CodegenError> {
        serde_json::from_str(contents)
            .map_err(|e| CodegenError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Resolves every *enabled* target's language string to a [`Target`],
    /// in configuration order. Disabled targets are skipped entirely -- an
    /// unrecognized `language` on a disabled entry is not an error, since it
    /// is never actually compiled.
    pub fn resolved_targets(&self) -> Result<Vec<(Target, &TargetConfig)>, CodegenError> {
        self.targets
            .iter()
            .filter(|t| t.enabled)
            .map(|t| {
                Target::from_name(&t.language)
                    .map(|target| (target, t))
                    .ok_or_else(|| CodegenError::UnknownTarget(t.language.clone()))
            })
            .collect()
    }
}
