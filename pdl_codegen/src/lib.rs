//! Parses BitRPC Protocol Definition Language schemas and emits wire-compatible
//! target-language source. See `pdl_codegen::Compiler` for the `build.rs`
//! entry point and `bin/bitrpc-codegen.rs` for the standalone CLI.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod parser;
pub mod scanner;
pub mod symbol_table;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

pub use ast::ProtocolDefinition;
pub use codegen::Target;
pub use validate::ValidatedSchema;

/// A parse error, carrying the line/column spec.md §4.1 requires.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.reason)
    }
}

impl std::error::Error for SchemaError {}

/// Errors that can arise anywhere between reading a schema file and writing
/// generated source: parsing, validation, or I/O.
#[derive(Debug)]
pub enum CodegenError {
    Schema(SchemaError),
    UndefinedName(String),
    DuplicateMessage(String),
    DuplicateFieldId(String, u32),
    FieldIdTooLarge(String, u32),
    UnknownTarget(String),
    Io(std::io::Error),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::UndefinedName(n) => write!(f, "reference to undefined message '{n}'"),
            Self::DuplicateMessage(n) => write!(f, "message '{n}' is defined more than once"),
            Self::DuplicateFieldId(msg, id) => {
                write!(f, "duplicate field id {id} in message '{msg}'")
            }
            Self::FieldIdTooLarge(msg, id) => {
                write!(f, "field id {id} in message '{msg}' exceeds the 1024 ceiling")
            }
            Self::UnknownTarget(t) => write!(f, "unknown target language '{t}'"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CodegenError {}

impl From<std::io::Error> for CodegenError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SchemaError> for CodegenError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;

/// Parses `source` into a [`ProtocolDefinition`].
pub fn parse(source: &str) -> Result<ProtocolDefinition> {
    let mut parser = parser::Parser::new(scanner::Scanner::new(source));
    Ok(parser.parse()?)
}

/// Builder-style entry point for `build.rs` scripts, mirroring the teacher's
/// `xdr_codegen::Compiler` (`Compiler::new().file(...).run()`).
///
/// Every `.file()` is parsed independently and merged into a single schema
/// (namespace and options from the first file win; messages, services, and
/// later options accumulate) before validation, so that a schema split across
/// several `.pdl` files behaves as if it were one file.
pub struct Compiler {
    files: Vec<PathBuf>,
    module_name: Option<String>,
    namespace_override: Option<String>,
    targets: Vec<Target>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            files: Vec::new(),
            module_name: None,
            namespace_override: None,
            targets: vec![Target::Rust],
        }
    }

    /// Add a `.pdl` source file to compile. Call more than once to merge
    /// several files into one schema.
    pub fn file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.files.push(path.into());
        self
    }

    /// Overrides the generated module / file name (defaults to the first
    /// input file's stem).
    pub fn module_name<S: Into<String>>(mut self, name: S) -> Self {
        self.module_name = Some(name.into());
        self
    }

    /// Adds a target language to emit. The Rust target is enabled by default;
    /// calling this clears that default on first use.
    pub fn target(mut self, target: Target) -> Self {
        if self.targets == [Target::Rust] {
            self.targets = vec![target];
        } else {
            self.targets.push(target);
        }
        self
    }

    pub fn enable_csharp(self) -> Self {
        self.target(Target::CSharp)
    }

    /// Overrides the schema's own `namespace` declaration (per-target, per
    /// spec.md §6.5's per-target `namespace` config field).
    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace_override = Some(namespace.into());
        self
    }

    /// Parses, merges, and validates all added files, then writes one output
    /// file per enabled target into `$OUT_DIR` (or `out_dir`, if set via
    /// [`Compiler::run_into`]).
    pub fn run(self) -> Result<()> {
        let out_dir = std::env::var("OUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        self.run_into(&out_dir)
    }

    pub fn run_into(self, out_dir: &Path) -> Result<()> {
        if self.files.is_empty() {
            return Ok(());
        }

        let module_name = self.module_name.clone().unwrap_or_else(|| {
            self.files[0]
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("schema")
                .to_string()
        });

        let mut merged = self.parse_and_merge()?;
        if let Some(namespace) = self.namespace_override.clone() {
            merged.namespace = Some(namespace);
        }
        let validated = ValidatedSchema::validate(merged)?;

        std::fs::create_dir_all(out_dir)?;
        for target in self.targets.iter() {
            let source = codegen::generate(&validated, &module_name, *target);
            let path = out_dir.join(format!("{module_name}{}", target.file_extension()));
            std::fs::write(path, source)?;
        }

        Ok(())
    }

    fn parse_and_merge(&self) -> Result<ProtocolDefinition> {
        let mut merged = ProtocolDefinition {
            namespace: None,
            messages: Vec::new(),
            services: Vec::new(),
            options: std::collections::HashMap::new(),
        };

        for (i, file) in self.files.iter().enumerate() {
            let source = std::fs::read_to_string(file)?;
            let parsed = parse(&source)?;
            if i == 0 {
                merged.namespace = parsed.namespace;
            }
            merged.messages.extend(parsed.messages);
            merged.services.extend(parsed.services);
            merged.options.extend(parsed.options);
        }

        Ok(merged)
    }
}
