use std::process::ExitCode;

use clap::Parser;
use log::error;

use pdl_codegen::config::GeneratorConfig;
use pdl_codegen::{CodegenError, Compiler};

#[derive(Parser)]
#[command(about = "Compiles BitRPC .pdl schemas into target-language source")]
struct Cli {
    /// Path to a JSON generator config (see config::GeneratorConfig).
    config: std::path::PathBuf,
}

const EXIT_OK: u8 = 0;
const EXIT_SCHEMA_ERROR: u8 = 1;
const EXIT_IO_ERROR: u8 = 2;
const EXIT_UNKNOWN_TARGET: u8 = 3;

fn main() -> ExitCode {
    env_logger::init();
    let args = Cli::parse();

    match run(&args.config) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            error!("{e}");
            ExitCode::from(match e {
                CodegenError::Schema(_)
                | CodegenError::UndefinedName(_)
                | CodegenError::DuplicateMessage(_)
                | CodegenError::DuplicateFieldId(_, _)
                | CodegenError::FieldIdTooLarge(_, _) => EXIT_SCHEMA_ERROR,
                CodegenError::UnknownTarget(_) => EXIT_UNKNOWN_TARGET,
                CodegenError::Io(_) => EXIT_IO_ERROR,
            })
        }
    }
}

fn run(config_path: &std::path::Path) -> Result<(), CodegenError> {
    let config_dir = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let contents = std::fs::read_to_string(config_path)?;
    let config = GeneratorConfig::from_str(&contents)?;
    let resolved = config.resolved_targets()?;

    let schema_path = config_dir.join(&config.schema);
    for (target, target_config) in resolved {
        let mut compiler = Compiler::new().file(schema_path.clone()).target(target);
        if let Some(name) = target_config.module_name.as_ref() {
            compiler = compiler.module_name(name.clone());
        }
        if let Some(namespace) = target_config.namespace.as_ref() {
            compiler = compiler.namespace(namespace.clone());
        }
        let out_dir = config_dir.join(&target_config.out_dir);
        compiler.run_into(&out_dir)?;

        if let Some(runtime_source) = target_config.runtime_source_path.as_ref() {
            copy_runtime(&config_dir.join(runtime_source), &out_dir.join("runtime"))?;
        }
    }

    Ok(())
}

/// Recursively copies a language runtime's source tree into `dest`, plain
/// `std::fs` calls in the teacher's style (no `fs_extra`).
fn copy_runtime(src: &std::path::Path, dest: &std::path::Path) -> Result<(), CodegenError> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_runtime(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}
