//! Config command implementation.
//!
//! Shows, validates and writes engine configuration files.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use folio_config::{ConfigError, EngineConfig};

use crate::cli::OutputFormat;
use crate::commands::GlobalOptions;
use crate::error::CliError;
use crate::output::{print_error, print_json_document, print_success, print_warning};

/// Default file written by `config init`.
const DEFAULT_CONFIG_FILE: &str = "folio.toml";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Check a configuration file without running anything
    Validate(ValidateArgs),

    /// Write the default configuration to a file
    Init(InitArgs),
}

/// Arguments for validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file to check
    pub path: PathBuf,
}

/// Arguments for init subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Destination file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, global: &GlobalOptions) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show(global),
        ConfigCommand::Validate(args) => validate(&args, global),
        ConfigCommand::Init(args) => init(&args, global),
    }
}

fn show(global: &GlobalOptions) -> Result<()> {
    let config = global.engine_config()?;
    match global.format {
        OutputFormat::Json => print_json_document(&config),
        _ => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn validate(args: &ValidateArgs, global: &GlobalOptions) -> Result<()> {
    match EngineConfig::from_file(&args.path) {
        Ok(_) => {
            if !global.quiet {
                print_success(&format!("{} is valid", args.path.display()));
            }
            Ok(())
        }
        Err(ConfigError::MultipleValidationErrors(errors)) => {
            for error in &errors {
                print_error(&error.to_string());
            }
            bail!("{} has {} invalid setting(s)", args.path.display(), errors.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn init(args: &InitArgs, global: &GlobalOptions) -> Result<()> {
    if args.path.exists() {
        if !args.force {
            return Err(CliError::FileExists(args.path.display().to_string()).into());
        }
        if !global.quiet {
            print_warning(&format!("overwriting {}", args.path.display()));
        }
    }

    std::fs::write(&args.path, EngineConfig::default().to_toml_string()?)?;
    if !global.quiet {
        print_success(&format!("wrote {}", args.path.display()));
    }
    Ok(())
}
