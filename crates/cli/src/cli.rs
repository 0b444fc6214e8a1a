use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::{Path, PathBuf};

/// appwarden: endpoint application monitor and block-policy enforcer
///
/// appwarden watches the process table, keeps a live inventory of
/// user-launched applications, terminates blocklisted ones and serves a local
/// control channel for querying and driving the engine.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the platform default location is checked
    /// (`config.toml` under the data root, plus `config.d/*.toml`
    /// overrides). If nothing exists, the default configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// Override the IPC listen address from the config file.
    #[arg(short, long)]
    pub listen: Option<String>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}
