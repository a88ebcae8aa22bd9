//! Config command implementation.

use anyhow::Context;
use clap::Args;
use deedlock_escrow::EscrowNodeConfig;
use std::path::PathBuf;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// TOML file layered over the defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the config command.
pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = EscrowNodeConfig::load(args.config.as_deref())
        .context("Failed to load node configuration")?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_run_with_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[registry]\nsymbol = \"HOME\"").unwrap();

        assert!(run(ConfigArgs {
            config: Some(file.path().to_path_buf()),
        })
        .is_ok());
    }

    #[test]
    fn test_run_with_missing_file() {
        let result = run(ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/deedlock.toml")),
        });

        assert!(result.is_err());
    }
}
