use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "nexus", version)]
pub struct Args {
    /// Path to the gateway's YAML configuration file.
    #[arg(long, env = "CONFIG_FILE", default_value = "plexus.yaml")]
    pub config_file: PathBuf,

    /// Root directory for the persistence layer (usage, debug traces, classifier logs).
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Minimum log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
