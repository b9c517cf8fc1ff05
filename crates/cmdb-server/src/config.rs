//! Command-line and environment configuration.

use clap::Parser;
use cmdb::StoreConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server settings. Every flag can also be set through its environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "cmdb-server")]
#[command(about = "HTTP/JSON API for the configuration management database", long_about = None)]
#[command(version)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "CMDB_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Snapshot file, created on first save
    #[arg(long, env = "CMDB_DATA_FILE", default_value = "cmdb.bin")]
    pub data_file: PathBuf,

    /// Seconds between autosave checks
    #[arg(
        long,
        env = "CMDB_AUTOSAVE_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub autosave_secs: u64,

    /// Disable periodic autosave; changes are still saved on shutdown
    #[arg(long)]
    pub no_autosave: bool,
}

impl ServerConfig {
    /// Store options derived from the flags.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .autosave(!self.no_autosave)
            .autosave_interval(Duration::from_secs(self.autosave_secs))
    }
}
