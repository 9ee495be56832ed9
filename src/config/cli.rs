use crate::config::toml_config::AppConfig;
use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CSV_PATH: &str = "storage/app/private/ppp_world.csv";
pub const DEFAULT_DATABASE_PATH: &str = "storage/ppp.sqlite";

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "ppp-import")]
#[command(about = "Import the latest PPP conversion factors from CSV into the pricing dataset")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// CSV file to import (overrides import.csv_path)
    #[arg(long)]
    pub csv: Option<String>,

    /// SQLite database file (overrides database.path)
    #[arg(long)]
    pub database: Option<String>,

    /// Number of leading rows to skip (overrides import.header_rows)
    #[arg(long)]
    pub header_rows: Option<usize>,

    /// Parse and report without writing to the database
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 載入 TOML（若有指定），再套用命令列覆蓋設定
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::with_paths(DEFAULT_DATABASE_PATH, DEFAULT_CSV_PATH),
        };

        if let Some(csv) = &self.csv {
            config.import.csv_path = csv.clone();
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if let Some(header_rows) = self.header_rows {
            config.import.header_rows = Some(header_rows);
        }

        Ok(config)
    }
}
