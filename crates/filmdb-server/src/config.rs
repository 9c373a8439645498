use std::path::PathBuf;

use crate::error::Result;
pub use clap::Parser;
use filmdb_app::state::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, clap::Parser)]
#[command(version, about)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 4000,
        env = "FILMDB_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "FILMDB_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        value_enum,
        default_value = "development",
        env = "FILMDB_ENV",
        help = "Operating environment"
    )]
    pub env: Environment,

    #[arg(
        long,
        env = "FILMDB_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db or similar, default is sqlite://[data-dir]/filmdb.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "FILMDB_DATA_DIR",
        help = "Data directory (database etc.), default is system default like ~/.local/share/filmdb",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "FILMDB_DB_MAX_CONNECTIONS",
        default_value_t = 25,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Maximum number of open database connections"
    )]
    pub db_max_connections: u32,

    #[arg(
        long,
        env = "FILMDB_DEFAULT_PAGE_SIZE",
        default_value_t = 20,
        value_parser = clap::value_parser!(u32).range(1..=1000),
        help = "Default page size"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "FILMDB_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("filmdb"))
        .unwrap_or_else(|| PathBuf::from("filmdb"))
        .to_string_lossy()
        .to_string()
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/filmdb.db?mode=rwc", self.data_dir))
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: config.default_page_size,
        }
    }
}
