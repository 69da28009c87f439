use anyhow::Result;
use clap::{ArgAction, Parser};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use db_bridge::config::{parse_flag, BridgeConfig, DatabaseConfig};
use db_bridge::{init, web};

#[derive(Parser)]
#[command(name = "db-bridge")]
#[command(about = "HTTP bridge that runs named-parameter SQL templates against a database")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BRIDGE_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "BRIDGE_PORT", default_value_t = 3001)]
    port: u16,

    /// Database driver identifier
    #[arg(long, env = "DB_DRIVER", default_value = "sqlite")]
    driver: String,

    /// Database server address
    #[arg(long, env = "DB_SERVER", default_value = "localhost")]
    server: String,

    /// Database name (for SQLite, the database file path)
    #[arg(long, env = "DB_DATABASE", default_value = "bridge.db")]
    database: String,

    /// Username for credential-based connections
    #[arg(long, env = "DB_USER")]
    user: Option<String>,

    /// Password for credential-based connections
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use integrated authentication when no credentials are given (yes/no)
    #[arg(long, env = "DB_TRUSTED_CONNECTION", default_value = "yes", value_parser = parse_flag, action = ArgAction::Set)]
    trusted_connection: bool,

    /// Trust the server certificate without validation (yes/no)
    #[arg(long, env = "DB_TRUST_SERVER_CERTIFICATE", default_value = "yes", value_parser = parse_flag, action = ArgAction::Set)]
    trust_server_certificate: bool,

    /// Seconds a session waits on a locked database
    #[arg(long, env = "DB_BUSY_TIMEOUT_SECS", default_value_t = 5)]
    busy_timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            listen: SocketAddr::new(self.host, self.port),
            database: DatabaseConfig {
                driver: self.driver,
                server: self.server,
                database: self.database,
                username: self.user,
                password: self.password,
                trusted_connection: self.trusted_connection,
                trust_server_certificate: self.trust_server_certificate,
                busy_timeout: Duration::from_secs(self.busy_timeout_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init::init_tracing("db_bridge")?;

    let config = Cli::parse().into_config();
    web::serve(config).await
}
