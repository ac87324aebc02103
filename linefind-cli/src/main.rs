//! linefind-cli - Command-line client for linefind
//!
//! Sends each query on its own connection and prints the server's answer.

mod commands;

use clap::Parser;
use colored::Colorize;
use commands::{Outcome, Summary};
use linefind_client::{Client, ConnectionConfig, TlsClientConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linefind-cli")]
#[command(about = "Ask a linefind server whether strings are lines of its file")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080", env = "LINEFIND_SERVER")]
    server: SocketAddr,

    /// Read queries from stdin, one per line
    #[arg(long, conflicts_with = "queries")]
    stdin: bool,

    /// Print only the server's response lines
    #[arg(short, long)]
    raw: bool,

    /// Exit with status 2 if any query is not found
    #[arg(long)]
    fail_missing: bool,

    /// Connect and response timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    // ===== TLS Options =====
    /// Enable TLS connection
    #[arg(long, env = "LINEFIND_TLS")]
    tls: bool,

    /// Path to CA certificate for server verification
    #[arg(long, env = "LINEFIND_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Skip server certificate verification (INSECURE)
    #[arg(long, short = 'k')]
    insecure: bool,

    /// Server name for TLS SNI (defaults to the server IP)
    #[arg(long)]
    server_name: Option<String>,

    /// Strings to look up
    queries: Vec<String>,
}

impl Cli {
    fn connection_config(&self) -> ConnectionConfig {
        let timeout = Duration::from_secs(self.timeout);
        let mut config = ConnectionConfig::new(self.server)
            .with_connect_timeout(timeout)
            .with_response_timeout(timeout);

        if self.tls || self.ca_cert.is_some() || self.insecure {
            let mut tls = TlsClientConfig::new();
            tls.ca_cert_path = self.ca_cert.clone();
            tls.insecure = self.insecure;
            tls.server_name = self.server_name.clone();
            config = config.with_tls(tls);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let queries = if cli.stdin {
        match commands::read_queries(std::io::stdin().lock()) {
            Ok(queries) => queries,
            Err(e) => {
                eprintln!("{}: cannot read stdin: {}", "Error".red(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        cli.queries.clone()
    };

    if queries.is_empty() {
        eprintln!("{}: no queries given (pass QUERY... or --stdin)", "Error".red());
        return ExitCode::FAILURE;
    }

    let client = Client::new(cli.connection_config());
    let mut summary = Summary::default();

    for query in &queries {
        let result = client.query(query).await;
        let outcome = Outcome::from(&result);
        match result {
            Ok(answer) => println!("{}", commands::format_answer(query, answer, cli.raw)),
            Err(e) => eprintln!("{}", commands::format_failure(query, &e)),
        }
        summary.record(outcome);
    }

    if queries.len() > 1 && !cli.raw {
        eprintln!("{}", summary.to_string().dimmed());
    }

    ExitCode::from(summary.exit_code(cli.fail_missing))
}
