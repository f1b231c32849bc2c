//! checkd - A Passive-Check Monitoring Agent
//!
//! This is the main entry point for the agent.
//! It sets up the scheduler, the TCP listener, and handles incoming server
//! connections.

use checkd::connection::{handle_connection, ConnectionConfig, ConnectionStats};
use checkd::passive::PassiveCheckHandler;
use checkd::scheduler::{
    register_builtin_checks, CallerClass, LocalScheduler, LocalSchedulerConfig, TaskScheduler,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Agent configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Name reported by agent.hostname
    hostname: String,
    /// Default item timeout in seconds
    timeout: u64,
    /// Servers allowed to connect
    allowed_peers: Vec<IpAddr>,
    /// Item key to run once and exit
    test_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: checkd::DEFAULT_HOST.to_string(),
            port: checkd::DEFAULT_PORT,
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            timeout: 3,
            allowed_peers: Vec::new(),
            test_key: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => config.host = v.clone(),
                ("--port" | "-p", Some(v)) => {
                    config.port = v.parse().unwrap_or_else(|_| fail("invalid port number"));
                }
                ("--hostname" | "-H", Some(v)) => config.hostname = v.clone(),
                ("--timeout" | "-T", Some(v)) => {
                    config.timeout = match v.parse::<u64>() {
                        Ok(secs @ 1..=30) => secs,
                        _ => fail("timeout must be between 1 and 30 seconds"),
                    };
                }
                ("--allow" | "-a", Some(v)) => {
                    let ip = v
                        .parse()
                        .unwrap_or_else(|_| fail(&format!("invalid address in --allow: {}", v)));
                    config.allowed_peers.push(ip);
                }
                ("--test" | "-t", Some(v)) => config.test_key = Some(v.clone()),
                ("--help", _) => {
                    print_help();
                    std::process::exit(0);
                }
                ("--version" | "-v", _) => {
                    println!("checkd version {}", checkd::VERSION);
                    std::process::exit(0);
                }
                (
                    "--host" | "-h" | "--port" | "-p" | "--hostname" | "-H" | "--timeout" | "-T"
                    | "--allow" | "-a" | "--test" | "-t",
                    None,
                ) => fail(&format!("{} requires a value", args[i])),
                (other, _) => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
            // every remaining option takes a value
            i += 2;
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"
checkd - A Passive-Check Monitoring Agent

USAGE:
    checkd [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>        Port to listen on (default: 10050)
    -H, --hostname <NAME>    Name reported by agent.hostname
    -T, --timeout <SECS>     Default item timeout, 1-30 (default: 3)
    -a, --allow <IP>         Accept connections only from this server
                             (repeatable; default: accept everyone)
    -t, --test <KEY>         Run one check, print the result and exit
    -v, --version            Print version information
        --help               Print this help message

EXAMPLES:
    checkd                             # Start on 0.0.0.0:10050
    checkd --allow 192.0.2.10          # Only answer one server
    checkd --test system.localtime     # Check a key locally

QUERYING:
    $ zabbix_get -s 127.0.0.1 -k agent.ping
    1
"#
    );
}

fn print_banner(config: &Config, metrics: &[&str]) {
    println!(
        r#"
checkd v{} - Passive-Check Monitoring Agent
──────────────────────────────────────────────
Listening on {}
Host name:   {}
Checks:      {}

Use Ctrl+C to shutdown gracefully.
"#,
        checkd::VERSION,
        config.bind_address(),
        config.hostname,
        metrics.join(", ")
    );
}

/// Runs a single check and prints it in `key [type|value]` form.
async fn run_test(scheduler: &LocalScheduler, key: &str) {
    let result = scheduler
        .perform_task(key, scheduler.default_timeout(), CallerClass::Local)
        .await;

    match result {
        Ok(value) => println!("{:<46}[s|{}]", key, value),
        Err(e) => println!(
            "{:<46}[m|{}] [{}]",
            key,
            checkd::protocol::NOT_SUPPORTED,
            e
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the scheduler (shared across all connections)
    let mut scheduler = LocalScheduler::new(LocalSchedulerConfig {
        default_timeout: Duration::from_secs(config.timeout),
    });
    register_builtin_checks(&mut scheduler, &config.hostname);

    if let Some(key) = &config.test_key {
        run_test(&scheduler, key).await;
        return Ok(());
    }

    print_banner(&config, &scheduler.metrics());
    info!(checks = scheduler.metrics().len(), "Scheduler initialized");

    let handler = PassiveCheckHandler::new(Arc::new(scheduler), checkd::VERSION);

    let connection_config = Arc::new(ConnectionConfig {
        allowed_peers: config.allowed_peers.clone(),
        ..ConnectionConfig::default()
    });

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping agent...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, handler, connection_config, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(std::sync::atomic::Ordering::Relaxed),
        requests = stats.requests_served(),
        "Agent shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    handler: PassiveCheckHandler,
    config: Arc<ConnectionConfig>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let config = Arc::clone(&config);
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, config, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
