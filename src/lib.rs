//! # checkd - A Passive-Check Monitoring Agent
//!
//! checkd answers passive checks: a monitoring server connects, asks for the
//! value of one item key, and the agent replies within the same exchange.
//! It speaks the Zabbix agent protocol in both of its dialects.
//!
//! ## Features
//!
//! - **Two dialects**: JSON requests get JSON replies, bare item keys get
//!   bare values or `ZBX_NOTSUPPORTED\0<message>`
//! - **Pluggable checks**: checks are registered with a scheduler that owns
//!   timeouts and per-key concurrency
//! - **Async I/O**: Built on Tokio, one task per server connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              checkd                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────────┐          │
//! │  │ TCP Server  │───>│ Passive     │───>│ PassiveCheckHandler │          │
//! │  │ (Listener)  │    │ Connection  │    │  (dialect dispatch) │          │
//! │  └─────────────┘    └─────────────┘    └──────────┬──────────┘          │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  Protocol   │    │              TaskScheduler                   │    │
//! │  │  frame /    │    │  ┌──────────┐ ┌──────────┐ ┌──────────────┐  │    │
//! │  │  dialects   │    │  │agent.ping│ │agent.*   │ │system.local..│  │    │
//! │  └─────────────┘    │  └──────────┘ └──────────┘ └──────────────┘  │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use checkd::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use checkd::passive::PassiveCheckHandler;
//! use checkd::scheduler::{register_builtin_checks, LocalScheduler};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut scheduler = LocalScheduler::default();
//!     register_builtin_checks(&mut scheduler, "web-01");
//!
//!     let handler = PassiveCheckHandler::new(Arc::new(scheduler), checkd::VERSION);
//!     let config = Arc::new(ConnectionConfig::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("0.0.0.0:10050").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             handler.clone(),
//!             Arc::clone(&config),
//!             Arc::clone(&stats),
//!         ));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: message types, dialect detection and transport framing
//! - [`scheduler`]: the task scheduler interface and the local implementation
//! - [`passive`]: the passive check handler
//! - [`connection`]: server connection management

pub mod connection;
pub mod passive;
pub mod protocol;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, ConnectionConfig, ConnectionStats};
pub use passive::PassiveCheckHandler;
pub use protocol::{decode_request, format_error, Dialect, Request};
pub use scheduler::{CallerClass, CheckError, LocalScheduler, TaskScheduler};

/// The default port the agent listens on
pub const DEFAULT_PORT: u16 = 10050;

/// The default host the agent binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of checkd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
