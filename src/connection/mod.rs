//! Connection Handler Module
//!
//! This module manages individual server connections to the agent.
//! Each connection is handled by its own async task, allowing many
//! servers (or proxies) to poll the agent at once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each server...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PassiveConnection                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read frame  │───>│ Handle the  │───>│ Write framed│     │
//! │  │             │    │ check       │    │ response    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Both framings**: Accepts `ZBXD` framed and bare newline-terminated requests
//! - **Allow list**: Drops connections from unknown peers before reading
//! - **Statistics**: Tracks connection and per-dialect request counters
//!
//! ## Example
//!
//! ```ignore
//! use checkd::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use std::sync::Arc;
//!
//! let config = Arc::new(ConnectionConfig::default());
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), config, stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionConfig, ConnectionError, ConnectionHandle, ConnectionStats,
    PassiveConnection,
};
