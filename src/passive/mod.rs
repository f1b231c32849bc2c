//! Passive Check Module
//!
//! A passive check is a request initiated by a server and answered within
//! the same exchange. This module turns one raw request into one response,
//! leaving transport concerns to the `connection` module and check
//! execution to the `scheduler` module.
//!
//! ## Example
//!
//! ```ignore
//! use checkd::passive::PassiveCheckHandler;
//! use checkd::scheduler::{register_builtin_checks, LocalScheduler};
//! use std::sync::Arc;
//!
//! let mut scheduler = LocalScheduler::default();
//! register_builtin_checks(&mut scheduler, "web-01");
//!
//! let handler = PassiveCheckHandler::new(Arc::new(scheduler), checkd::VERSION);
//!
//! // For each request read from a connection...
//! let dialect = handler.handle(&mut conn, &request).await;
//! ```

pub mod handler;

pub use handler::{PassiveCheckHandler, LEGACY_CHECK_TIMEOUT};
