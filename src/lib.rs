//! Voll.med Backend Library
//!
//! Stateless credential authentication and bearer-token gating for the
//! clinic API. Exposes the modules used by the `vollmed` binary and tests.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod server;

pub use server::build_router;
