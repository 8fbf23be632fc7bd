//! Core Server Framework Module
//!
//! This module contains the core server implementation including:
//! - server.rs: JSON-RPC dispatch, tool registry, STDIO and HTTP transports
//! - reply.rs: the reply envelope every tool returns
//! - utils.rs: configuration, environment and logging setup

pub mod reply;
pub mod server;
pub mod utils;
