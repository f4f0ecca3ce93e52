//! acl-core: the AgentCore Local runtime.
//!
//! Agent loop, tools, conversation store, chat page and the axum server
//! that exposes them. Exposed as a library for integration testing.

pub mod agent;
pub mod agui;
pub mod cli;
pub mod config;
pub mod error;
pub mod page;
pub mod server;
pub mod store;
pub mod tools;
