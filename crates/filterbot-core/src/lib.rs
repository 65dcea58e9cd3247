//! filterbot-core — chat filter engine, no transport.
//!
//! Per-chat trigger → reply filters, the guided form admins use to author
//! them, and the JSON snapshot that keeps them across restarts. Frontends
//! implement [`gateway::ChatGateway`] and feed messages to
//! [`bot::FilterBot::handle`].

pub mod bot;
pub mod buttons;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod images;
pub mod matcher;
pub mod messages;
pub mod permissions;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod timeout;
pub mod types;

#[cfg(test)]
mod test_support;
