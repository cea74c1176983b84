//! pincer gateway library
//!
//! Turns an authenticated, persistent connection to a chat-messaging
//! transport into a remote command execution channel: inbound messages are
//! classified into command namespaces, dispatched to handlers, and handler
//! results are sent back as outbound chat messages.

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod logging;
pub mod pairing;
pub mod session;
pub mod transport;
pub mod uploads;
