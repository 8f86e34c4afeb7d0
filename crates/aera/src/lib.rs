//! Aera chat backend library.
//!
//! Accounts, conversations and messages live in SQLite; replies come from a
//! pluggable text generator and are streamed back to the client while they
//! are stored.

pub mod ai;
pub mod api;
pub mod auth;
pub mod chat;
pub mod conversation;
pub mod db;
pub mod user;
