//! Persistent relay state: the track history and a small key-value store

pub mod db;
pub mod error;
pub mod history;
pub mod operations;
pub(crate) mod schema;
