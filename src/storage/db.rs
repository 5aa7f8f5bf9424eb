use std::path::Path;

use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StorageError, schema},
};

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(path)?)
}

pub fn open(config: &Database) -> Result<rusqlite::Connection, StorageError> {
    let db = match config {
        Database::InMemory => open_in_memory()?,
        Database::OnDisk { path } => open_from_file(path)?,
    };
    schema::init(&db)?;
    Ok(db)
}
