use rusqlite::Connection;

pub mod tables {
    pub const HISTORY: &str = "history";
    pub const STATE: &str = "state";

    #[cfg(test)]
    pub const ALL_TABLES: &[&str] = &[HISTORY, STATE];
}

pub mod columns {
    pub const ID: &str = "id";
    pub const ENTRY: &str = "entry";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

pub mod keys {
    pub const LAST_TRACK: &str = "last_track";
    pub const WEBSOCKET_CONNECTED: &str = "websocket_connected";
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
