//! Database schema for per-task page databases

/// SQL schema for a task database
pub const SCHEMA_SQL: &str = r#"
-- Normalized HTML, one row per distinct document
CREATE TABLE IF NOT EXISTS html (
    html_hash TEXT PRIMARY KEY,
    normalized_html TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Extracted fields and provenance per stored page
CREATE TABLE IF NOT EXISTS details (
    html_hash TEXT PRIMARY KEY REFERENCES html(html_hash),
    tx_id TEXT,
    data_id TEXT,
    arns_name TEXT NOT NULL,
    wayfinder_url TEXT NOT NULL,
    gateway_url TEXT NOT NULL,
    charset TEXT NOT NULL,
    language TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    headers TEXT NOT NULL,
    open_graph TEXT NOT NULL,
    absolute_urls TEXT NOT NULL,
    relative_urls TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_details_wayfinder_url ON details(wayfinder_url);
CREATE INDEX IF NOT EXISTS idx_details_arns_name ON details(arns_name);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["html", "details"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
