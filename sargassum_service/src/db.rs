/// Database connection helpers.
///
/// Connections are opened explicitly from `ServiceConfig::database_url` and
/// handed to the repositories in `store::postgres`; nothing here keeps a
/// global handle.

use postgres::{Client, NoTls};

/// Schemas created by `sql/001_sargassum_schema.sql`.
pub const REQUIRED_SCHEMAS: &[&str] = &["sargassum"];

/// Opens a connection and checks that every schema in `schemas` exists.
///
/// The error string names the missing migration so operators can fix the
/// setup without digging through logs.
pub fn connect_and_verify(database_url: &str, schemas: &[&str]) -> Result<Client, String> {
    let mut client = Client::connect(database_url, NoTls)
        .map_err(|e| format!("Failed to connect to database: {}", e))?;

    for schema in schemas {
        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT FROM information_schema.schemata WHERE schema_name = $1
                )",
                &[schema],
            )
            .map_err(|e| format!("Failed to inspect schema '{}': {}", schema, e))?;
        let exists: bool = row.get(0);
        if !exists {
            return Err(format!(
                "Schema '{}' is missing. Apply migrations:\n  psql \"$DATABASE_URL\" -f sql/001_sargassum_schema.sql",
                schema
            ));
        }
    }

    Ok(client)
}
