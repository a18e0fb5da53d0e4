use std::fs::OpenOptions;
use std::path::PathBuf;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Connects to `dsn`, creating the sqlite file and its directory when needed.
///
/// In-memory sqlite is pinned to a single connection so every query sees the
/// same database.
pub async fn connect(dsn: &str) -> Result<DatabaseConnection, DbErr> {
    ensure_sqlite_file(dsn).map_err(|err| DbErr::Custom(format!("sqlite path: {err}")))?;
    let mut options = ConnectOptions::new(dsn.to_string());
    if is_sqlite_memory(dsn) {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);
    let connection = Database::connect(options).await?;
    info!(event = "storage.connected", backend = ?connection.get_database_backend());
    Ok(connection)
}

fn is_sqlite_memory(dsn: &str) -> bool {
    dsn.starts_with("sqlite:") && (dsn.contains(":memory:") || dsn.contains("mode=memory"))
}

fn ensure_sqlite_file(dsn: &str) -> std::io::Result<()> {
    if is_sqlite_memory(dsn) {
        return Ok(());
    }
    let Some(mut rest) = dsn.strip_prefix("sqlite:") else {
        return Ok(());
    };
    if let Some(stripped) = rest.strip_prefix("//") {
        rest = stripped;
    }
    if rest.is_empty() || rest.starts_with(":memory:") || rest.starts_with("memory:") {
        return Ok(());
    }

    let path_part = rest.split('?').next().unwrap_or("");
    if path_part.is_empty() {
        return Ok(());
    }

    let path = PathBuf::from(path_part);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_dsn_detection() {
        assert!(is_sqlite_memory("sqlite::memory:"));
        assert!(is_sqlite_memory("sqlite://file:gather?mode=memory&cache=shared"));
        assert!(!is_sqlite_memory("sqlite://data/gather.db"));
        assert!(!is_sqlite_memory("postgres://localhost/gather"));
    }

    #[test]
    fn non_sqlite_dsn_is_untouched() {
        assert!(ensure_sqlite_file("postgres://localhost/gather").is_ok());
        assert!(ensure_sqlite_file("sqlite::memory:").is_ok());
    }

    #[test]
    fn shared_memory_dsn_creates_no_file() {
        let dsn = "sqlite://file:gather_shared_mem?mode=memory&cache=shared";
        assert!(ensure_sqlite_file(dsn).is_ok());
        assert!(!std::path::Path::new("file:gather_shared_mem").exists());
    }
}
