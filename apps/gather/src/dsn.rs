use std::path::PathBuf;

/// Local sqlite database under the data directory.
pub(crate) fn default_dsn(data_dir: &str) -> String {
    let db_path = PathBuf::from(data_dir).join("gather.db");
    let db_path = db_path.to_string_lossy();
    if db_path.starts_with('/') {
        format!("sqlite:///{}", db_path.trim_start_matches('/'))
    } else {
        format!("sqlite://{db_path}")
    }
}
