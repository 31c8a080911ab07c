use std::path::{Path, PathBuf};

// Well-known filenames used within the data directory
const LIVE_DB_NAME: &str = "live.sqlite";
const UPLOAD_TMP_NAME: &str = "live.sqlite.tmp";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Path to the active database file inside the data directory.
pub fn live_db(data_dir: &Path) -> PathBuf {
    data_dir.join(LIVE_DB_NAME)
}

/// Staging path an upload is written to before the atomic rename.
pub fn upload_tmp(data_dir: &Path) -> PathBuf {
    data_dir.join(UPLOAD_TMP_NAME)
}

/// Path to the optional config file.
pub fn config_file(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}
