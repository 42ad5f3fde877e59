use chrono::{TimeZone, Utc};
use medibot::archive::{Message, Transcript};
use medibot::auth::{Principal, SessionAuth};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// One-message transcript saved `saved_at` seconds after the epoch
#[allow(dead_code)]
pub fn sample_transcript(id: &str, title: &str, saved_at: i64) -> Transcript {
    let ts = Utc.timestamp_opt(saved_at, 0).unwrap();
    Transcript::new(
        id,
        "",
        title,
        vec![Message {
            text: "hi".to_string(),
            is_user: true,
            timestamp: ts,
        }],
        ts,
    )
}

#[allow(dead_code)]
pub fn signed_in(id: &str) -> Arc<SessionAuth> {
    Arc::new(SessionAuth::signed_in(Principal::new(id, None)))
}
