use std::{path::Path, sync::LazyLock};

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::group::GroupKey;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:,]").expect("valid regex"));

/// Removes whitespace, replaces colons and commas with `-`
pub fn sanitize_file_name(name: &str) -> String {
    let name = name.split_whitespace().collect::<String>();
    UNSAFE_FILENAME_CHARS.replace_all(&name, "-").into_owned()
}

/// `<timestamp>-<title>-<group key>.png`
pub fn report_file_name(now: DateTime<Local>, title: &str, key: &GroupKey) -> String {
    let stamp = now.format("%Y-%m-%d %H:%M:%S%.6f");
    sanitize_file_name(&format!("{stamp}-{title}-{}.png", key.file_tag()))
}

pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    tokio::fs::write(path, serde_json::to_string(value)?)
        .await
        .context(format!("Write {}", path.display()))
}
