use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

const MAX_LOG_BYTES: u64 = 1_500_000;
const LOG_FILE: &str = "bridge-diagnostics.log";

#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub ts: String,
    pub kind: String,
    pub message: String,
}

/// Strips filesystem paths and phone-number-like tokens, including the user
/// part of JIDs, before anything reaches disk.
fn sanitize(input: &str) -> String {
    let mut out = input.to_string();
    for prefix in ["/home/", "/Users/", "/var/", "/private/", "C:\\"] {
        if let Some(idx) = out.find(prefix) {
            out.replace_range(idx.., "[redacted]");
            break;
        }
    }
    out.split_whitespace()
        .map(|token| {
            let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
            if digits < 7 {
                return token.to_string();
            }
            match token.split_once('@') {
                Some((_, server)) => format!("[redacted]@{}", server),
                None => "[redacted]".to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn log_event(log_dir: &Path, kind: &str, message: &str) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE);
    trim_log(&path)?;
    let event = LogEvent {
        ts: Utc::now().to_rfc3339(),
        kind: kind.to_string(),
        message: sanitize(message),
    };
    let line = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn trim_log(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if fs::metadata(path)?.len() <= MAX_LOG_BYTES {
        return Ok(());
    }
    let data = fs::read(path)?;
    let keep_from = data.len().saturating_sub((MAX_LOG_BYTES / 2) as usize);
    // resume on a line boundary so every kept line is valid JSON
    let keep_from = data[keep_from..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|pos| keep_from + pos + 1)
        .unwrap_or(data.len());
    fs::write(path, &data[keep_from..])?;
    Ok(())
}
