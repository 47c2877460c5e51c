//! ASH-010: Append-only JSONL run journal.

use crate::core::types::{RunEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// ISO 8601 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

/// Format seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_utc(secs: u64) -> String {
    let days = i64::try_from(secs / 86_400).unwrap_or(0);
    let rem = secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

// Proleptic Gregorian date from days since 1970-01-01 (era-based).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m as u32, d as u32)
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Journal path for a recipe.
pub fn journal_path(state_dir: &Path, recipe: &str) -> PathBuf {
    state_dir.join(recipe).join("events.jsonl")
}

/// Append one event to the recipe's journal.
pub fn append_event(state_dir: &Path, recipe: &str, event: RunEvent) -> Result<(), String> {
    let path = journal_path(state_dir, recipe);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("cannot create state dir: {}", e))?;
    }

    let line = serde_json::to_string(&TimestampedEvent {
        ts: now_iso8601(),
        event,
    })
    .map_err(|e| format!("JSON serialize error: {}", e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open journal {}: {}", path.display(), e))?;
    writeln!(file, "{}", line).map_err(|e| format!("write error: {}", e))
}

/// Read every event back, skipping lines that do not parse.
pub fn read_events(state_dir: &Path, recipe: &str) -> Result<Vec<TimestampedEvent>, String> {
    let path = journal_path(state_dir, recipe);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(content
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ash010_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_ash010_format_utc_known_instants() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_utc(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(format_utc(1_709_210_096), "2024-02-29T12:34:56Z");
        assert_eq!(format_utc(4_102_444_799), "2099-12-31T23:59:59Z");
    }

    #[test]
    fn test_ash010_generate_run_id() {
        let id = generate_run_id();
        assert!(id.starts_with("r-"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn test_ash010_journal_path() {
        let p = journal_path(Path::new("/state"), "deploy");
        assert_eq!(p, PathBuf::from("/state/deploy/events.jsonl"));
    }

    #[test]
    fn test_ash010_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        append_event(
            dir.path(),
            "demo",
            RunEvent::RunStarted {
                recipe: "demo".into(),
                run_id: "r-abc".into(),
                step_count: 2,
                ash_version: "1.1.0".into(),
            },
        )
        .unwrap();
        append_event(
            dir.path(),
            "demo",
            RunEvent::StepSkipped {
                run_id: "r-abc".into(),
                step: 1,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join("demo/events.jsonl")).unwrap();
        assert!(content.lines().next().unwrap().contains("\"event\":\"run_started\""));
        let events = read_events(dir.path(), "demo").unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1].event, RunEvent::StepSkipped { step: 1, .. }));
    }

    #[test]
    fn test_ash010_read_missing_journal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_events(dir.path(), "nothing").unwrap().is_empty());
    }
}
