//! Shared helper functions for CLI commands

use chrono::{DateTime, Duration, NaiveDate, Utc};
use miette::{miette, IntoDiagnostic, Result};
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::core::{Config, Shop, SystemClock, TracingSink, YamlSource};

/// Data directory from `--data-dir` / `BODYSHOP_DATA_DIR`, else the cwd
pub fn data_dir(global: &GlobalOpts) -> Result<PathBuf> {
    match &global.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().into_diagnostic(),
    }
}

/// Open the shop over the YAML records in the data directory
pub fn open_shop(global: &GlobalOpts) -> Result<Shop> {
    let dir = data_dir(global)?;
    if !YamlSource::is_initialized(&dir) {
        return Err(miette!(
            help = "run `bodyshop init` first",
            "{} is not a bodyshop data directory",
            dir.display()
        ));
    }

    let config = Config::load(Some(&dir)).into_diagnostic()?;
    let shop = Shop::new(Arc::new(YamlSource::new(dir)), config, Arc::new(SystemClock))
        .into_diagnostic()?;
    shop.subscribe(Arc::new(TracingSink));
    Ok(shop)
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date: {}. Use YYYY-MM-DD or RFC 3339", s))
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `2h 05m`, `3d 4h`
pub fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}h {:02}m", hours, mins)
    }
}

/// Read ids from stdin when it is piped
///
/// ```bash
/// bodyshop opp list --status total-loss -o id | bodyshop opp archive
/// ```
pub fn read_ids_from_stdin() -> Option<Vec<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return None;
    }

    let ids: Vec<String> = stdin
        .lock()
        .lines()
        .map_while(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(
            parse_datetime("2024-01-05").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_datetime("2024-01-05T10:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 8, 30, 0).unwrap()
        );
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::minutes(125)), "2h 05m");
        assert_eq!(format_duration(Duration::hours(76)), "3d 4h");
        assert_eq!(format_duration(Duration::minutes(-5)), "0h 00m");
    }
}
