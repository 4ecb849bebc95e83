//! Directory-listing line parsers.
//!
//! Two wire formats are handled:
//! 1. **LIST** output, unix `ls -l` style or Windows/IIS style:
//!    `-rw-r--r-- 1 owner group 1234 Jan  1 12:00 file.txt`
//!    `01-01-26  12:00AM       1234 file.txt`
//! 2. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//!
//! LIST timestamps carry no timezone and often no year; they are
//! interpreted in the session's configured listing timezone, with the year
//! inferred so the result never lands in the future. MLSD `modify` facts
//! are always UTC.

use crate::error::{FtpError, FtpResult};
use crate::types::{Entry, EntryKind};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

/// Parser for one listing line. `now` anchors year inference and
/// `location` is the server's listing timezone.
pub(crate) type ParseFunc = fn(&str, DateTime<Utc>, FixedOffset) -> FtpResult<Entry>;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})[+@.]?\s+  # permissions
        \d+\s+                               # link count
        \S+\s+                               # owner
        \S+\s+                               # group
        (\d+)\s+                             # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+        # date
        (.+)$                                # name, possibly with -> target
        ",
    )
    .unwrap();
    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2})\s+              # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+         # time
        (<DIR>|\d+)\s+                       # size or <DIR>
        (.+)$                                # name
        ",
    )
    .unwrap();
}

/// Parse one LIST line, trying the unix format first, then Windows.
pub(crate) fn parse_list_line(
    line: &str,
    now: DateTime<Utc>,
    location: FixedOffset,
) -> FtpResult<Entry> {
    if let Some(entry) = parse_unix(line, now, location) {
        return Ok(entry);
    }
    if let Some(entry) = parse_windows(line, location) {
        return Ok(entry);
    }
    Err(FtpError::protocol_error(format!(
        "unsupported LIST line: {}",
        line
    )))
}

fn parse_unix(line: &str, now: DateTime<Utc>, location: FixedOffset) -> Option<Entry> {
    let caps = UNIX_RE.captures(line)?;

    let perms = caps.get(1)?.as_str();
    let size = caps.get(2)?.as_str().parse::<u64>().unwrap_or(0);
    let date_str = caps.get(3)?.as_str();
    let name_raw = caps.get(4)?.as_str();

    let kind = match perms.as_bytes().first() {
        Some(b'd') => EntryKind::Folder,
        Some(b'l') => EntryKind::Link,
        _ => EntryKind::File,
    };

    let (name, target) = if kind == EntryKind::Link {
        match name_raw.find(" -> ") {
            Some(pos) => (
                name_raw[..pos].to_string(),
                Some(name_raw[pos + 4..].to_string()),
            ),
            None => (name_raw.to_string(), None),
        }
    } else {
        (name_raw.to_string(), None)
    };

    Some(Entry {
        name,
        target,
        kind,
        size,
        modified: parse_unix_date(date_str, now, location),
    })
}

/// Parse "Jan  1 12:00" (year implied) or "Jan  1  2025" (midnight implied).
///
/// The year-less form names the most recent occurrence of that date: when
/// the inferred timestamp lands more than two days past `now` it belongs to
/// last year. The two-day slack absorbs clock skew between client and
/// server.
fn parse_unix_date(s: &str, now: DateTime<Utc>, location: FixedOffset) -> Option<DateTime<Utc>> {
    let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");

    let year = now.with_timezone(&location).year();
    if let Ok(naive) =
        NaiveDateTime::parse_from_str(&format!("{} {}", year, normalized), "%Y %b %d %H:%M")
    {
        let dt = location.from_local_datetime(&naive).single()?;
        let mut dt = dt.with_timezone(&Utc);
        if dt > now + Duration::days(2) {
            let last_year = naive.with_year(year - 1)?;
            dt = location
                .from_local_datetime(&last_year)
                .single()?
                .with_timezone(&Utc);
        }
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%b %d %Y") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(location.from_local_datetime(&naive).single()?.with_timezone(&Utc));
    }

    None
}

fn parse_windows(line: &str, location: FixedOffset) -> Option<Entry> {
    let caps = WINDOWS_RE.captures(line)?;

    let date_str = caps.get(1)?.as_str();
    let time_str = caps.get(2)?.as_str();
    let size_or_dir = caps.get(3)?.as_str();
    let name = caps.get(4)?.as_str().to_string();

    let (kind, size) = if size_or_dir == "<DIR>" {
        (EntryKind::Folder, 0)
    } else {
        (EntryKind::File, size_or_dir.parse::<u64>().unwrap_or(0))
    };

    Some(Entry {
        name,
        target: None,
        kind,
        size,
        modified: parse_windows_date(date_str, time_str, location),
    })
}

fn parse_windows_date(date: &str, time: &str, location: FixedOffset) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    let naive = NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %I:%M%p")
        .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %H:%M"))
        .ok()?;
    Some(location.from_local_datetime(&naive).single()?.with_timezone(&Utc))
}

// ─── MLSD facts ──────────────────────────────────────────────────────

/// Parse one MLSD line: semicolon-separated facts, then "; ", then the name.
///
/// `now` and `location` are unused — `modify` facts are absolute UTC — but
/// the signature matches [`ParseFunc`] so both parsers are interchangeable.
pub(crate) fn parse_mlsd_line(
    line: &str,
    _now: DateTime<Utc>,
    _location: FixedOffset,
) -> FtpResult<Entry> {
    let invalid = || FtpError::protocol_error(format!("unsupported MLSD line: {}", line));

    let (facts_str, name) = line.split_once("; ").ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }

    let mut kind = EntryKind::File;
    let mut target = None;
    let mut size = 0u64;
    let mut modified = None;

    for fact in facts_str.split(';') {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => {
                let value = value.to_ascii_lowercase();
                match value.as_str() {
                    "dir" | "cdir" | "pdir" => kind = EntryKind::Folder,
                    "file" => kind = EntryKind::File,
                    // ProFTPD emits "type=OS.unix=slink:<target>" for links.
                    _ if value.starts_with("os.unix=slink:") => {
                        kind = EntryKind::Link;
                        target = Some(fact["type=OS.unix=slink:".len()..].to_string());
                    }
                    "os.unix=symlink" => kind = EntryKind::Link,
                    _ => {}
                }
            }
            "size" | "sizd" => {
                size = value.parse().unwrap_or(0);
            }
            "modify" => {
                modified = parse_mlsd_time(value);
            }
            _ => {}
        }
    }

    Ok(Entry {
        name: name.to_string(),
        target,
        kind,
        size,
        modified,
    })
}

/// MLSD timestamp: `YYYYMMDDHHMMSS[.fff]`, always UTC.
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14).unwrap_or(s);
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[test]
    fn unix_file() {
        let entry = parse_list_line(
            "-rw-r--r--   1 user group  1234 Jan  1 12:00 readme.txt",
            at("2026-06-01T00:00:00Z"),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.name, "readme.txt");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, 1234);
        assert_eq!(entry.modified, Some(at("2026-01-01T12:00:00Z")));
    }

    #[test]
    fn unix_dir_and_symlink() {
        let now = at("2026-06-01T00:00:00Z");
        let dir = parse_list_line(
            "drwxr-xr-x   2 root root  4096 Mar  1 09:30 subdir",
            now,
            utc(),
        )
        .unwrap();
        assert_eq!(dir.kind, EntryKind::Folder);

        let link = parse_list_line(
            "lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target",
            now,
            utc(),
        )
        .unwrap();
        assert_eq!(link.kind, EntryKind::Link);
        assert_eq!(link.target.as_deref(), Some("/var/target"));
    }

    #[test]
    fn unix_yearless_date_never_lands_in_future() {
        // A December timestamp seen in January belongs to last year.
        let entry = parse_list_line(
            "-rw-r--r--   1 user group  10 Dec 24 18:00 notes.txt",
            at("2026-01-10T00:00:00Z"),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.modified, Some(at("2025-12-24T18:00:00Z")));
    }

    #[test]
    fn unix_explicit_year() {
        let entry = parse_list_line(
            "-rw-r--r--   1 user group  10 Jan  1  2024 old.txt",
            at("2026-06-01T00:00:00Z"),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.modified, Some(at("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn listing_timezone_applies() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let entry = parse_list_line(
            "-rw-r--r--   1 user group  10 Jun  1 12:00 f",
            at("2026-06-02T00:00:00Z"),
            tz,
        )
        .unwrap();
        assert_eq!(entry.modified, Some(at("2026-06-01T10:00:00Z")));
    }

    #[test]
    fn windows_dir_with_spaces() {
        let entry = parse_list_line(
            "01-01-26  12:00AM      <DIR> My Documents",
            at("2026-06-01T00:00:00Z"),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.kind, EntryKind::Folder);
        assert_eq!(entry.name, "My Documents");
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn unparseable_line() {
        assert!(parse_list_line("total 42", at("2026-06-01T00:00:00Z"), utc()).is_err());
    }

    #[test]
    fn mlsd_file() {
        let entry = parse_mlsd_line(
            "type=file;size=1024;modify=20260101120000; example.bin",
            Utc::now(),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.name, "example.bin");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, 1024);
        assert_eq!(entry.modified, Some(at("2026-01-01T12:00:00Z")));
    }

    #[test]
    fn mlsd_dir_kinds() {
        for ty in ["dir", "cdir", "pdir"] {
            let entry = parse_mlsd_line(&format!("type={}; x", ty), Utc::now(), utc()).unwrap();
            assert_eq!(entry.kind, EntryKind::Folder);
        }
    }

    #[test]
    fn mlsd_slink_carries_target() {
        let entry = parse_mlsd_line(
            "type=OS.unix=slink:/var/www;size=7; www",
            Utc::now(),
            utc(),
        )
        .unwrap();
        assert_eq!(entry.kind, EntryKind::Link);
        assert_eq!(entry.target.as_deref(), Some("/var/www"));
        assert_eq!(entry.name, "www");
    }

    #[test]
    fn mlsd_name_with_spaces() {
        let entry =
            parse_mlsd_line("type=file;size=1; name with spaces.txt", Utc::now(), utc()).unwrap();
        assert_eq!(entry.name, "name with spaces.txt");
    }

    #[test]
    fn mlsd_missing_separator() {
        assert!(parse_mlsd_line("type=file;size=1;name", Utc::now(), utc()).is_err());
    }
}
