//! Metadata extraction utilities for product paths.
//!
//! Provides helpers to classify a path (folder, archive, plain file) and to
//! parse the compact date formats found in satellite product names.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;

/// Kind of container a product path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Extracted product folder
    Directory,
    /// Zip archive
    Zip,
    /// Uncompressed tarball
    Tar,
    /// Gzip-compressed tarball (.tar.gz, .tgz)
    TarGz,
    /// Any other single file
    File,
}

impl SourceKind {
    pub fn is_archive(&self) -> bool {
        matches!(self, SourceKind::Zip | SourceKind::Tar | SourceKind::TarGz)
    }
}

/// Detect the source kind from a path.
///
/// Existing directories are always [`SourceKind::Directory`]; for anything
/// else the extension decides.
pub fn detect_source_kind(path: &Path) -> SourceKind {
    if path.is_dir() {
        return SourceKind::Directory;
    }

    let lower = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if lower.ends_with(".zip") {
        SourceKind::Zip
    } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        SourceKind::TarGz
    } else if lower.ends_with(".tar") {
        SourceKind::Tar
    } else {
        SourceKind::File
    }
}

/// Remove a trailing archive extension (case-insensitive).
///
/// `"S2A_MSIL1C_..._20200518T120345.SAFE.zip"` becomes
/// `"S2A_MSIL1C_..._20200518T120345.SAFE"`. Other extensions are kept.
pub fn strip_archive_extension(name: &str) -> &str {
    for ext in [".tar.gz", ".tgz", ".tar", ".zip"] {
        let Some(split) = name.len().checked_sub(ext.len()) else {
            continue;
        };
        if let (Some(stem), Some(tail)) = (name.get(..split), name.get(split..)) {
            if tail.eq_ignore_ascii_case(ext) {
                return stem;
            }
        }
    }
    name
}

/// Terminal component of a `/`-separated member path.
pub fn terminal_component(member: &str) -> &str {
    member.rsplit('/').next().unwrap_or(member)
}

/// Parse `YYYYMMDDTHHMMSS`.
pub fn parse_compact_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()
}

/// Parse `YYYYMMDD` at midnight.
pub fn parse_compact_date(s: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(s, "%Y%m%d").ok()?;
    Some(date.and_time(NaiveTime::MIN))
}

/// Parse a year and day-of-year pair (`"2020"`, `"139"`) at midnight.
pub fn parse_year_doy(year: &str, doy: &str) -> Option<NaiveDateTime> {
    let year: i32 = year.parse().ok()?;
    let doy: u32 = doy.parse().ok()?;
    let date = NaiveDate::from_yo_opt(year, doy)?;
    Some(date.and_time(NaiveTime::MIN))
}

/// Parse a time of day such as `"10:20:31.4467290Z"` or `"10:20:31"`.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let trimmed = s.trim().trim_matches('"').trim_end_matches('Z');
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
}

/// Look up `KEY = value` in a Landsat-style ODL text block.
pub fn odl_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_detect_source_kind() {
        assert_eq!(detect_source_kind(Path::new("/x/a.zip")), SourceKind::Zip);
        assert_eq!(detect_source_kind(Path::new("/x/a.TAR")), SourceKind::Tar);
        assert_eq!(detect_source_kind(Path::new("/x/a.tar.gz")), SourceKind::TarGz);
        assert_eq!(detect_source_kind(Path::new("/x/a.tgz")), SourceKind::TarGz);
        assert_eq!(detect_source_kind(Path::new("/x/a.h5")), SourceKind::File);
        assert!(SourceKind::TarGz.is_archive());
        assert!(!SourceKind::File.is_archive());
    }

    #[test]
    fn test_strip_archive_extension() {
        assert_eq!(strip_archive_extension("LC08_x.tar"), "LC08_x");
        assert_eq!(strip_archive_extension("LC08_x.TAR.GZ"), "LC08_x");
        assert_eq!(strip_archive_extension("S2A_x.SAFE.zip"), "S2A_x.SAFE");
        assert_eq!(strip_archive_extension("HLS.S30.T31TCJ.v2.0"), "HLS.S30.T31TCJ.v2.0");
    }

    #[test]
    fn test_terminal_component() {
        assert_eq!(terminal_component("GRANULE/L1C_T31/IMG_DATA"), "IMG_DATA");
        assert_eq!(terminal_component("MTD_MSIL1C.xml"), "MTD_MSIL1C.xml");
    }

    #[test]
    fn test_parse_dates() {
        let dt = parse_compact_datetime("20200518T101120").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 5, 18));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 11, 20));

        let dt = parse_year_doy("2020", "139").unwrap();
        assert_eq!((dt.month(), dt.day()), (5, 18));

        assert!(parse_compact_date("20201345").is_none());
    }

    #[test]
    fn test_odl_value() {
        let mtl = "GROUP = IMAGE_ATTRIBUTES\n    DATE_ACQUIRED = 2020-05-18\n    SCENE_CENTER_TIME = \"10:20:31.4467290Z\"\n";
        assert_eq!(odl_value(mtl, "DATE_ACQUIRED"), Some("2020-05-18"));
        let t = parse_time_of_day(odl_value(mtl, "SCENE_CENTER_TIME").unwrap()).unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (10, 20, 31));
        assert_eq!(odl_value(mtl, "MISSING"), None);
    }
}
