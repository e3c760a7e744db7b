//! OSCAR station directory (§6.3): an opaque `wigosId -> station metadata`
//! map used to enrich the domain message builder's block/station number and
//! elevation fields. Parsed the same tolerant, skip-and-log way as the
//! Table B/C/D loaders (`tables::loader`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::diagnostics;
use crate::error::Result;

/// One OSCAR station record. Every field is optional: a record built from a
/// malformed or sparse line carries `None` for what could not be parsed,
/// and a miss on [`OscarDirectory::lookup`] returns [`OscarRecord::missing`]
/// — all `None` — never an error (§6.3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OscarRecord {
    pub block: Option<u32>,
    pub station: Option<u32>,
    pub name: Option<String>,
    pub station_type: Option<String>,
    pub elevation: Option<f64>,
}

impl OscarRecord {
    pub fn missing() -> Self {
        OscarRecord::default()
    }
}

/// `wigosId -> OscarRecord` directory, loaded once from a caller-supplied
/// path.
#[derive(Debug, Clone, Default)]
pub struct OscarDirectory {
    stations: HashMap<String, OscarRecord>,
}

impl OscarDirectory {
    pub fn new() -> Self {
        OscarDirectory::default()
    }

    /// Lookups are pure and side-effect free; a miss resolves to an
    /// all-MISSING record rather than an error.
    pub fn lookup(&self, wigos_id: &str) -> OscarRecord {
        self.stations.get(wigos_id).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, wigos_id: String, record: OscarRecord) {
        self.stations.insert(wigos_id, record);
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

fn parse_fields(line: &str) -> Vec<String> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads a directory from a `wigosId, block, station, name, type, elevation`
/// text file, one record per line. Blank lines and `#`-prefixed comments
/// are skipped; a line with fewer than the `wigosId` field, or with
/// unparseable numeric fields, is kept but with the offending fields left
/// `None` and a diagnostic line emitted — it is never fatal to the load.
pub fn load_oscar(path: &Path) -> Result<OscarDirectory> {
    let text = fs::read_to_string(path)?;
    let mut dir = OscarDirectory::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = parse_fields(line);
        let Some(wigos_id) = fields.first() else {
            diagnostics::push(format!(
                "{}:{}: OSCAR line has no wigosId field",
                path.display(),
                lineno + 1
            ));
            continue;
        };
        let record = OscarRecord {
            block: fields.get(1).and_then(|s| s.parse().ok()),
            station: fields.get(2).and_then(|s| s.parse().ok()),
            name: fields.get(3).cloned(),
            station_type: fields.get(4).cloned(),
            elevation: fields.get(5).and_then(|s| s.parse().ok()),
        };
        if fields.len() < 6 {
            diagnostics::push(format!(
                "{}:{}: OSCAR line has {} of 6 expected fields",
                path.display(),
                lineno + 1,
                fields.len()
            ));
        }
        dir.insert(wigos_id.clone(), record);
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_well_formed_lines_and_skips_comments() {
        let mut f = tempfile_with(
            "# comment\n0-20000-0-12345, 12, 345, TESTSTN, land, 42.5\n\n",
        );
        let dir = load_oscar(f.path()).unwrap();
        let rec = dir.lookup("0-20000-0-12345");
        assert_eq!(rec.block, Some(12));
        assert_eq!(rec.station, Some(345));
        assert_eq!(rec.name.as_deref(), Some("TESTSTN"));
        assert_eq!(rec.elevation, Some(42.5));
        f.close_and_forget();
    }

    #[test]
    fn lookup_miss_returns_all_missing_record() {
        let dir = OscarDirectory::new();
        assert_eq!(dir.lookup("not-present"), OscarRecord::missing());
    }

    #[test]
    fn sparse_line_keeps_record_with_none_fields() {
        let mut f = tempfile_with("0-20000-0-1, 7\n");
        let dir = load_oscar(f.path()).unwrap();
        let rec = dir.lookup("0-20000-0-1");
        assert_eq!(rec.block, Some(7));
        assert_eq!(rec.station, None);
        f.close_and_forget();
    }

    struct TempFile {
        path: std::path::PathBuf,
        forgotten: bool,
    }
    impl TempFile {
        fn path(&self) -> &std::path::Path {
            &self.path
        }
        fn close_and_forget(&mut self) {
            self.forgotten = true;
        }
    }
    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }
    fn tempfile_with(contents: &str) -> TempFile {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "bufrcodec_oscar_test_{}_{}.txt",
            std::process::id(),
            n
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        TempFile {
            path,
            forgotten: false,
        }
    }
}
