//! Table-file parsers. Every parser here is line-oriented and tolerant: a
//! line that doesn't fit the expected shape is logged to the diagnostic
//! channel and skipped rather than aborting the whole file, per §4.2's
//! failure policy. An empty master set after the caller finishes loading is
//! the one fatal condition, surfaced by the registry (`BufrError::TableLoadFailed`),
//! not by these parsers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::Descriptor;
use crate::diagnostics;
use crate::error::{BufrError, Result};

use super::table_b::{TableB, TableBEntry};
use super::table_c::TableC;
use super::table_d::TableD;

/// Splits a table-file line on whichever delimiter it actually uses
/// (`;` for the WMO CSV dialect, `|` for the vendored `element.table`
/// dialect), trimming surrounding quotes and whitespace from each field.
fn split_fields(line: &str) -> Vec<String> {
    let delim = if line.contains(';') {
        ';'
    } else if line.contains('|') {
        '|'
    } else {
        return line.split_whitespace().map(str::to_string).collect();
    };
    line.split(delim)
        .map(|f| f.trim().trim_matches('"').to_string())
        .collect()
}

fn parse_descriptor_field(field: &str) -> Option<Descriptor> {
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 6 {
        return None;
    }
    Descriptor::from_fxxyyy(&digits)
}

fn note_skip(path: &Path, line_no: usize) {
    let err = BufrError::ParseError {
        path: path.display().to_string(),
        line: line_no,
    };
    diagnostics::push(err.to_string());
}

/// Parses a Table B file (either `BUFRCREX_TableB_en.txt` or a vendored
/// `element.table`). Expected fields, in order, after the descriptor column:
/// name, unit, scale, reference, width.
pub fn load_table_b(path: &Path) -> Result<TableB> {
    let text = fs::read_to_string(path)?;
    let mut table = TableB::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_fields(line);
        let parsed = (|| {
            let descriptor = parse_descriptor_field(fields.first()?)?;
            let name = fields.get(1)?.clone();
            let unit = fields.get(2)?.clone();
            let scale: i32 = fields.get(3)?.parse().ok()?;
            let reference: i64 = fields.get(4)?.parse().ok()?;
            let width: u32 = fields.get(5)?.parse().ok()?;
            Some((
                descriptor,
                TableBEntry {
                    name,
                    unit,
                    scale,
                    reference,
                    width,
                },
            ))
        })();
        match parsed {
            Some((descriptor, entry)) => table.insert(descriptor, entry),
            None => note_skip(path, i + 1),
        }
    }
    Ok(table)
}

/// Parses a Table C code/flag file: descriptor, code, label.
pub fn load_table_c(path: &Path) -> Result<TableC> {
    let text = fs::read_to_string(path)?;
    let mut table = TableC::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_fields(line);
        let parsed = (|| {
            let descriptor = parse_descriptor_field(fields.first()?)?;
            let code: u64 = fields.get(1)?.parse().ok()?;
            let label = fields.get(2..)?.join(" ").trim().to_string();
            if label.is_empty() {
                return None;
            }
            Some((descriptor, code, label))
        })();
        match parsed {
            Some((descriptor, code, label)) => table.insert(descriptor, code, label),
            None => note_skip(path, i + 1),
        }
    }
    Ok(table)
}

/// Parses every `*.table`/`*.txt` file directly inside a `codetables/`
/// directory (the vendored dialect keeps one file per descriptor rather
/// than one combined file).
pub fn load_table_c_dir(dir: &Path) -> Result<TableC> {
    let mut merged = TableC::new();
    if !dir.is_dir() {
        return Ok(merged);
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();
    for path in entries {
        merged = merged.overlay(&load_table_c(&path)?);
    }
    Ok(merged)
}

/// Parses a Table D sequence file (`BUFR_TableD_en.txt` or `sequence.def`):
/// one row per (sequence descriptor, child descriptor) pair; rows sharing a
/// sequence descriptor accumulate in file order.
pub fn load_table_d(path: &Path) -> Result<TableD> {
    let text = fs::read_to_string(path)?;
    let mut table = TableD::new();
    let mut order: Vec<Descriptor> = Vec::new();
    let mut children: std::collections::HashMap<Descriptor, Vec<Descriptor>> =
        std::collections::HashMap::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_fields(line);
        if fields.len() < 2 {
            note_skip(path, i + 1);
            continue;
        }
        let seq = parse_descriptor_field(&fields[0]);
        let seq = match seq {
            Some(d) => d,
            None => {
                note_skip(path, i + 1);
                continue;
            }
        };
        let rest = &fields[1..];
        let parsed_children: Vec<Descriptor> =
            rest.iter().filter_map(|f| parse_descriptor_field(f)).collect();
        if parsed_children.is_empty() {
            note_skip(path, i + 1);
            continue;
        }
        if !children.contains_key(&seq) {
            order.push(seq);
        }
        children.entry(seq).or_default().extend(parsed_children);
    }

    for seq in order {
        if let Some(kids) = children.remove(&seq) {
            table.insert(seq, kids);
        }
    }
    Ok(table)
}

/// Loads one master version directory of the vendored layout:
/// `<dir>/<version>/element.table`, `<dir>/<version>/codetables/*`,
/// `<dir>/<version>/sequence.def`.
pub fn load_vendored_version(dir: &Path) -> Result<(TableB, TableC, TableD)> {
    let b_path = dir.join("element.table");
    let table_b = if b_path.is_file() {
        load_table_b(&b_path)?
    } else {
        TableB::new()
    };
    let table_c = load_table_c_dir(&dir.join("codetables"))?;
    let d_path = dir.join("sequence.def");
    let table_d = if d_path.is_file() {
        load_table_d(&d_path)?
    } else {
        TableD::new()
    };
    Ok((table_b, table_c, table_d))
}

/// The `(local version, originating centre)` key recovered from a local
/// table filename. `centre = None` means the file is centre-agnostic and
/// applies to any originating centre declaring that local version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalKey {
    pub version: u32,
    pub centre: Option<u32>,
}

enum LocalTableKind {
    B,
    D,
}

fn local_prefix_kind(stem: &str) -> Option<LocalTableKind> {
    let lower = stem.to_ascii_lowercase();
    if lower.starts_with("localtabb") || lower.starts_with("bufrtabb") {
        Some(LocalTableKind::B)
    } else if lower.starts_with("localtabd") || lower.starts_with("bufrtabd") {
        Some(LocalTableKind::D)
    } else {
        None
    }
}

/// Splits `<prefix>_<centre>_<version>` or `<prefix>_<version>` into a key,
/// per §4.2's filename convention (split on `_` then `.`).
fn parse_local_key(stem: &str) -> Option<LocalKey> {
    let mut parts = stem.split('_');
    parts.next()?; // prefix
    let rest: Vec<&str> = parts.collect();
    match rest.len() {
        1 => Some(LocalKey {
            version: rest[0].parse().ok()?,
            centre: None,
        }),
        2 => Some(LocalKey {
            version: rest[1].parse().ok()?,
            centre: Some(rest[0].parse().ok()?),
        }),
        _ => None,
    }
}

/// Local table files discovered in a directory, keyed by `LocalKey`.
#[derive(Debug, Clone, Default)]
pub struct LocalTables {
    pub table_b: std::collections::HashMap<LocalKey, TableB>,
    pub table_d: std::collections::HashMap<LocalKey, TableD>,
}

/// Scans `dir` for files matching the well-known local-table prefixes and
/// loads each one. Files matching no prefix are ignored (not traversal in
/// the general sense, since only these fixed names are ever looked for).
pub fn load_local_tables(dir: &Path) -> Result<LocalTables> {
    let mut out = LocalTables::default();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(kind) = local_prefix_kind(stem) else {
            continue;
        };
        let Some(key) = parse_local_key(stem) else {
            diagnostics::push(format!(
                "{}: local table filename does not match <prefix>_[centre_]version convention",
                path.display()
            ));
            continue;
        };
        match kind {
            LocalTableKind::B => {
                out.table_b.insert(key, load_table_b(&path)?);
            }
            LocalTableKind::D => {
                out.table_d.insert(key, load_table_d(&path)?);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_local_filename_with_centre() {
        assert_eq!(
            parse_local_key("localtabb_98_14"),
            Some(LocalKey {
                version: 14,
                centre: Some(98)
            })
        );
    }

    #[test]
    fn splits_local_filename_centre_agnostic() {
        assert_eq!(
            parse_local_key("bufrtabd_7"),
            Some(LocalKey {
                version: 7,
                centre: None
            })
        );
    }

    #[test]
    fn recognises_prefix_kind_case_insensitively() {
        assert!(matches!(
            local_prefix_kind("LocalTabB_0_1"),
            Some(LocalTableKind::B)
        ));
        assert!(matches!(
            local_prefix_kind("bufrtabd_2"),
            Some(LocalTableKind::D)
        ));
        assert!(local_prefix_kind("element.table").is_none());
    }
}
