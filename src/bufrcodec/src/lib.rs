//! A bidirectional codec for the WMO FM-94 BUFR binary meteorological
//! message format, plus a Coverage-JSON -> BUFR domain mapping layer.
//!
//! [`Codec`] is the explicit, no-global-state entry point: it owns one
//! [`TableRegistry`] and every decode/encode call goes through it. The free
//! functions at the crate root (`load_tables`, `decode_file`, ...) are
//! process-wide convenience wrappers over a single lazily-built `Codec`
//! behind a mutex, for callers who don't need more than one table
//! generation loaded at a time — `Codec` itself carries no hidden state.

pub mod bitio;
pub mod codec;
pub mod descriptor;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod message;
pub mod oscar;
pub mod tables;
pub mod value;

use std::path::Path;
use std::sync::Mutex;

use descriptor::Descriptor;
use error::{BufrError, Result};
use message::Message;
use oscar::OscarDirectory;
use tables::{loader, EffectiveTables, TableB, TableRegistry};
use value::Value;

/// Owns one table generation and drives decode/encode against it. Never
/// shares state with another `Codec` instance — construct one per
/// independent caller, or share an `Arc<Mutex<Codec>>` across threads the
/// same way the process-wide wrappers do.
pub struct Codec {
    registry: TableRegistry,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Codec {
            registry: TableRegistry::new(),
        }
    }

    /// Populates the registry from `dir`. Idempotent once populated: a
    /// second call with tables already loaded is a no-op unless
    /// [`Codec::update_tables`] is called first (§6.4).
    pub fn load_tables(&mut self, dir: &Path) -> Result<()> {
        if self.registry.is_loaded() {
            return Ok(());
        }
        self.registry.init_tables(dir)
    }

    pub fn update_tables(&mut self, dir: &Path) -> Result<()> {
        self.registry.update_tables(dir)
    }

    /// Decodes every message in `bytes`, resynchronising at the next
    /// `BUFR` magic after any message-level failure (§7), and returns one
    /// domain-message string per subset across every message decoded.
    pub fn decode_buffer(&self, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let Some(start) = Message::find_next_magic(bytes, offset) else {
                break;
            };
            match Message::parse(&bytes[start..]) {
                Ok(msg) => {
                    offset = start + msg.section0.total_length as usize;
                    match self.registry.resolve(
                        msg.section1.master_version as u32,
                        msg.section1.local_version as u32,
                        msg.section1.centre as u32,
                    ) {
                        Ok(tables) => match codec::decode_subsets(
                            &msg.section3,
                            &msg.section4.data,
                            &tables,
                        ) {
                            Ok(subsets) => {
                                for subset in subsets {
                                    out.push(format_subset_compact(&subset, &tables.table_b));
                                }
                            }
                            Err(e) => diagnostics::push(format!(
                                "message at offset {start}: decode failed: {e}"
                            )),
                        },
                        Err(e) => diagnostics::push(format!(
                            "message at offset {start}: {e}"
                        )),
                    }
                }
                Err(e) => {
                    diagnostics::push(format!("offset {start}: {e}, resynchronising"));
                    offset = start + 4;
                }
            }
        }
        out
    }

    pub fn decode_file(&self, path: &Path) -> Vec<String> {
        match std::fs::read(path) {
            Ok(bytes) => self.decode_buffer(&bytes),
            Err(e) => {
                diagnostics::push(format!("{}: {e}", path.display()));
                Vec::new()
            }
        }
    }

    /// A human-readable dump of every subset in `path`: one `FXXYYY  NAME =
    /// value [UNIT]` line per element, a blank line between subsets.
    pub fn pretty_print(&self, path: &Path) -> String {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                diagnostics::push(format!("{}: {e}", path.display()));
                return String::new();
            }
        };
        let mut out = String::new();
        let mut offset = 0usize;
        while let Some(start) = Message::find_next_magic(&bytes, offset) {
            let msg = match Message::parse(&bytes[start..]) {
                Ok(m) => m,
                Err(e) => {
                    diagnostics::push(format!("offset {start}: {e}, resynchronising"));
                    offset = start + 4;
                    continue;
                }
            };
            offset = start + msg.section0.total_length as usize;
            let tables = match self.registry.resolve(
                msg.section1.master_version as u32,
                msg.section1.local_version as u32,
                msg.section1.centre as u32,
            ) {
                Ok(t) => t,
                Err(e) => {
                    diagnostics::push(format!("message at offset {start}: {e}"));
                    continue;
                }
            };
            let subsets = match codec::decode_subsets(&msg.section3, &msg.section4.data, &tables) {
                Ok(s) => s,
                Err(e) => {
                    diagnostics::push(format!("message at offset {start}: decode failed: {e}"));
                    continue;
                }
            };
            for subset in subsets {
                out.push_str(&format_subset_pretty(&subset, &tables.table_b));
                out.push('\n');
            }
        }
        out
    }

    /// Encodes `coverage_json_bytes` against an explicitly-supplied table
    /// pair, bypassing the environment-variable lookup the free function
    /// `encode` performs.
    pub fn encode(
        &self,
        coverage_json_bytes: &[u8],
        tables: &EffectiveTables,
        oscar: &OscarDirectory,
        section1: &message::Section1,
    ) -> Vec<u8> {
        encode_with_tables(coverage_json_bytes, tables, oscar, section1)
    }
}

fn format_value(entry: Option<&tables::TableBEntry>, value: &Value) -> String {
    match value {
        Value::Missing => "MISSING".to_string(),
        Value::Text(s) => s.clone(),
        Value::Code(c) => format!("{c}"),
        Value::Numeric(v) => match entry {
            Some(e) if !e.unit.is_empty() => format!("{v} {}", e.unit),
            _ => format!("{v}"),
        },
    }
}

fn format_subset_compact(subset: &[(Descriptor, Value)], table_b: &TableB) -> String {
    subset
        .iter()
        .map(|(d, v)| {
            let entry = table_b.get(*d);
            let name = entry.map(|e| e.name.as_str()).unwrap_or("UNKNOWN");
            format!("{name}={}", format_value(entry, v))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_subset_pretty(subset: &[(Descriptor, Value)], table_b: &TableB) -> String {
    subset
        .iter()
        .map(|(d, v)| {
            let entry = table_b.get(*d);
            let name = entry.map(|e| e.name.as_str()).unwrap_or("UNKNOWN");
            format!("{d}  {name}  = {}", format_value(entry, v))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the ephemeral, version-0 registry `encode`'s free-function entry
/// point uses, per the environment variables in §6.2. Reads
/// `BUFR_TABLE_DIR`/`BUFR_BTABLE_FILE`/`BUFR_DTABLE_FILE`, defaulting each
/// unset `*_FILE` to `<dir>/0/element.table` or `<dir>/0/sequence.def`.
fn tables_from_env() -> Result<EffectiveTables> {
    let dir = std::env::var("BUFR_TABLE_DIR").unwrap_or_else(|_| ".".to_string());
    let dir = Path::new(&dir);
    let _ctable_file = std::env::var("BUFR_CTABLE_FILE").ok();

    let btable_file = std::env::var("BUFR_BTABLE_FILE").ok().filter(|s| !s.is_empty());
    let b_path = btable_file
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| dir.join("0").join("element.table"));

    let dtable_file = std::env::var("BUFR_DTABLE_FILE").ok().filter(|s| !s.is_empty());
    let d_path = dtable_file
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| dir.join("0").join("sequence.def"));

    let table_b = loader::load_table_b(&b_path)?;
    if table_b.is_empty() {
        return Err(BufrError::TableLoadFailed);
    }
    let table_d = if d_path.is_file() {
        loader::load_table_d(&d_path)?
    } else {
        tables::TableD::new()
    };
    Ok(EffectiveTables { table_b, table_d })
}

fn encode_with_tables(
    coverage_json_bytes: &[u8],
    tables: &EffectiveTables,
    oscar: &OscarDirectory,
    section1: &message::Section1,
) -> Vec<u8> {
    let stations = match domain::coverage::parse_coverage_json(coverage_json_bytes) {
        Ok(s) => s,
        Err(e) => {
            diagnostics::push(format!("encode: {e}"));
            return Vec::new();
        }
    };
    let subset_values = domain::build_subset_values(&stations, oscar);
    if subset_values.is_empty() {
        diagnostics::push("encode: no (station, time) subsets produced from input".to_string());
        return Vec::new();
    }
    let descriptors = domain::top_level_descriptors();

    let mut section4_payload = Vec::new();
    for values in &subset_values {
        match codec::encode_subset_keyed(&descriptors, values.clone(), tables) {
            Ok(bytes) => section4_payload.extend_from_slice(&bytes),
            Err(e) => {
                diagnostics::push(format!("encode: subset failed: {e}"));
                return Vec::new();
            }
        }
    }

    let section3 = message::Section3 {
        subset_count: subset_values.len() as u16,
        observed: true,
        compressed: false,
        descriptors,
    };
    Message::encode(section1, None, &section3, &section4_payload)
}

fn default_section1() -> message::Section1 {
    message::Section1 {
        master_table: 0,
        centre: 0,
        sub_centre: 0,
        update_sequence: 0,
        has_section2: false,
        data_category: 0,
        international_subcategory: 0,
        local_subcategory: 0,
        master_version: 0,
        local_version: 0,
        year: 0,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    }
}

static CODEC: Mutex<Option<Codec>> = Mutex::new(None);

fn with_codec<R>(f: impl FnOnce(&mut Codec) -> R) -> R {
    let mut guard = CODEC.lock().unwrap();
    let codec = guard.get_or_insert_with(Codec::new);
    f(codec)
}

pub fn load_tables(dir: impl AsRef<Path>) -> Result<()> {
    with_codec(|c| c.load_tables(dir.as_ref()))
}

pub fn update_tables(dir: impl AsRef<Path>) -> Result<()> {
    with_codec(|c| c.update_tables(dir.as_ref()))
}

pub fn decode_file(path: impl AsRef<Path>) -> Vec<String> {
    with_codec(|c| c.decode_file(path.as_ref()))
}

pub fn decode_buffer(bytes: &[u8]) -> Vec<String> {
    with_codec(|c| c.decode_buffer(bytes))
}

pub fn pretty_print(path: impl AsRef<Path>) -> String {
    with_codec(|c| c.pretty_print(path.as_ref()))
}

/// Encodes a Coverage-JSON document into BUFR bytes, loading its own
/// ephemeral table pair from the `BUFR_TABLE_DIR`/`BUFR_*TABLE_FILE`
/// environment variables (§6.2) and an empty OSCAR directory. A failed
/// encode yields empty bytes and a log line (§7) rather than a `Result`.
pub fn encode(coverage_json_bytes: &[u8]) -> Vec<u8> {
    let tables = match tables_from_env() {
        Ok(t) => t,
        Err(e) => {
            diagnostics::push(format!("encode: {e}"));
            return Vec::new();
        }
    };
    encode_with_tables(
        coverage_json_bytes,
        &tables,
        &OscarDirectory::new(),
        &default_section1(),
    )
}

pub fn get_log() -> Vec<String> {
    diagnostics::get_log()
}

pub fn clear_log() {
    diagnostics::clear_log()
}
