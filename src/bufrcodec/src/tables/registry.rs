use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::diagnostics;
use crate::error::{BufrError, Result};

use super::loader::{self, LocalKey};
use super::table_b::TableB;
use super::table_c::TableC;
use super::table_d::TableD;

/// Two-tier catalogue of Table B/C/D: a `master[version]` map (version 0 is
/// the WMO canonical set) and a `local[version][centre]` map of
/// augmentations, per §3/§4.3.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    master_b: BTreeMap<u32, TableB>,
    master_c: BTreeMap<u32, TableC>,
    master_d: BTreeMap<u32, TableD>,
    local_b: HashMap<LocalKey, TableB>,
    local_d: HashMap<LocalKey, TableD>,
}

/// The effective, per-message table pair handed to the descriptor expander.
/// Materialised fresh for one message and dropped at the end of it, so an
/// overlay is never observed by a later message (§4.3).
pub struct EffectiveTables {
    pub table_b: TableB,
    pub table_d: TableD,
}

fn pick_master<'a, T>(master: &'a BTreeMap<u32, T>, version: u32) -> Option<&'a T> {
    if let Some(t) = master.get(&version) {
        return Some(t);
    }
    if let Some((_, t)) = master.range(..=version).next_back() {
        return Some(t);
    }
    master.values().next_back()
}

fn pick_local<'a, T>(
    local: &'a HashMap<LocalKey, T>,
    version: u32,
    centre: u32,
) -> Option<&'a T> {
    local
        .get(&LocalKey {
            version,
            centre: Some(centre),
        })
        .or_else(|| {
            local.get(&LocalKey {
                version,
                centre: None,
            })
        })
}

impl TableRegistry {
    pub fn new() -> Self {
        TableRegistry::default()
    }

    pub fn register_master_b(&mut self, version: u32, table: TableB) {
        self.master_b.insert(version, table);
    }

    pub fn register_master_c(&mut self, version: u32, table: TableC) {
        self.master_c.insert(version, table);
    }

    pub fn register_master_d(&mut self, version: u32, table: TableD) {
        self.master_d.insert(version, table);
    }

    pub fn register_local_b(&mut self, key: LocalKey, table: TableB) {
        self.local_b.insert(key, table);
    }

    pub fn register_local_d(&mut self, key: LocalKey, table: TableD) {
        self.local_d.insert(key, table);
    }

    pub fn is_loaded(&self) -> bool {
        !self.master_b.is_empty()
    }

    /// Clears every registered table. Used by `update_tables`'
    /// clear-then-init sequence (§5): callers must fence this against
    /// concurrent decodes themselves, a `&mut self` receiver cannot enforce
    /// cross-call serialisation.
    pub fn clear(&mut self) {
        self.master_b.clear();
        self.master_c.clear();
        self.master_d.clear();
        self.local_b.clear();
        self.local_d.clear();
    }

    /// Resolves the effective Table B and Table D for one message declaring
    /// `(master_version, local_version, centre)`, per §4.3's three-step
    /// algorithm.
    pub fn resolve(
        &self,
        master_version: u32,
        local_version: u32,
        centre: u32,
    ) -> Result<EffectiveTables> {
        let base_b = pick_master(&self.master_b, master_version).ok_or(BufrError::TableLoadFailed)?;
        let base_d = pick_master(&self.master_d, master_version).ok_or(BufrError::TableLoadFailed)?;

        let table_b = match pick_local(&self.local_b, local_version, centre) {
            Some(local) => base_b.overlay(local),
            None => base_b.clone(),
        };
        let table_d = match pick_local(&self.local_d, local_version, centre) {
            Some(local) => base_d.overlay(local),
            None => base_d.clone(),
        };
        Ok(EffectiveTables { table_b, table_d })
    }

    /// Resolves the effective Table C, following the same rule as Table B/D
    /// even though no local Table C overlay is registered in practice (no
    /// `localtabc`/`bufrtabc` prefix is defined by §4.2).
    pub fn resolve_table_c(&self, master_version: u32) -> Result<TableC> {
        pick_master(&self.master_c, master_version)
            .cloned()
            .ok_or(BufrError::TableLoadFailed)
    }

    /// Populates the registry from a table directory, trying the vendored
    /// per-version-subdirectory layout first and falling back to the single
    /// WMO canonical file set registered at version 0 (§4.2, dialects 1-2),
    /// then folding in any local overrides found directly in `dir` (dialect 3).
    pub fn init_tables(&mut self, dir: &Path) -> Result<()> {
        self.load_into(dir)?;
        if !self.is_loaded() {
            diagnostics::push(format!(
                "{}: no master Table B registered after init",
                dir.display()
            ));
            return Err(BufrError::TableLoadFailed);
        }
        Ok(())
    }

    /// `clear` followed by `init_tables`. Not observed atomically by
    /// in-flight decodes (§5) — the caller must fence.
    pub fn update_tables(&mut self, dir: &Path) -> Result<()> {
        self.clear();
        self.init_tables(dir)
    }

    fn load_into(&mut self, dir: &Path) -> Result<()> {
        let wmo_b = dir.join("BUFRCREX_TableB_en.txt");
        let wmo_c = dir.join("BUFRCREX_CodeFlag_en.txt");
        let wmo_d = dir.join("BUFR_TableD_en.txt");
        let mut found_wmo = false;
        if wmo_b.is_file() {
            self.register_master_b(0, loader::load_table_b(&wmo_b)?);
            found_wmo = true;
        }
        if wmo_c.is_file() {
            self.register_master_c(0, loader::load_table_c(&wmo_c)?);
        }
        if wmo_d.is_file() {
            self.register_master_d(0, loader::load_table_d(&wmo_d)?);
        }

        if dir.is_dir() {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Ok(version) = name.parse::<u32>() else {
                    continue;
                };
                let (table_b, table_c, table_d) = loader::load_vendored_version(&path)?;
                if !table_b.is_empty() {
                    self.register_master_b(version, table_b);
                }
                if table_c.len() > 0 {
                    self.register_master_c(version, table_c);
                }
                if table_d.len() > 0 {
                    self.register_master_d(version, table_d);
                }
            }
        }

        let _ = found_wmo;
        let locals = loader::load_local_tables(dir)?;
        for (key, table) in locals.table_b {
            self.register_local_b(key, table);
        }
        for (key, table) in locals.table_d {
            self.register_local_d(key, table);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::tables::table_b::TableBEntry;

    fn entry(width: u32) -> TableBEntry {
        TableBEntry {
            name: "T".into(),
            unit: "M".into(),
            scale: 0,
            reference: 0,
            width,
        }
    }

    #[test]
    fn falls_back_to_highest_version_not_exceeding_request() {
        let mut reg = TableRegistry::new();
        let mut t0 = TableB::new();
        t0.insert(Descriptor::new(0, 1, 1), entry(7));
        reg.register_master_b(0, t0.clone());
        let mut t13 = TableB::new();
        t13.insert(Descriptor::new(0, 1, 1), entry(8));
        reg.register_master_b(13, t13);
        reg.register_master_d(0, TableD::new());
        reg.register_master_d(13, TableD::new());

        let eff = reg.resolve(20, 0, 0).unwrap();
        assert_eq!(eff.table_b.get(Descriptor::new(0, 1, 1)).unwrap().width, 8);
    }

    #[test]
    fn local_overlay_applies_only_to_matching_version_and_centre() {
        let mut reg = TableRegistry::new();
        let mut master = TableB::new();
        master.insert(Descriptor::new(0, 1, 1), entry(7));
        reg.register_master_b(0, master);
        reg.register_master_d(0, TableD::new());

        let mut local = TableB::new();
        local.insert(Descriptor::new(0, 1, 1), entry(10));
        reg.register_local_b(
            LocalKey {
                version: 1,
                centre: Some(98),
            },
            local,
        );

        let matching = reg.resolve(0, 1, 98).unwrap();
        assert_eq!(
            matching.table_b.get(Descriptor::new(0, 1, 1)).unwrap().width,
            10
        );

        let not_matching = reg.resolve(0, 1, 99).unwrap();
        assert_eq!(
            not_matching
                .table_b
                .get(Descriptor::new(0, 1, 1))
                .unwrap()
                .width,
            7
        );
    }

    #[test]
    fn empty_registry_is_table_load_failed() {
        let reg = TableRegistry::new();
        assert!(matches!(
            reg.resolve(0, 0, 0),
            Err(BufrError::TableLoadFailed)
        ));
    }
}
