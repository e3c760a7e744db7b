use std::collections::HashMap;

use crate::descriptor::Descriptor;

/// One Table B element definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBEntry {
    pub name: String,
    pub unit: String,
    pub scale: i32,
    pub reference: i64,
    pub width: u32,
}

impl TableBEntry {
    pub fn is_ia5(&self) -> bool {
        self.unit.eq_ignore_ascii_case("CCITT IA5")
    }

    pub fn is_code_or_flag(&self) -> bool {
        let u = self.unit.to_ascii_lowercase();
        u.starts_with("code table") || u.starts_with("flag table")
    }
}

/// `(F,X,Y) -> TableBEntry` element dictionary.
#[derive(Debug, Clone, Default)]
pub struct TableB {
    entries: HashMap<Descriptor, TableBEntry>,
}

impl TableB {
    pub fn new() -> Self {
        TableB::default()
    }

    pub fn insert(&mut self, descriptor: Descriptor, entry: TableBEntry) {
        self.entries.insert(descriptor, entry);
    }

    pub fn get(&self, descriptor: Descriptor) -> Option<&TableBEntry> {
        self.entries.get(&descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlays `local` onto `self`: local entries replace matching keys,
    /// non-colliding keys are unioned. Neither input is mutated.
    pub fn overlay(&self, local: &TableB) -> TableB {
        let mut merged = self.entries.clone();
        for (k, v) in &local.entries {
            merged.insert(*k, v.clone());
        }
        TableB { entries: merged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(width: u32) -> TableBEntry {
        TableBEntry {
            name: "TEST".into(),
            unit: "M".into(),
            scale: 0,
            reference: 0,
            width,
        }
    }

    #[test]
    fn overlay_prefers_local_on_collision_and_unions_disjoint_keys() {
        let mut master = TableB::new();
        master.insert(Descriptor::new(0, 1, 1), entry(7));
        master.insert(Descriptor::new(0, 1, 2), entry(4));

        let mut local = TableB::new();
        local.insert(Descriptor::new(0, 1, 1), entry(10));
        local.insert(Descriptor::new(0, 9, 9), entry(5));

        let merged = master.overlay(&local);
        assert_eq!(merged.get(Descriptor::new(0, 1, 1)).unwrap().width, 10);
        assert_eq!(merged.get(Descriptor::new(0, 1, 2)).unwrap().width, 4);
        assert_eq!(merged.get(Descriptor::new(0, 9, 9)).unwrap().width, 5);
    }
}
