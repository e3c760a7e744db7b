use std::collections::HashMap;

use crate::descriptor::Descriptor;

/// `(F,X,Y, code) -> label` code/flag table. Merge semantics are a union of
/// entries; on a collision the later-loaded value wins.
#[derive(Debug, Clone, Default)]
pub struct TableC {
    entries: HashMap<(Descriptor, u64), String>,
}

impl TableC {
    pub fn new() -> Self {
        TableC::default()
    }

    pub fn insert(&mut self, descriptor: Descriptor, code: u64, label: String) {
        self.entries.insert((descriptor, code), label);
    }

    pub fn get(&self, descriptor: Descriptor, code: u64) -> Option<&str> {
        self.entries.get(&(descriptor, code)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Union of `self` and `local`, with `local` winning on collision.
    pub fn overlay(&self, local: &TableC) -> TableC {
        let mut merged = self.entries.clone();
        merged.extend(local.entries.iter().map(|(k, v)| (*k, v.clone())));
        TableC { entries: merged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_insert_wins_on_collision() {
        let mut c = TableC::new();
        let d = Descriptor::new(0, 2, 1);
        c.insert(d, 1, "first".into());
        c.insert(d, 1, "second".into());
        assert_eq!(c.get(d, 1), Some("second"));
        assert_eq!(c.len(), 1);
    }
}
