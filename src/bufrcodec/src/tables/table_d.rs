use std::collections::HashMap;

use crate::descriptor::Descriptor;

/// `(F=3) -> [child descriptor...]` sequence dictionary.
#[derive(Debug, Clone, Default)]
pub struct TableD {
    entries: HashMap<Descriptor, Vec<Descriptor>>,
}

impl TableD {
    pub fn new() -> Self {
        TableD::default()
    }

    pub fn insert(&mut self, descriptor: Descriptor, children: Vec<Descriptor>) {
        self.entries.insert(descriptor, children);
    }

    pub fn get(&self, descriptor: Descriptor) -> Option<&[Descriptor]> {
        self.entries.get(&descriptor).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn overlay(&self, local: &TableD) -> TableD {
        let mut merged = self.entries.clone();
        for (k, v) in &local.entries {
            merged.insert(*k, v.clone());
        }
        TableD { entries: merged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_sequence_body_on_collision() {
        let mut master = TableD::new();
        let d = Descriptor::new(3, 1, 1);
        master.insert(d, vec![Descriptor::new(0, 1, 1)]);

        let mut local = TableD::new();
        local.insert(d, vec![Descriptor::new(0, 1, 1), Descriptor::new(0, 1, 2)]);

        let merged = master.overlay(&local);
        assert_eq!(merged.get(d).unwrap().len(), 2);
    }
}
