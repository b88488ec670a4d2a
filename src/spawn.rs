use std::collections::HashMap;

// ---------------------------------------------
// SPAWN SLOTS
// ---------------------------------------------
// Vessels spawn on a grid so two clients never drop a rover on top of each
// other. Freed slots are reused lowest-first.

#[derive(Debug)]
pub struct SpawnGrid {
    /// Slots per row
    pub columns: usize,
    /// Distance between slot centres, m
    pub spacing: f32,
    taken: HashMap<String, usize>,
}

impl SpawnGrid {
    pub fn new(columns: usize, spacing: f32) -> Self {
        Self {
            columns: columns.max(1),
            spacing,
            taken: HashMap::new(),
        }
    }

    fn position_of(&self, slot: usize) -> [f32; 3] {
        let col = (slot % self.columns) as f32;
        let row = (slot / self.columns) as f32;
        [col * self.spacing, 0.0, row * self.spacing]
    }

    /// Slot position for `id`, allocating on first use.
    pub fn assign(&mut self, id: &str) -> [f32; 3] {
        if let Some(&slot) = self.taken.get(id) {
            return self.position_of(slot);
        }
        let slot = (0..).find(|s| !self.taken.values().any(|t| t == s)).unwrap_or(self.taken.len());
        self.taken.insert(id.to_string(), slot);
        self.position_of(slot)
    }

    pub fn release(&mut self, id: &str) {
        self.taken.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slot_is_reused() {
        let mut grid = SpawnGrid::new(4, 8.0);
        let a = grid.assign("a");
        let b = grid.assign("b");
        assert_ne!(a, b);
        grid.release("a");
        assert_eq!(grid.assign("c"), a);
    }
}
