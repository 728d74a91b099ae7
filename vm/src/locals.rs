use crate::error::Trap;
use crate::value::Slot;

/// Local variable table: fixed-length indexed storage for a frame's
/// arguments and locals.
///
/// Every entry holds one [`Slot`]; a wide value occupies a single entry.
#[derive(Debug, Clone)]
pub struct LocalTable {
    slots: Vec<Slot>,
}

impl LocalTable {
    /// Creates a table with `count` entries, all empty.
    pub fn new(count: usize) -> Self {
        LocalTable {
            slots: vec![Slot::Empty; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot at the given index.
    pub fn get(&self, index: usize) -> Result<&Slot, Trap> {
        self.slots
            .get(index)
            .ok_or(Trap::LocalIndexOutOfBounds(index))
    }

    /// Loads a copy of the slot at the given index.
    pub fn load(&self, index: usize) -> Result<Slot, Trap> {
        self.get(index).cloned()
    }

    /// Stores a slot at the given index.
    pub fn store(&mut self, index: usize, value: Slot) -> Result<(), Trap> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(Trap::LocalIndexOutOfBounds(index))?;
        *slot = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}
