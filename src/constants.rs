//! Constant interning table.

use crate::address::{Address, AddressOverflow, VirtualAddressManager};
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ConstantEntry {
    pub value: String,
    pub ty: Type,
    pub address: Address,
}

/// Interns literal values by `(value, type)` so that `1` appearing twice in a
/// program occupies a single constant-segment slot.
#[derive(Debug, Default)]
pub struct ConstantTable {
    entries: HashMap<(String, Type), Address>,
    order: Vec<(String, Type)>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the address for `value`/`ty`, allocating a new one on first sight.
    pub fn intern(
        &mut self,
        value: &str,
        ty: Type,
        addresses: &mut VirtualAddressManager,
    ) -> Result<Address, AddressOverflow> {
        let key = (value.to_string(), ty);
        if let Some(&addr) = self.entries.get(&key) {
            return Ok(addr);
        }
        let addr = addresses.next_constant()?;
        self.entries.insert(key.clone(), addr);
        self.order.push(key);
        Ok(addr)
    }

    /// All entries in insertion order, for deterministic serialization.
    pub fn entries(&self) -> Vec<ConstantEntry> {
        self.order
            .iter()
            .map(|key| ConstantEntry {
                value: key.0.clone(),
                ty: key.1,
                address: self.entries[key],
            })
            .collect()
    }
}
