//! Variable-change confirmation state
//!
//! A binding's updated flag and confirmed value are written only by the
//! variable's change callback. A write is confirmed by clearing the flag,
//! writing through, and waiting for the flag, which costs one full pump round
//! trip per write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::event::VariableValue;

/// Split 64-bit timestamp carried by the timed change notification form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTimestamp {
    pub high: i32,
    pub low: i32,
}

impl SplitTimestamp {
    /// Recombine the halves into the raw 64-bit tick value
    pub fn ticks(&self) -> u64 {
        ((self.high as u32 as u64) << 32) | self.low as u32 as u64
    }
}

/// Last confirmed state of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBinding {
    pub name: String,
    pub last_value: Option<VariableValue>,
    pub updated: bool,
    pub timestamp: Option<SplitTimestamp>,
}

impl VariableBinding {
    fn new(name: String) -> Self {
        Self {
            name,
            last_value: None,
            updated: false,
            timestamp: None,
        }
    }
}

/// All variable bindings of one connection, keyed by variable name
#[derive(Debug, Default)]
pub struct VariableTable {
    bindings: HashMap<String, VariableBinding>,
}

impl VariableTable {
    pub fn get(&self, name: &str) -> Option<&VariableBinding> {
        self.bindings.get(name)
    }

    pub fn is_updated(&self, name: &str) -> bool {
        self.bindings.get(name).is_some_and(|b| b.updated)
    }

    /// Last value confirmed by a change callback
    pub fn last_value(&self, name: &str) -> Option<&VariableValue> {
        self.bindings.get(name).and_then(|b| b.last_value.as_ref())
    }

    fn binding_mut(&mut self, name: &str) -> &mut VariableBinding {
        self.bindings
            .entry(name.to_string())
            .or_insert_with(|| VariableBinding::new(name.to_string()))
    }

    /// Clear the updated flag before writing, so a stale prior change cannot
    /// satisfy the wait
    pub(crate) fn clear_updated(&mut self, name: &str) {
        self.binding_mut(name).updated = false;
    }

    pub(crate) fn on_change(&mut self, name: &str, value: VariableValue) {
        let binding = self.binding_mut(name);
        binding.last_value = Some(value);
        binding.updated = true;
    }

    pub(crate) fn on_change_at(
        &mut self,
        name: &str,
        value: VariableValue,
        time_high: i32,
        time_low: i32,
    ) {
        let binding = self.binding_mut(name);
        binding.last_value = Some(value);
        binding.updated = true;
        binding.timestamp = Some(SplitTimestamp {
            high: time_high,
            low: time_low,
        });
    }
}
