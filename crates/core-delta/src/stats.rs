//! Per-method acceptance bookkeeping, aggregated across the whole run.

use core_pass::PassDescriptor;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct RunStats {
    worked: BTreeMap<(String, String), u64>,
    failed: BTreeMap<(String, String), u64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_worked(&mut self, descriptor: &PassDescriptor) {
        *self
            .worked
            .entry((descriptor.name.clone(), descriptor.arg.clone()))
            .or_default() += 1;
    }

    pub fn record_failed(&mut self, descriptor: &PassDescriptor) {
        *self
            .failed
            .entry((descriptor.name.clone(), descriptor.arg.clone()))
            .or_default() += 1;
    }

    pub fn worked(&self, name: &str, arg: &str) -> u64 {
        self.worked
            .get(&(name.to_string(), arg.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn failed(&self, name: &str, arg: &str) -> u64 {
        self.failed
            .get(&(name.to_string(), arg.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// One line per method that was ever tried, sorted by name then arg.
    pub fn render(&self) -> Vec<String> {
        let mut keys: Vec<&(String, String)> =
            self.worked.keys().chain(self.failed.keys()).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter()
            .map(|key| {
                let (name, arg) = key;
                format!(
                    "{}({}) worked {}, failed {}",
                    name,
                    arg,
                    self.worked.get(key).copied().unwrap_or(0),
                    self.failed.get(key).copied().unwrap_or(0),
                )
            })
            .collect()
    }
}
