use crate::{PassState, TransformOutcome};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// A transformation family. Implementations are stateless; all per-invocation
/// position lives in the [`PassState`] values they hand back.
pub trait Pass: Send + Sync {
    /// Probed once per distinct family at driver startup. Returning false
    /// aborts the run before any scratch directory is created.
    fn check_prereqs(&self) -> bool {
        true
    }

    /// Initial cursor for a fresh invocation. `path` is a scratch copy of the
    /// current best file.
    fn new_state(&self, path: &Path, arg: &str) -> Result<Box<dyn PassState>>;

    /// Overwrite `path` in place with the next candidate and return
    /// [`TransformOutcome::Produced`], or report [`TransformOutcome::Stop`].
    /// Must be deterministic in `(arg, state)` modulo file contents, and must
    /// never produce a candidate bytewise identical to its input.
    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)>;

    /// The state to continue from if the candidate just produced is rejected.
    /// Called exactly once per `Produced`, before the oracle is consulted.
    fn advance(&self, path: &Path, arg: &str, state: Box<dyn PassState>)
    -> Result<Box<dyn PassState>>;
}

/// Immutable registration record for one `(name, arg)` pass instance.
///
/// Each of the three priority keys opts the pass into one phase; absence
/// means the pass is skipped in that phase. Lower priority runs first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDescriptor {
    pub name: String,
    pub arg: String,
    pub first_pri: Option<u32>,
    pub pri: Option<u32>,
    pub last_pri: Option<u32>,
}

impl PassDescriptor {
    pub fn new(name: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: arg.into(),
            first_pri: None,
            pri: None,
            last_pri: None,
        }
    }

    pub fn first(mut self, pri: u32) -> Self {
        self.first_pri = Some(pri);
        self
    }

    pub fn main(mut self, pri: u32) -> Self {
        self.pri = Some(pri);
        self
    }

    pub fn last(mut self, pri: u32) -> Self {
        self.last_pri = Some(pri);
        self
    }

    /// Stable `name(arg)` label for logs and statistics.
    pub fn label(&self) -> String {
        format!("{}({})", self.name, self.arg)
    }
}

/// Which of the three priority keys orders the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Main,
    Cleanup,
}

impl Phase {
    pub fn priority(self, descriptor: &PassDescriptor) -> Option<u32> {
        match self {
            Phase::Initial => descriptor.first_pri,
            Phase::Main => descriptor.pri,
            Phase::Cleanup => descriptor.last_pri,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Main => "main",
            Phase::Cleanup => "cleanup",
        }
    }
}

pub struct RegisteredPass {
    pub descriptor: PassDescriptor,
    pub pass: Arc<dyn Pass>,
}

/// Ordered collection of pass registrations.
#[derive(Default)]
pub struct Registry {
    entries: Vec<RegisteredPass>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, descriptor: PassDescriptor, pass: Arc<dyn Pass>) {
        trace!(target: "pass.registry", pass = %descriptor.label(), "registered");
        self.entries.push(RegisteredPass { descriptor, pass });
    }

    /// Drop every registration. Used when default passes are disabled before
    /// user-supplied descriptors are appended.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The passes participating in `phase`, ascending priority, ties broken
    /// by registration order. Re-invoke to restart the sequence.
    pub fn iterate(&self, phase: Phase) -> Vec<&RegisteredPass> {
        let mut selected: Vec<&RegisteredPass> = self
            .entries
            .iter()
            .filter(|e| phase.priority(&e.descriptor).is_some())
            .collect();
        // Stable sort preserves registration order among equal priorities.
        selected.sort_by_key(|e| phase.priority(&e.descriptor));
        selected
    }

    /// One representative per distinct family name, in first-registration
    /// order. Prerequisite probes run against these.
    pub fn families(&self) -> Vec<(&str, &Arc<dyn Pass>)> {
        let mut seen: Vec<(&str, &Arc<dyn Pass>)> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|(name, _)| *name == entry.descriptor.name) {
                seen.push((&entry.descriptor.name, &entry.pass));
            }
        }
        seen
    }
}
