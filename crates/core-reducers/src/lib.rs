//! Built-in transformation passes.
//!
//! All passes here are byte-oriented: candidates are read and rewritten as
//! raw bytes, never decoded, so arbitrary input survives untouched except for
//! the spans a pass deletes. Cursors are small copyable values; the driver
//! snapshots one per candidate for rollback.

mod balanced;
mod blank;
mod catalog;
mod chars;
mod lines;
mod sanitize;
mod tokens;

pub use balanced::BalancedPass;
pub use blank::BlankPass;
pub use catalog::{CatalogOptions, builtin_registry};
pub use chars::CharsPass;
pub use lines::LinePass;
pub use sanitize::SanitizePass;
pub use tokens::TokenPass;

use anyhow::{Context, Result, bail};
use core_pass::PassState;
use std::path::Path;

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading candidate {}", path.display()))
}

pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).with_context(|| format!("writing candidate {}", path.display()))
}

/// Split into lines, each retaining its `\n` terminator; a final unterminated
/// line is kept as-is. Concatenating the result reproduces the input exactly.
pub(crate) fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in data.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Recover a pass's own cursor from the opaque state the driver hands back.
/// A foreign state means the driver mixed up pass instances; that is a bug,
/// not a reduction failure.
pub(crate) fn cursor<T: Clone + 'static>(state: &dyn PassState, family: &str) -> Result<T> {
    match state.as_any().downcast_ref::<T>() {
        Some(cursor) => Ok(cursor.clone()),
        None => bail!("{family}: state of a different pass"),
    }
}
