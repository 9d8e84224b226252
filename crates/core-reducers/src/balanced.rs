//! Balanced-delimiter span deletion.
//!
//! Two modes per delimiter kind: delete an entire balanced span, or unwrap a
//! span by deleting only its two delimiter bytes. Unwrapping is what lets
//! nested wrappers around a load-bearing payload fall away one shell at a
//! time. Spans are enumerated by opening position, outermost first.

use crate::{cursor, read_file, write_file};
use anyhow::{Result, bail};
use core_pass::{Pass, PassState, TransformOutcome};
use std::any::Any;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpanCursor {
    index: usize,
}

impl PassState for SpanCursor {
    fn clone_box(&self) -> Box<dyn PassState> {
        Box::new(*self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mode {
    open: u8,
    close: u8,
    unwrap: bool,
}

fn mode_of(arg: &str) -> Result<Mode> {
    let (kind, unwrap) = match arg.strip_suffix("-unwrap") {
        Some(kind) => (kind, true),
        None => (arg, false),
    };
    let (open, close) = match kind {
        "curly" => (b'{', b'}'),
        "parens" => (b'(', b')'),
        "square" => (b'[', b']'),
        other => bail!("balanced: unknown delimiter kind {other:?}"),
    };
    Ok(Mode {
        open,
        close,
        unwrap,
    })
}

/// Matched `(open, close)` byte positions, ordered by opening position.
/// Unmatched delimiters are simply not spans.
fn spans(data: &[u8], mode: Mode) -> Vec<(usize, usize)> {
    let mut stack = Vec::new();
    let mut found = Vec::new();
    for (i, &b) in data.iter().enumerate() {
        if b == mode.open {
            stack.push(i);
        } else if b == mode.close
            && let Some(open) = stack.pop()
        {
            found.push((open, i));
        }
    }
    found.sort_unstable();
    found
}

pub struct BalancedPass;

impl Pass for BalancedPass {
    fn new_state(&self, _path: &Path, arg: &str) -> Result<Box<dyn PassState>> {
        mode_of(arg)?;
        Ok(Box::new(SpanCursor { index: 0 }))
    }

    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let mode = mode_of(arg)?;
        let data = read_file(path)?;
        let cur: SpanCursor = cursor(&*state, "balanced")?;
        let all = spans(&data, mode);
        let Some(&(open, close)) = all.get(cur.index) else {
            return Ok((TransformOutcome::Stop, state));
        };
        let mut out = Vec::with_capacity(data.len());
        if mode.unwrap {
            out.extend_from_slice(&data[..open]);
            out.extend_from_slice(&data[open + 1..close]);
            out.extend_from_slice(&data[close + 1..]);
        } else {
            out.extend_from_slice(&data[..open]);
            out.extend_from_slice(&data[close + 1..]);
        }
        write_file(path, &out)?;
        Ok((TransformOutcome::Produced, state))
    }

    fn advance(
        &self,
        _path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<Box<dyn PassState>> {
        let mut cur: SpanCursor = cursor(&*state, "balanced")?;
        cur.index += 1;
        Ok(Box::new(cur))
    }
}
