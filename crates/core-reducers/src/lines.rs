//! Chunked line deletion.
//!
//! The cursor walks windows of `chunk` consecutive lines left to right; when
//! the end of the file is passed the window halves and the walk restarts.
//! The pass argument is the minimum window size: `0` and `1` both descend to
//! single lines, larger values keep the pass coarse. After an acceptance the
//! driver rewinds to the cursor that produced the candidate, so the same
//! index is retried against the shrunk file.

use crate::{cursor, read_file, split_lines, write_file};
use anyhow::{Context, Result};
use core_pass::{Pass, PassState, TransformOutcome};
use std::any::Any;
use std::path::Path;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineCursor {
    chunk: usize,
    index: usize,
}

impl PassState for LineCursor {
    fn clone_box(&self) -> Box<dyn PassState> {
        Box::new(*self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct LinePass;

fn floor_of(arg: &str) -> Result<usize> {
    let parsed: usize = arg
        .parse()
        .with_context(|| format!("lines: bad granularity argument {arg:?}"))?;
    Ok(parsed.max(1))
}

impl Pass for LinePass {
    fn new_state(&self, path: &Path, arg: &str) -> Result<Box<dyn PassState>> {
        floor_of(arg)?;
        let lines = split_lines(&read_file(path)?).len();
        Ok(Box::new(LineCursor {
            chunk: lines,
            index: 0,
        }))
    }

    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let floor = floor_of(arg)?;
        let data = read_file(path)?;
        let lines = split_lines(&data);
        let mut cur: LineCursor = cursor(&*state, "lines")?;

        // Normalize against the current file: clamp to its length, halve and
        // wrap once the walk passes the end.
        cur.chunk = cur.chunk.min(lines.len());
        loop {
            if cur.chunk < floor || cur.chunk == 0 {
                return Ok((TransformOutcome::Stop, Box::new(cur)));
            }
            if cur.index >= lines.len() {
                cur.index = 0;
                cur.chunk /= 2;
                continue;
            }
            break;
        }

        let end = (cur.index + cur.chunk).min(lines.len());
        let mut out = Vec::with_capacity(data.len());
        out.extend(lines[..cur.index].concat());
        out.extend(lines[end..].concat());
        trace!(
            target: "pass.lines",
            index = cur.index,
            chunk = cur.chunk,
            removed = end - cur.index,
            "candidate"
        );
        write_file(path, &out)?;
        Ok((TransformOutcome::Produced, Box::new(cur)))
    }

    fn advance(
        &self,
        _path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<Box<dyn PassState>> {
        let mut cur: LineCursor = cursor(&*state, "lines")?;
        cur.index += cur.chunk;
        Ok(Box::new(cur))
    }
}
