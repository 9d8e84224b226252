//! Raw byte-window deletion, the finest-grained pass. Expensive on large
//! files, which is why wider windows sit behind the slow catalog groups.

use crate::{cursor, read_file, write_file};
use anyhow::{Context, Result};
use core_pass::{Pass, PassState, TransformOutcome};
use std::any::Any;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteCursor {
    index: usize,
}

impl PassState for ByteCursor {
    fn clone_box(&self) -> Box<dyn PassState> {
        Box::new(*self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CharsPass;

fn window_of(arg: &str) -> Result<usize> {
    let parsed: usize = arg
        .parse()
        .with_context(|| format!("chars: bad window argument {arg:?}"))?;
    Ok(parsed.max(1))
}

impl Pass for CharsPass {
    fn new_state(&self, _path: &Path, arg: &str) -> Result<Box<dyn PassState>> {
        window_of(arg)?;
        Ok(Box::new(ByteCursor { index: 0 }))
    }

    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let window = window_of(arg)?;
        let data = read_file(path)?;
        let cur: ByteCursor = cursor(&*state, "chars")?;
        if cur.index + window > data.len() {
            return Ok((TransformOutcome::Stop, state));
        }
        let mut out = Vec::with_capacity(data.len() - window);
        out.extend_from_slice(&data[..cur.index]);
        out.extend_from_slice(&data[cur.index + window..]);
        write_file(path, &out)?;
        Ok((TransformOutcome::Produced, state))
    }

    fn advance(
        &self,
        _path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<Box<dyn PassState>> {
        let mut cur: ByteCursor = cursor(&*state, "chars")?;
        cur.index += 1;
        Ok(Box::new(cur))
    }
}
