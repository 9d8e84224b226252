//! Whitespace-only line removal. Single-step: one candidate per invocation,
//! and nothing further once the file is already free of blank lines.

use crate::{cursor, read_file, split_lines, write_file};
use anyhow::Result;
use core_pass::{Pass, PassState, TransformOutcome};
use std::any::Any;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OneShot {
    spent: bool,
}

impl PassState for OneShot {
    fn clone_box(&self) -> Box<dyn PassState> {
        Box::new(*self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct BlankPass;

impl Pass for BlankPass {
    fn new_state(&self, _path: &Path, _arg: &str) -> Result<Box<dyn PassState>> {
        Ok(Box::new(OneShot { spent: false }))
    }

    fn transform(
        &self,
        path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let cur: OneShot = cursor(&*state, "blank")?;
        if cur.spent {
            return Ok((TransformOutcome::Stop, state));
        }
        let data = read_file(path)?;
        let kept: Vec<u8> = split_lines(&data)
            .into_iter()
            .filter(|line| !line.iter().all(|b| b.is_ascii_whitespace()))
            .collect::<Vec<_>>()
            .concat();
        // An identical candidate would be accepted forever; report Stop.
        if kept == data {
            return Ok((TransformOutcome::Stop, state));
        }
        write_file(path, &kept)?;
        Ok((TransformOutcome::Produced, state))
    }

    fn advance(
        &self,
        _path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<Box<dyn PassState>> {
        let mut cur: OneShot = cursor(&*state, "blank")?;
        cur.spent = true;
        Ok(Box::new(cur))
    }
}
