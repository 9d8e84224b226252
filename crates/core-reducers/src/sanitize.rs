//! One-shot byte canonicalizations: tabs to spaces, control bytes to spaces,
//! space runs collapsed. None of these grow the file; `spaces` shrinks it.

use crate::{cursor, read_file, write_file};
use anyhow::{Result, bail};
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

pub struct SanitizePass;

fn rewrite(arg: &str, data: &[u8]) -> Result<Vec<u8>> {
    match arg {
        "tabs" => Ok(data
            .iter()
            .map(|&b| if b == b'\t' { b' ' } else { b })
            .collect()),
        "control" => Ok(data
            .iter()
            .map(|&b| {
                if b.is_ascii_control() && b != b'\n' && b != b'\t' {
                    b' '
                } else {
                    b
                }
            })
            .collect()),
        "spaces" => {
            let mut out = Vec::with_capacity(data.len());
            let mut in_run = false;
            for &b in data {
                if b == b' ' {
                    if !in_run {
                        out.push(b);
                    }
                    in_run = true;
                } else {
                    in_run = false;
                    out.push(b);
                }
            }
            Ok(out)
        }
        other => bail!("sanitize: unknown argument {other:?}"),
    }
}

impl Pass for SanitizePass {
    fn new_state(&self, _path: &Path, arg: &str) -> Result<Box<dyn PassState>> {
        rewrite(arg, b"")?;
        Ok(Box::new(OneShot { spent: false }))
    }

    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let cur: OneShot = cursor(&*state, "sanitize")?;
        if cur.spent {
            return Ok((TransformOutcome::Stop, state));
        }
        let data = read_file(path)?;
        let out = rewrite(arg, &data)?;
        if out == data {
            return Ok((TransformOutcome::Stop, state));
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
        let mut cur: OneShot = cursor(&*state, "sanitize")?;
        cur.spent = true;
        Ok(Box::new(cur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_once(arg: &str, input: &[u8]) -> (TransformOutcome, Vec<u8>) {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, input).unwrap();
        let pass = SanitizePass;
        let state = pass.new_state(&file, arg).unwrap();
        let (outcome, _) = pass.transform(&file, arg, state).unwrap();
        (outcome, std::fs::read(&file).unwrap())
    }

    #[test]
    fn tabs_become_spaces() {
        let (outcome, out) = run_once("tabs", b"a\tb\tc\n");
        assert_eq!(outcome, TransformOutcome::Produced);
        assert_eq!(out, b"a b c\n");
    }

    #[test]
    fn control_bytes_become_spaces_except_structure() {
        let (outcome, out) = run_once("control", b"a\x01b\r\nc\td\n");
        assert_eq!(outcome, TransformOutcome::Produced);
        assert_eq!(out, b"a b \nc\td\n");
    }

    #[test]
    fn space_runs_collapse() {
        let (outcome, out) = run_once("spaces", b"a    b  c\n");
        assert_eq!(outcome, TransformOutcome::Produced);
        assert_eq!(out, b"a b c\n");
    }

    #[test]
    fn already_clean_input_stops() {
        let (outcome, out) = run_once("tabs", b"a b\n");
        assert_eq!(outcome, TransformOutcome::Stop);
        assert_eq!(out, b"a b\n");
    }

    #[test]
    fn unknown_argument_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, "x").unwrap();
        assert!(SanitizePass.new_state(&file, "everything").is_err());
    }
}
