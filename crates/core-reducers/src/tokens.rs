//! Sliding-window token deletion. The argument is the window size; the
//! cursor slides one token at a time so overlapping windows are all tried.

use crate::{cursor, read_file, write_file};
use anyhow::{Context, Result};
use core_pass::{Pass, PassState, TransformOutcome};
use regex::bytes::Regex;
use std::any::Any;
use std::path::Path;
use std::sync::LazyLock;

/// Partition of the input: identifiers, number literals, whitespace runs,
/// then any single byte. Every byte lands in exactly one token.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s-u)[A-Za-z_][A-Za-z0-9_]*|[0-9]+|\s+|.").expect("static token pattern")
});

fn tokenize(data: &[u8]) -> Vec<&[u8]> {
    TOKEN.find_iter(data).map(|m| m.as_bytes()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenCursor {
    index: usize,
}

impl PassState for TokenCursor {
    fn clone_box(&self) -> Box<dyn PassState> {
        Box::new(*self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TokenPass;

fn window_of(arg: &str) -> Result<usize> {
    let parsed: usize = arg
        .parse()
        .with_context(|| format!("tokens: bad window argument {arg:?}"))?;
    Ok(parsed.max(1))
}

impl Pass for TokenPass {
    fn new_state(&self, _path: &Path, arg: &str) -> Result<Box<dyn PassState>> {
        window_of(arg)?;
        Ok(Box::new(TokenCursor { index: 0 }))
    }

    fn transform(
        &self,
        path: &Path,
        arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<(TransformOutcome, Box<dyn PassState>)> {
        let window = window_of(arg)?;
        let data = read_file(path)?;
        let tokens = tokenize(&data);
        let cur: TokenCursor = cursor(&*state, "tokens")?;
        if cur.index + window > tokens.len() {
            return Ok((TransformOutcome::Stop, state));
        }
        let mut out = Vec::with_capacity(data.len());
        out.extend(tokens[..cur.index].concat());
        out.extend(tokens[cur.index + window..].concat());
        write_file(path, &out)?;
        Ok((TransformOutcome::Produced, state))
    }

    fn advance(
        &self,
        _path: &Path,
        _arg: &str,
        state: Box<dyn PassState>,
    ) -> Result<Box<dyn PassState>> {
        let mut cur: TokenCursor = cursor(&*state, "tokens")?;
        cur.index += 1;
        Ok(Box::new(cur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_partitions_every_byte() {
        let data = b"int foo_2 = bar(1, 2);\n";
        let tokens = tokenize(data);
        assert_eq!(tokens.concat(), data);
        assert!(tokens.contains(&&b"foo_2"[..]));
        assert!(tokens.contains(&&b"("[..]));
    }

    #[test]
    fn deletes_single_token_windows() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, "ab cd").unwrap();

        let pass = TokenPass;
        let state = pass.new_state(&file, "1").unwrap();
        let (outcome, state) = pass.transform(&file, "1", state).unwrap();
        assert_eq!(outcome, TransformOutcome::Produced);
        assert_eq!(std::fs::read(&file).unwrap(), b" cd");

        // Rejected: slide to the whitespace token.
        std::fs::write(&file, "ab cd").unwrap();
        let state = pass.advance(&file, "1", state).unwrap();
        let (outcome, _) = pass.transform(&file, "1", state).unwrap();
        assert_eq!(outcome, TransformOutcome::Produced);
        assert_eq!(std::fs::read(&file).unwrap(), b"abcd");
    }

    #[test]
    fn window_wider_than_file_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, "ab").unwrap();

        let pass = TokenPass;
        let state = pass.new_state(&file, "4").unwrap();
        let (outcome, _) = pass.transform(&file, "4", state).unwrap();
        assert_eq!(outcome, TransformOutcome::Stop);
    }

    #[test]
    fn exhausts_after_last_window() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        let original = b"a b";

        let pass = TokenPass;
        let mut state = pass.new_state(&file, "1").unwrap();
        let mut produced = 0;
        loop {
            std::fs::write(&file, original).unwrap();
            let (outcome, after) = pass.transform(&file, "1", state).unwrap();
            if outcome == TransformOutcome::Stop {
                break;
            }
            produced += 1;
            state = pass.advance(&file, "1", after).unwrap();
        }
        // Three tokens: "a", " ", "b".
        assert_eq!(produced, 3);
    }
}
