//! Line based operation scripts for the `interval-set` driver.
//!
//! Every non-blank line holds one operation:
//!
//! ```text
//! # comment
//! add 1 5
//! rem 2 3
//! add(6, 8);
//! remove(4, 7);
//! cleanup
//! ```

use core::fmt;
use std::num::ParseIntError;
use regex::Regex;
use thiserror::Error;
use crate::interval_set::IntervalSet;
use crate::interval_tree::Interval;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Add(Interval<i64>),
    Remove(Interval<i64>),
    Clear,
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("line {line}: unrecognized operation `{text}`")]
    Syntax { line: usize, text: String },
    #[error("line {line}: bound does not fit a 64 bit integer")]
    Bound { line: usize, #[source] err: ParseIntError },
    #[error("invalid operation pattern")]
    Pattern(#[from] regex::Error),
}

impl Op {
    pub fn apply(&self, set: &mut IntervalSet<i64>) {
        match self {
            Self::Add(i) => set.add(i.start, i.end),
            Self::Remove(i) => set.remove(i.start, i.end),
            Self::Clear => set.clear(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(i) => write!(f, "add({}, {})", i.start, i.end),
            Self::Remove(i) => write!(f, "rem({}, {})", i.start, i.end),
            Self::Clear => f.write_str("cleanup"),
        }
    }
}

pub struct ScriptParser {
    re_range: Regex,
    re_clear: Regex,
}

impl ScriptParser {
    pub fn new() -> Result<Self, ScriptError> {
        let re_range = Regex::new(r"(?x)
                                  ^(?P<OP>add|rem|remove)
                                  (?:
                                   \s*\(\s*(?P<CALL_START>-?[0-9]+)\s*,\s*(?P<CALL_END>-?[0-9]+)\s*\)\s*;?|
                                   \s+(?P<START>-?[0-9]+)\s+(?P<END>-?[0-9]+)
                                  )$")?;
        let re_clear = Regex::new(r"^(?:cleanup|clear)(?:\s*\(\s*\)\s*;?)?$")?;
        Ok(Self{re_range, re_clear})
    }

    /// Parse a single line, `None` for blank and comment lines. `lineno` is
    /// only used for error reporting.
    pub fn parse_line(&self, lineno: usize, line: &str) -> Result<Option<Op>, ScriptError> {
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') || text.starts_with("//") {
            return Ok(None);
        }

        if self.re_clear.is_match(text) {
            return Ok(Some(Op::Clear));
        }

        let syntax = || ScriptError::Syntax{line: lineno, text: text.to_string()};
        let caps = self.re_range.captures(text).ok_or_else(syntax)?;
        let start = caps.name("CALL_START").or_else(|| caps.name("START")).ok_or_else(syntax)?;
        let end = caps.name("CALL_END").or_else(|| caps.name("END")).ok_or_else(syntax)?;
        let bound = |s: &str| s.parse::<i64>().map_err(|err| ScriptError::Bound{line: lineno, err});
        let interval = Interval::new(bound(start.as_str())?, bound(end.as_str())?);

        match &caps["OP"] {
            "add" => Ok(Some(Op::Add(interval))),
            _ => Ok(Some(Op::Remove(interval))),
        }
    }

    pub fn parse(&self, script: &str) -> Result<Vec<Op>, ScriptError> {
        let mut ops = Vec::new();
        for (i, line) in script.lines().enumerate() {
            if let Some(op) = self.parse_line(i + 1, line)? {
                ops.push(op);
            }
        }
        Ok(ops)
    }
}

pub fn parse_script(script: &str) -> Result<Vec<Op>, ScriptError> {
    ScriptParser::new()?.parse(script)
}

const DEMO_CASE1: &str = "\
add 15 16
add 7 8
add 3 4
add 11 12
add 9 10
add 13 14
add 1 2
add 21 22
add 27 28
add 5 6
add 3 10
add 11 22
add 0 26
add 29 45
add 26 55
cleanup
";

const DEMO_CASE2: &str = "\
rem 30 40
add 15 16
add 7 8
add 3 4
add 11 12
add 9 10
add 13 14
add 1 2
rem 13 14
add 5 6
add 3 10
add 11 22
add 0 26
add 29 45
add 26 55
rem 2 7
rem 20 30
rem 40 70
rem 0 100
cleanup
";

// Empty and inverted ranges.
const DEMO_CASE3: &str = "\
add 4 4
add 5 2
add 0 0
rem 3 5
add 3 5
add 3 5
rem 5 3
rem 3 5
rem 0 10
cleanup
";

const DEMO_EMAIL: &str = "\
add(1, 5);
rem(2, 3);
add(6, 8);
rem(4, 7);
add(2, 7);
cleanup();
";

// Long run of splits and bridging adds over negative and positive bounds,
// left populated at the end.
const DEMO_YM: &str = include_str!("demos/ym.txt");

/// Built-in demo scripts by name, in the order `--demo all` runs them.
pub const DEMOS: &[(&str, &str)] = &[
    ("case1", DEMO_CASE1),
    ("case2", DEMO_CASE2),
    ("case3", DEMO_CASE3),
    ("email", DEMO_EMAIL),
    ("ym", DEMO_YM),
];

#[cfg(test)]
fn test_run(ops: &[Op]) -> Vec<String> {
    let mut set = IntervalSet::new();
    ops.iter().map(|op| {
        op.apply(&mut set);
        set.to_string()
    }).collect()
}

#[test]
fn test_parse_forms() {
    let ops = parse_script("
        # plain
        add 1 5
        rem -3 2
        remove 10 20
        // call form
        add(6, 8);
        rem( -4 ,7 )
        cleanup();
        clear
    ").unwrap();

    assert_eq!(ops, vec![
        Op::Add(Interval::new(1, 5)),
        Op::Remove(Interval::new(-3, 2)),
        Op::Remove(Interval::new(10, 20)),
        Op::Add(Interval::new(6, 8)),
        Op::Remove(Interval::new(-4, 7)),
        Op::Clear,
        Op::Clear,
    ]);
}

#[test]
fn test_parse_errors() {
    match parse_script("add 1 5\nadd 1\n") {
        Err(ScriptError::Syntax{line, text}) => {
            assert_eq!(line, 2);
            assert_eq!(text, "add 1");
        },
        r => panic!("unexpected {:?}", r),
    }

    match parse_script("\n\nrem 99999999999999999999 0") {
        Err(ScriptError::Bound{line, ..}) => assert_eq!(line, 3),
        r => panic!("unexpected {:?}", r),
    }

    assert!(matches!(parse_script("insert 1 2"), Err(ScriptError::Syntax{line: 1, ..})));
    assert!(matches!(parse_script("add(1 2)"), Err(ScriptError::Syntax{..})));
}

#[test]
fn test_op_display() {
    assert_eq!(Op::Add(Interval::new(1, 5)).to_string(), "add(1, 5)");
    assert_eq!(Op::Remove(Interval::new(-2, 3)).to_string(), "rem(-2, 3)");
    assert_eq!(Op::Clear.to_string(), "cleanup");
}

#[test]
fn test_demo_email() {
    let ops = parse_script(DEMO_EMAIL).unwrap();
    assert_eq!(test_run(&ops), vec![
        "[[1,5]]",
        "[[1,2][3,5]]",
        "[[1,2][3,5][6,8]]",
        "[[1,2][3,4][7,8]]",
        "[[1,8]]",
        "[]",
    ]);
}

#[test]
fn test_demo_case3() {
    let ops = parse_script(DEMO_CASE3).unwrap();
    assert_eq!(test_run(&ops), vec![
        "[]", "[]", "[]", "[]",
        "[[3,5]]", "[[3,5]]", "[[3,5]]",
        "[]", "[]", "[]",
    ]);
}

#[test]
fn test_demos_parse() {
    for (name, script) in DEMOS {
        let ops = parse_script(script).unwrap();
        assert!(!ops.is_empty(), "{}", name);
        if *name != "ym" {
            assert_eq!(ops.last(), Some(&Op::Clear), "{}", name);
            assert_eq!(test_run(&ops).last().map(String::as_str), Some("[]"), "{}", name);
        }
    }
}

#[test]
fn test_demo_ym() {
    let ops = parse_script(DEMO_YM).unwrap();
    assert_eq!(ops.len(), 608);
    assert!(!ops.contains(&Op::Clear));

    let steps = test_run(&ops);
    assert_eq!(&steps[..8], &[
        "[[1,5]]",
        "[[1,2][3,5]]",
        "[[1,2][3,5][6,8]]",
        "[[1,2][3,4][7,8]]",
        "[[1,8]]",
        "[[1,16]]",
        "[[3,16]]",
        "[[2,16]]",
    ]);
    assert_eq!(steps.last().map(String::as_str), Some("[[-101,-98][-97,98][100,101]]"));
}
