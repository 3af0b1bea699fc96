//! Function body location by brace-depth tracking
//!
//! A body-open line is a line on which brace depth goes from exactly 0 to
//! exactly 1. From there the signature is found by walking backwards to the
//! line holding the opening parenthesis of the declarator.
//!
//! Global invariants enforced:
//! - Depth is only inspected on the line that updated it
//! - Lines that open and close a block (`void f(void) {}`) are not body-open lines
//! - Each pending function is located at most once per file

use crate::ast::{ParameterDescriptor, PendingFunctions};
use crate::lexer::{tokenize, BraceCounter, TokenKind};
use crate::params::reparse_into;

/// A line where a top-level block opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyOpen {
    /// Index of the body-open line
    pub line: usize,
    /// Index of the signature-start line, if one was found
    pub signature_start: Option<usize>,
}

/// A located definition of a pending function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFunction {
    pub name: String,
    pub signature_start: usize,
    pub body_line: usize,
    /// Parameters re-parsed from the definition
    pub params: Vec<ParameterDescriptor>,
}

/// Find every line on which depth transitions from 0 to 1
pub fn find_body_opens<S: AsRef<str>>(lines: &[S]) -> Vec<BodyOpen> {
    let mut counter = BraceCounter::new();
    let mut depth: i32 = 0;
    let mut opens = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let before = depth;
        depth += counter.line_delta(line.as_ref().trim());
        if before == 0 && depth == 1 {
            opens.push(BodyOpen {
                line: idx,
                signature_start: signature_start(lines, idx),
            });
        }
    }

    opens
}

/// Walk back from a body-open line to the line where its signature starts.
///
/// Stops at the first line containing `(` once every `)` seen on the way up
/// is matched, or at a `struct` line while no parenthesis is open. Returns
/// `None` if a statement end (`;` or `}`) is crossed first: the block then
/// has no function signature (an initializer, for example).
pub fn signature_start<S: AsRef<str>>(lines: &[S], body_line: usize) -> Option<usize> {
    let mut balance: i32 = 0;

    for idx in (0..=body_line).rev() {
        let full = lines[idx].as_ref();
        let text = if idx == body_line {
            full.split('{').next().unwrap_or_default()
        } else {
            full
        };

        let tokens = tokenize(text);

        if idx != body_line && balance == 0 {
            let ends_statement = tokens
                .last()
                .is_some_and(|t| matches!(t.kind, TokenKind::Semi | TokenKind::RBrace));
            if ends_statement {
                return None;
            }
        }

        let opens = tokens.iter().filter(|t| t.kind == TokenKind::LParen).count() as i32;
        let closes = tokens.iter().filter(|t| t.kind == TokenKind::RParen).count() as i32;
        balance += closes - opens;

        if opens > 0 && balance <= 0 {
            return Some(idx);
        }
        if balance == 0 && tokens.iter().any(|t| t.is_ident("struct")) {
            return Some(idx);
        }
    }

    None
}

/// True if `name` occurs in `text` as a whole identifier
fn contains_identifier(text: &str, name: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|t| t.kind == TokenKind::Ident && t.text == name)
}

/// Decide which pending function, if any, owns a body.
///
/// The declarator name of the parsed signature wins when it is pending.
/// Otherwise the first pending name (in set order) found as a whole
/// identifier on the signature-start line is used.
pub fn match_owner(
    declarator: Option<&str>,
    signature_line: &str,
    pending: &PendingFunctions,
) -> Option<String> {
    if let Some(name) = declarator {
        if pending.contains(name) {
            return Some(name.to_string());
        }
    }

    let line = signature_line.trim();
    pending
        .names()
        .find(|name| contains_identifier(line, name))
        .map(str::to_string)
}

/// Locate the definitions of pending functions in a file's lines
///
/// Parameters are re-parsed from each definition. A name is reported at
/// most once; later bodies with the same owner are ignored.
pub fn locate_functions<S: AsRef<str>>(
    lines: &[S],
    pending: &PendingFunctions,
) -> Vec<LocatedFunction> {
    let mut located: Vec<LocatedFunction> = Vec::new();

    for open in find_body_opens(lines) {
        let Some(start) = open.signature_start else {
            continue;
        };

        let mut params = Vec::new();
        let declarator = reparse_into(&lines[start..=open.line], &mut params);
        let Some(name) = match_owner(declarator.as_deref(), lines[start].as_ref(), pending) else {
            continue;
        };

        if located.iter().any(|f| f.name == name) {
            continue;
        }

        located.push(LocatedFunction {
            name,
            signature_start: start,
            body_line: open.line,
            params,
        });
    }

    located
}
