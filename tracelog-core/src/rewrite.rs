//! Source rewriting: building the entry log call and splicing it into a file
//!
//! Two modes are supported:
//! - full: every located body of a pending function gets a log call listing
//!   its parameters, and the logging header include is patched in
//! - paired: the functions of the header sharing the source file's stem get
//!   a plain "called" log line, with no include patching
//!
//! Global invariants enforced:
//! - All positions are line-based; later lines never shift while bodies are
//!   processed (the log call is appended to the body-open line's buffer entry)
//! - A function is retired from the pending set when it is instrumented, or
//!   when its body already starts with the log call
//! - The argument list of the emitted call always matches its format string

use crate::ast::{FunctionDescriptor, ParameterDescriptor, PendingFunctions};
use crate::format::{format_for_type, POINTER_FORMAT};
use crate::lexer::{tokenize, TokenKind};
use crate::locate::{find_body_opens, locate_functions};
use crate::params::is_identifier;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What to do with a parameter that has no format specifier and is not a pointer
///
/// Printing such a parameter is impossible without knowing its type, so it
/// can never be passed to the variadic log call as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnformattedPolicy {
    /// Leave the parameter out of both the format string and the arguments
    #[default]
    Skip,
    /// Print the parameter's address with `%p`
    Address,
    /// Write `name: no formatter for this` into the format string, with no argument
    Annotate,
}

impl UnformattedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnformattedPolicy::Skip => "skip",
            UnformattedPolicy::Address => "address",
            UnformattedPolicy::Annotate => "annotate",
        }
    }
}

/// How the injected call is spelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStyle {
    pub function: String,
    pub level: String,
    /// Include target with its delimiters, e.g. `<util/base.h>`
    pub include: String,
    pub unformatted: UnformattedPolicy,
}

impl Default for LogStyle {
    fn default() -> Self {
        LogStyle {
            function: "blog".to_string(),
            level: "LOG_DEBUG".to_string(),
            include: "<util/base.h>".to_string(),
            unformatted: UnformattedPolicy::Skip,
        }
    }
}

impl LogStyle {
    fn include_line(&self) -> String {
        format!("#include {}", self.include)
    }

    /// Whitespace-free prefix every injected call for `name` starts with
    fn call_prefix(&self, name: &str) -> String {
        compact(&format!("{}({}, \"{} called", self.function, self.level, name))
    }
}

/// A log statement and the parameters it could not print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCall {
    pub statement: String,
    pub unformatted: Vec<String>,
}

/// Specifier for one parameter, or `None` if it cannot be printed directly.
///
/// Only `char` pointers keep a mapped specifier when the parameter is a
/// pointer; every other pointer or array prints as `%p`. A plain `char`
/// prints as `%c`.
pub fn specifier_for(param: &ParameterDescriptor) -> Option<&'static str> {
    match format_for_type(&param.ty) {
        Some("%s") if param.is_pointer => Some("%s"),
        Some("%s") => Some("%c"),
        Some(_) if param.is_pointer => Some(POINTER_FORMAT),
        Some(format) => Some(format),
        None if param.is_pointer => Some(POINTER_FORMAT),
        None => None,
    }
}

/// Build the entry log statement for a function
pub fn build_log_call(function: &FunctionDescriptor, style: &LogStyle) -> LogCall {
    let mut fields = Vec::new();
    let mut args = Vec::new();
    let mut unformatted = Vec::new();

    for param in &function.params {
        let printable = is_identifier(&param.name);
        match specifier_for(param) {
            Some(spec) if printable => {
                fields.push(format!("{}: {}", param.name, spec));
                args.push(param.name.clone());
            }
            _ => {
                unformatted.push(param.name.clone());
                match style.unformatted {
                    UnformattedPolicy::Skip => {}
                    UnformattedPolicy::Address if printable => {
                        fields.push(format!("{}: {}", param.name, POINTER_FORMAT));
                        args.push(format!("(void *)&{}", param.name));
                    }
                    UnformattedPolicy::Address => {}
                    UnformattedPolicy::Annotate => {
                        fields.push(format!(
                            "{}: no formatter for this",
                            param.name.replace(['%', '"', '\\'], "")
                        ));
                    }
                }
            }
        }
    }

    let message = if fields.is_empty() {
        format!("{} called", function.name)
    } else {
        format!("{} called with params: {}", function.name, fields.join(", "))
    };

    let mut statement = format!("{}({}, \"{}\"", style.function, style.level, message);
    for arg in &args {
        statement.push_str(", ");
        statement.push_str(arg);
    }
    statement.push_str(");");

    LogCall {
        statement,
        unformatted,
    }
}

/// A function that received a log call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentedFunction {
    pub name: String,
    /// 1-based line of the opening brace in the original file
    pub line: usize,
    pub params: Vec<ParameterDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unformatted: Vec<String>,
}

/// Result of rewriting one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceEdit {
    pub content: String,
    pub instrumented: Vec<InstrumentedFunction>,
    /// Functions whose bodies already started with the log call
    pub already_instrumented: Vec<String>,
    pub include_added: bool,
}

impl SourceEdit {
    pub fn changed(&self) -> bool {
        !self.instrumented.is_empty()
    }
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

fn is_include(line: &str) -> bool {
    line.trim_start().starts_with("#include")
}

/// Position of the first `{` on a line outside comments and literals
fn first_open_brace(line: &str) -> Option<usize> {
    let tokens = tokenize(line);
    let brace = tokens.iter().find(|t| t.kind == TokenKind::LBrace)?;
    // Token text borrows from `line`, so its offset is recoverable
    Some(brace.text.as_ptr() as usize - line.as_ptr() as usize)
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Indentation for the first statement of the body opened on `body_line`
fn body_indent<S: AsRef<str>>(lines: &[S], body_line: usize) -> String {
    let next = lines
        .iter()
        .skip(body_line + 1)
        .map(|l| l.as_ref())
        .find(|l| !l.trim().is_empty());
    match next {
        Some(line) if !line.trim_start().starts_with('}') => {
            leading_whitespace(line.trim_end_matches('\r')).to_string()
        }
        _ => format!("{}    ", leading_whitespace(lines[body_line].as_ref())),
    }
}

/// True if the statement right after the body's `{` is already our log call
fn is_already_instrumented<S: AsRef<str>>(
    lines: &[S],
    body_line: usize,
    name: &str,
    style: &LogStyle,
) -> bool {
    let prefix = style.call_prefix(name);

    let line = lines[body_line].as_ref();
    let after_brace = first_open_brace(line).map_or("", |pos| &line[pos + 1..]);
    if !after_brace.trim().is_empty() {
        return compact(after_brace).starts_with(&prefix);
    }

    lines
        .iter()
        .skip(body_line + 1)
        .map(|l| l.as_ref())
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| compact(l).starts_with(&prefix))
}

/// Put `statement` on its own line right after the `{` of `line`.
///
/// Returns the new buffer entry; it holds embedded newlines so that the
/// indices of later lines do not move.
fn splice_after_brace(line: &str, statement: &str, indent: &str) -> String {
    let (text, cr) = match line.strip_suffix('\r') {
        Some(stripped) => (stripped, "\r"),
        None => (line, ""),
    };
    let Some(pos) = first_open_brace(text) else {
        return format!("{}{}\n{}{}{}", text, cr, indent, statement, cr);
    };

    let (head, tail) = text.split_at(pos + 1);
    let tail = tail.trim();
    let mut out = format!("{}{}\n{}{}", head, cr, indent, statement);
    if !tail.is_empty() {
        out.push_str(&format!("{}\n{}{}", cr, indent, tail));
    }
    out.push_str(cr);
    out
}

/// Insert the include before the last `#include` line, or at the top
///
/// Returns false if the include is already present.
fn patch_include(lines: &mut Vec<String>, style: &LogStyle) -> bool {
    let wanted = compact(&style.include_line());
    if lines
        .iter()
        .filter(|l| is_include(l))
        .any(|l| compact(l) == wanted)
    {
        return false;
    }

    let (idx, cr) = match lines.iter().rposition(|l| is_include(l)) {
        Some(idx) => (idx, if lines[idx].ends_with('\r') { "\r" } else { "" }),
        None => (0, ""),
    };
    lines.insert(idx, format!("{}{}", style.include_line(), cr));
    true
}

/// Instrument every located body of a pending function (full mode)
///
/// Instrumented functions, and functions found already instrumented, are
/// retired from `pending`.
pub fn instrument_source(
    source: &str,
    pending: &mut PendingFunctions,
    style: &LogStyle,
) -> SourceEdit {
    let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
    let mut edit = SourceEdit::default();

    for found in locate_functions(&lines, pending) {
        if is_already_instrumented(&lines, found.body_line, &found.name, style) {
            tracing::debug!(function = %found.name, "already instrumented");
            pending.retire(&found.name);
            edit.already_instrumented.push(found.name);
            continue;
        }

        let Some(mut function) = pending.retire(&found.name) else {
            continue;
        };
        function.params = found.params;

        let call = build_log_call(&function, style);
        let indent = body_indent(&lines, found.body_line);
        lines[found.body_line] = splice_after_brace(&lines[found.body_line], &call.statement, &indent);

        tracing::debug!(
            function = %function.name,
            line = found.body_line + 1,
            params = function.params.len(),
            "instrumented"
        );

        edit.instrumented.push(InstrumentedFunction {
            name: function.name,
            line: found.body_line + 1,
            params: function.params,
            unformatted: call.unformatted,
        });
    }

    if edit.changed() {
        edit.include_added = patch_include(&mut lines, style);
    }

    edit.content = lines.join("\n");
    edit
}

/// Index of the line holding the `{` of the first definition of `name`,
/// and whether that body already starts with the log call
///
/// Only matches whose brace opens a top-level block count, so calls such as
/// `if (name(x)) {` inside other bodies are never taken for definitions.
fn find_definition_brace(lines: &[String], name: &str, style: &LogStyle) -> Option<(usize, bool)> {
    let pattern = Regex::new(&format!(
        r"(?:^|\s|\*){}\s*\([^{{;]*?\)[^{{;()]*\{{",
        regex::escape(name)
    ))
    .ok()?;
    let text = lines.join("\n");
    let body_opens: HashSet<usize> = find_body_opens(lines).into_iter().map(|o| o.line).collect();

    let brace_line = pattern
        .find_iter(&text)
        .map(|m| text[..m.end()].matches('\n').count())
        .find(|line| body_opens.contains(line))?;

    let done = is_already_instrumented(lines, brace_line, name, style);
    Some((brace_line, done))
}

/// Instrument the functions exported by a paired header (paired mode)
///
/// Each still-pending function of `exported` gets `LOG(LEVEL, "name called");`
/// after the opening brace of its first definition. Found functions, and
/// functions whose first definition already logs, are retired from `pending`.
pub fn instrument_paired(
    source: &str,
    exported: &[FunctionDescriptor],
    pending: &mut PendingFunctions,
    style: &LogStyle,
) -> SourceEdit {
    let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
    let mut edit = SourceEdit::default();
    // (buffer index of a brace line, lines inserted after it)
    let mut insertions: Vec<(usize, usize)> = Vec::new();

    for function in exported {
        if !pending.contains(&function.name) {
            continue;
        }
        let Some((brace_line, done)) = find_definition_brace(&lines, &function.name, style) else {
            continue;
        };
        if done {
            pending.retire(&function.name);
            edit.already_instrumented.push(function.name.clone());
            continue;
        }

        let bare = FunctionDescriptor::new(function.name.clone(), Vec::new());
        let call = build_log_call(&bare, style);
        let indent = body_indent(&lines, brace_line);
        let spliced = splice_after_brace(&lines[brace_line], &call.statement, &indent);

        // Re-split so the next search sees real lines
        let replacement: Vec<String> = spliced.split('\n').map(str::to_string).collect();
        let added = replacement.len() - 1;
        let shift: usize = insertions
            .iter()
            .filter(|(at, _)| *at < brace_line)
            .map(|(_, n)| n)
            .sum();
        let line = brace_line - shift + 1;
        lines.splice(brace_line..=brace_line, replacement);
        for entry in insertions.iter_mut().filter(|(at, _)| *at > brace_line) {
            entry.0 += added;
        }
        insertions.push((brace_line, added));

        pending.retire(&function.name);
        edit.instrumented.push(InstrumentedFunction {
            name: function.name.clone(),
            line,
            params: Vec::new(),
            unformatted: Vec::new(),
        });
    }

    edit.content = lines.join("\n");
    edit
}

#[cfg(test)]
#[path = "rewrite/tests.rs"]
mod tests;
