//! Parameter re-parser
//!
//! Re-derives the parameter list of a function from the text of its
//! definition. The definition is authoritative over the header declaration:
//! names, qualifiers, and array suffixes may differ between the two.
//!
//! Segments are classified in priority order:
//! 1. `type (*name)(...)` - function pointer, always a pointer
//! 2. `type *[const] *name[N]` / `type name[]` - pointers and arrays, with
//!    any qualifiers between the stars dropped from the type
//! 3. `type name` - plain scalar
//! 4. fallback - last whitespace word is the name, the rest is the type
//!
//! Global invariants enforced:
//! - Re-parsing never fails; unrecognized segments degrade to the fallback
//! - Commas nested in `()` or `[]` never split parameters
//! - Empty segments, `void` lists, `...`, and unnamed parameters are dropped

use crate::ast::ParameterDescriptor;
use crate::lexer::{tokenize, Token, TokenKind};

/// Words that can never be a parameter name
const TYPE_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "const", "volatile", "restrict", "struct", "enum", "union",
];

/// Identifiers that introduce attribute groups rather than parameter lists
const ATTRIBUTE_WORDS: &[&str] = &["__attribute__", "__declspec", "__attribute", "alignas"];

/// Declarator name and parameters of a function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ParameterDescriptor>,
}

/// Join signature lines into one string, dropping carriage returns and
/// collapsing runs of whitespace
pub fn normalize_signature<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|l| l.as_ref().replace('\r', ""))
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace `params` with the parameters parsed from a signature span and
/// return the declarator name
///
/// `lines` runs from the signature-start line to the body-open line,
/// inclusive. If no parameter list can be found, `params` is left empty and
/// `None` is returned.
pub fn reparse_into<S: AsRef<str>>(
    lines: &[S],
    params: &mut Vec<ParameterDescriptor>,
) -> Option<String> {
    params.clear();
    let signature = parse_signature(&normalize_signature(lines))?;
    params.extend(signature.params);
    Some(signature.name)
}

/// Parse a function signature into its declarator name and parameter list
///
/// Text from the first top-level `{` onwards is ignored. The parameter list is
/// the last top-level parenthesis group that directly follows an identifier
/// other than an attribute keyword, so trailing `__attribute__((...))` and
/// leading export macros such as `API(void)` are skipped.
pub fn parse_signature(text: &str) -> Option<Signature> {
    let tokens = tokenize(text);
    let end = tokens
        .iter()
        .position(|t| t.kind == TokenKind::LBrace)
        .unwrap_or(tokens.len());
    let tokens = &tokens[..end];

    let mut chosen: Option<(usize, usize)> = None;
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind == TokenKind::LParen {
            let Some(close) = matching_close(tokens, i) else {
                break;
            };
            let follows_name = i > 0
                && tokens[i - 1].kind == TokenKind::Ident
                && !ATTRIBUTE_WORDS.contains(&tokens[i - 1].text);
            if follows_name {
                chosen = Some((i, close));
            }
            i = close + 1;
        } else {
            i += 1;
        }
    }

    let (open, close) = chosen?;
    let name = tokens[open - 1].text.to_string();
    let params = split_top_level(&tokens[open + 1..close])
        .into_iter()
        .filter_map(parse_segment)
        .collect();

    Some(Signature { name, params })
}

/// Index of the token closing the group opened at `open`
fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let (open_kind, close_kind) = match tokens[open].kind {
        TokenKind::LParen => (TokenKind::LParen, TokenKind::RParen),
        TokenKind::LBracket => (TokenKind::LBracket, TokenKind::RBracket),
        _ => return None,
    };
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.kind == open_kind {
            depth += 1;
        } else if token.kind == close_kind {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Split tokens on commas that are not nested in `()` or `[]`
fn split_top_level<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                segments.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&tokens[start..]);
    segments
}

fn join_tokens(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify one comma-delimited segment
///
/// Returns `None` only for segments that declare no named parameter.
fn parse_segment(segment: &[Token<'_>]) -> Option<ParameterDescriptor> {
    // Drop C++ default arguments
    let segment = match segment.iter().position(|t| t.kind == TokenKind::Equals) {
        Some(eq) => &segment[..eq],
        None => segment,
    };

    match segment {
        [] => return None,
        [only] if only.kind == TokenKind::Ellipsis || only.is_ident("void") => return None,
        _ => {}
    }

    if let Some(param) = parse_function_pointer(segment) {
        return Some(param);
    }

    match parse_declarator(segment) {
        Declarator::Named(param) => Some(param),
        Declarator::Unnamed => None,
        Declarator::Unrecognized => parse_fallback(segment),
    }
}

/// `ret (*name)(args)`
fn parse_function_pointer(segment: &[Token<'_>]) -> Option<ParameterDescriptor> {
    let open = segment.iter().position(|t| t.kind == TokenKind::LParen)?;
    let close = matching_close(segment, open)?;
    let inner = &segment[open + 1..close];

    let stars = inner.iter().take_while(|t| t.kind == TokenKind::Star).count();
    if stars == 0 {
        return None;
    }
    let name = inner[stars..]
        .iter()
        .rev()
        .find(|t| t.kind == TokenKind::Ident)?;

    let return_type = join_tokens(&segment[..open]);
    let ty = if return_type.is_empty() {
        "(*)(...)".to_string()
    } else {
        format!("{} (*)(...)", return_type)
    };

    Some(ParameterDescriptor::new(name.text, ty, true))
}

enum Declarator {
    Named(ParameterDescriptor),
    Unnamed,
    Unrecognized,
}

/// `type [*[const]]* name[[N]]...`
fn parse_declarator(segment: &[Token<'_>]) -> Declarator {
    // Peel array suffixes off the end
    let mut end = segment.len();
    let mut suffixes = Vec::new();
    while end > 0 && segment[end - 1].kind == TokenKind::RBracket {
        let Some(open) = segment[..end]
            .iter()
            .rposition(|t| t.kind == TokenKind::LBracket)
        else {
            return Declarator::Unrecognized;
        };
        suffixes.push(format!("[{}]", join_tokens(&segment[open + 1..end - 1])));
        end = open;
    }
    suffixes.reverse();
    let body = &segment[..end];

    let Some((name, prefix)) = body.split_last() else {
        return Declarator::Unrecognized;
    };
    if name.kind != TokenKind::Ident {
        return Declarator::Unrecognized;
    }

    let mut base = Vec::new();
    let mut stars = 0usize;
    for token in prefix {
        match token.kind {
            TokenKind::Star => stars += 1,
            // Qualifiers between or after stars belong to the pointer, not the base type
            TokenKind::Ident if stars > 0 => {
                if !matches!(token.text, "const" | "volatile" | "restrict" | "__restrict") {
                    return Declarator::Unrecognized;
                }
            }
            TokenKind::Ident => base.push(token.text),
            _ => return Declarator::Unrecognized,
        }
    }

    // `int`, `const char *`, `struct foo`: a type with no parameter name
    if TYPE_KEYWORDS.contains(&name.text)
        || base.is_empty()
        || matches!(base.as_slice(), ["struct"] | ["enum"] | ["union"])
    {
        return Declarator::Unnamed;
    }

    let mut ty = base.join(" ");
    if !suffixes.is_empty() {
        ty.push(' ');
        ty.push_str(&suffixes.concat());
    }

    Declarator::Named(ParameterDescriptor::new(
        name.text,
        ty,
        stars > 0 || !suffixes.is_empty(),
    ))
}

/// Last whitespace word is the name, everything before it the type
fn parse_fallback(segment: &[Token<'_>]) -> Option<ParameterDescriptor> {
    let raw = join_tokens(segment);
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    let last = words.pop()?;
    let name = last.split('[').next().unwrap_or(last).trim_matches('*');
    if name.is_empty() {
        return None;
    }
    let is_pointer = raw.contains('*') || raw.contains('[');
    Some(ParameterDescriptor::new(name, words.join(" "), is_pointer))
}

/// True if `name` can be used as a C expression naming the parameter
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
