//! Minimal C tokenizer
//!
//! Only as much of C as the parameter re-parser and brace tracker need:
//! identifiers (with `::` joined in), numbers, punctuation, and literals.
//! Comments and whitespace are dropped.
//!
//! Global invariants enforced:
//! - Tokenizing never fails; unknown characters become `Other` tokens
//! - Braces inside comments, string literals, and char literals are never counted

/// Kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    Star,
    Amp,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Equals,
    Ellipsis,
    Other,
}

/// A token borrowing its text from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == text
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Length in bytes of the char starting at `i`
fn char_len(src: &str, i: usize) -> usize {
    src[i..].chars().next().map_or(1, char::len_utf8)
}

/// Skip a quoted literal starting at `i` (the opening quote); returns the end offset
fn skip_quoted(bytes: &[u8], i: usize, quote: u8) -> usize {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => {
                j += 2;
                // keep `j` on a char boundary after an escaped multi-byte char
                while j < bytes.len() && (bytes[j] & 0xC0) == 0x80 {
                    j += 1;
                }
            }
            b'\n' => return j,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Tokenize C source text
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            continue;
        }

        let start = i;
        let kind = if is_ident_start(b) {
            i += 1;
            loop {
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                // C++ qualified names (`std::size_t`) stay one identifier
                if bytes.get(i) == Some(&b':')
                    && bytes.get(i + 1) == Some(&b':')
                    && bytes.get(i + 2).is_some_and(|c| is_ident_start(*c))
                {
                    i += 2;
                    continue;
                }
                break;
            }
            TokenKind::Ident
        } else if b.is_ascii_digit() {
            while i < bytes.len() && (is_ident_continue(bytes[i]) || bytes[i] == b'.') {
                i += 1;
            }
            TokenKind::Number
        } else if b == b'"' {
            i = skip_quoted(bytes, i, b'"');
            TokenKind::Str
        } else if b == b'\'' {
            i = skip_quoted(bytes, i, b'\'');
            TokenKind::Char
        } else if src[i..].starts_with("...") {
            i += 3;
            TokenKind::Ellipsis
        } else {
            i += char_len(src, i);
            match b {
                b'*' => TokenKind::Star,
                b'&' => TokenKind::Amp,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b',' => TokenKind::Comma,
                b';' => TokenKind::Semi,
                b'=' => TokenKind::Equals,
                _ => TokenKind::Other,
            }
        };

        tokens.push(Token {
            kind,
            text: &src[start..i],
        });
    }

    tokens
}

/// Line-by-line brace counter
///
/// Carries block-comment state from one line to the next so that a brace
/// inside a multi-line `/* ... */` comment is not counted.
#[derive(Debug, Clone, Default)]
pub struct BraceCounter {
    in_block_comment: bool,
}

impl BraceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of `{` minus count of `}` on one line, outside comments and literals
    pub fn line_delta(&mut self, line: &str) -> i32 {
        let bytes = line.as_bytes();
        let mut delta = 0;
        let mut i = 0;

        while i < bytes.len() {
            if self.in_block_comment {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => break,
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    self.in_block_comment = true;
                    i += 2;
                }
                b'"' => i = skip_quoted(bytes, i, b'"'),
                b'\'' => i = skip_quoted(bytes, i, b'\''),
                b'{' => {
                    delta += 1;
                    i += 1;
                }
                b'}' => {
                    delta -= 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_pointer_parameter() {
        let tokens = tokenize("const char *name");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["const", "char", "*", "name"]);
        assert_eq!(tokens[2].kind, TokenKind::Star);
    }

    #[test]
    fn test_tokenize_skips_comments() {
        let src = "int /* count */ a, // trailing\n float b";
        let texts: Vec<&str> = tokenize(src).iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["int", "a", ",", "float", "b"]);
    }

    #[test]
    fn test_tokenize_qualified_name() {
        let tokens = tokenize("std::size_t count");
        assert_eq!(tokens[0].text, "std::size_t");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
    }

    #[test]
    fn test_tokenize_function_pointer() {
        use TokenKind::*;
        assert_eq!(
            kinds("void (*cb)(void *)"),
            vec![Ident, LParen, Star, Ident, RParen, LParen, Ident, Star, RParen]
        );
    }

    #[test]
    fn test_tokenize_ellipsis_and_literals() {
        use TokenKind::*;
        assert_eq!(kinds("fmt, ..."), vec![Ident, Comma, Ellipsis]);
        assert_eq!(kinds(r#"'{' "}\"""#), vec![Char, Str]);
    }

    #[test]
    fn test_tokenize_non_ascii_does_not_panic() {
        let tokens = tokenize("int é");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::Other);
    }

    #[test]
    fn test_brace_delta_plain() {
        let mut counter = BraceCounter::new();
        assert_eq!(counter.line_delta("void f(int a) {"), 1);
        assert_eq!(counter.line_delta("}"), -1);
        assert_eq!(counter.line_delta("} else {"), 0);
        assert_eq!(counter.line_delta("void g(void) {}"), 0);
    }

    #[test]
    fn test_brace_delta_ignores_literals_and_comments() {
        let mut counter = BraceCounter::new();
        assert_eq!(counter.line_delta(r#"printf("{");"#), 0);
        assert_eq!(counter.line_delta("char c = '}';"), 0);
        assert_eq!(counter.line_delta("x = 1; // }"), 0);
        assert_eq!(counter.line_delta(r#"s = "\"{";"#), 0);
    }

    #[test]
    fn test_brace_delta_block_comment_spans_lines() {
        let mut counter = BraceCounter::new();
        assert_eq!(counter.line_delta("/* start {"), 0);
        assert_eq!(counter.line_delta("   still } comment"), 0);
        assert_eq!(counter.line_delta("end */ {"), 1);
    }
}
