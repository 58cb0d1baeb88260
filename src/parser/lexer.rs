//! Lexer for template group files using logos

use logos::{Lexer, Logos};

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    #[token("delimiters")]
    Delimiters,

    #[token("::=")]
    Define,

    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,

    // Identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len()-1])
    })]
    String(String),

    /// `<<...>>` body
    #[token("<<", big_string)]
    BigString(String),

    /// `<%...%>` body with newlines removed
    #[token("<%", big_string_no_nl)]
    BigStringNoNl(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    BlockComment,
}

/// Resolve escapes in a quoted string body
///
/// Unknown escapes are kept verbatim so that `\<` survives for the body
/// compiler.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Scan to the closing `terminator`, honouring `\` + first terminator byte
fn scan_until<'s>(lex: &mut Lexer<'s, Token>, terminator: &str) -> Option<String> {
    let rest = lex.remainder();
    let escaped = format!("\\{}", &terminator[..1]);
    let mut body = String::new();
    let mut idx = 0;
    while idx < rest.len() {
        let tail = &rest[idx..];
        if tail.starts_with(terminator) {
            lex.bump(idx + terminator.len());
            return Some(body);
        }
        if tail.starts_with(&escaped) {
            body.push_str(&terminator[..1]);
            idx += escaped.len();
            continue;
        }
        let ch = tail.chars().next()?;
        body.push(ch);
        idx += ch.len_utf8();
    }
    None
}

fn big_string(lex: &mut Lexer<Token>) -> Option<String> {
    let body = scan_until(lex, ">>")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body.as_str());
    let body = body
        .strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body);
    Some(body.to_string())
}

fn big_string_no_nl(lex: &mut Lexer<Token>) -> Option<String> {
    let body = scan_until(lex, "%>")?;
    Some(body.chars().filter(|c| *c != '\n' && *c != '\r').collect())
}

/// Lex input string into tokens with spans
///
/// Unrecognized input is reported as `Err(span)`.
pub fn lex(input: &str) -> impl Iterator<Item = Result<(Token, Span), Span>> + '_ {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| match tok {
            Ok(t) => Ok((t, span)),
            Err(()) => Err(span),
        })
}
