//! Error types for parsing group files and template bodies

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Build an error that carries only a message
    pub fn custom(span: Span, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Shift the span by `by` bytes, for errors found in a sub-slice of the source
    pub fn offset(self, by: usize) -> Self {
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => ParseError::Syntax {
                span: span.start + by..span.end + by,
                message,
                expected,
            },
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Format several errors against the same source
pub fn format_errors(errors: &[ParseError], source: &str, filename: &str) -> String {
    errors
        .iter()
        .map(|e| e.format(source, filename))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable token names for error messages
trait DescribeToken {
    fn describe(&self) -> String;
}

fn from_rich<T: DescribeToken>(err: Rich<'_, T>) -> ParseError {
    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => {
            let found_str = match found {
                Some(tok) => tok.describe(),
                None => "end of input".to_string(),
            };
            format!("Unexpected {}", found_str)
        }
        RichReason::Custom(msg) => msg.to_string(),
    };

    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            RichPattern::Token(tok) => Some(tok.describe()),
            RichPattern::Label(label) => Some(label.to_string()),
            RichPattern::EndOfInput => Some("end of input".to_string()),
            RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
            RichPattern::Any => Some("any token".to_string()),
            RichPattern::SomethingElse => None,
        })
        .collect();

    ParseError::Syntax {
        span: err.span().into_range(),
        message,
        expected,
    }
}

impl<'a> From<Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: Rich<'a, crate::parser::lexer::Token>) -> Self {
        from_rich(err)
    }
}

impl<'a> From<Rich<'a, crate::template::ExprToken>> for ParseError {
    fn from(err: Rich<'a, crate::template::ExprToken>) -> Self {
        from_rich(err)
    }
}

impl DescribeToken for crate::parser::lexer::Token {
    fn describe(&self) -> String {
        use crate::parser::lexer::Token;
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::String(s) => format!("string \"{}\"", s),
            Token::BigString(_) => "'<<...>>' template".to_string(),
            Token::BigStringNoNl(_) => "'<%...%>' template".to_string(),
            Token::Delimiters => "keyword 'delimiters'".to_string(),
            Token::Define => "'::='".to_string(),
            Token::ParenOpen => "'('".to_string(),
            Token::ParenClose => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Equals => "'='".to_string(),
            _ => format!("{:?}", self),
        }
    }
}

impl DescribeToken for crate::template::ExprToken {
    fn describe(&self) -> String {
        use crate::template::ExprToken;
        match self {
            ExprToken::Ident(s) => format!("identifier '{}'", s),
            ExprToken::String(s) => format!("string \"{}\"", s),
            ExprToken::If => "keyword 'if'".to_string(),
            ExprToken::ElseIf => "keyword 'elseif'".to_string(),
            ExprToken::Else => "keyword 'else'".to_string(),
            ExprToken::EndIf => "keyword 'endif'".to_string(),
            ExprToken::ParenOpen => "'('".to_string(),
            ExprToken::ParenClose => "')'".to_string(),
            ExprToken::BracketOpen => "'['".to_string(),
            ExprToken::BracketClose => "']'".to_string(),
            ExprToken::Comma => "','".to_string(),
            ExprToken::Semicolon => "';'".to_string(),
            ExprToken::Colon => "':'".to_string(),
            ExprToken::Dot => "'.'".to_string(),
            ExprToken::Equals => "'='".to_string(),
            ExprToken::Bang => "'!'".to_string(),
            ExprToken::And => "'&&'".to_string(),
            ExprToken::Or => "'||'".to_string(),
        }
    }
}
