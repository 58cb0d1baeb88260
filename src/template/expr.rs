//! Expressions inside template body delimiters
//!
//! Everything between a start and stop delimiter is a *tag*: an attribute
//! expression with options, or one of the conditional keywords. Tags are lexed
//! with logos and parsed with chumsky.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use logos::Logos;

use crate::error::ParseError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum ExprToken {
    #[token("if")]
    If,
    #[token("elseif")]
    ElseIf,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,

    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=")]
    Equals,
    #[token("!")]
    Bang,
    #[token("&&")]
    And,
    #[token("||")]
    Or,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].replace("\\\"", "\"").replace("\\\\", "\\")
    })]
    String(String),
}

/// Value-producing expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `name`
    Attribute(String),
    /// `"text"`
    Literal(String),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `target.name`
    Property { target: Box<Expr>, name: String },
    /// `template(args)`
    Include { template: String, args: Vec<Expr> },
    /// `target:template(args)`
    Apply {
        target: Box<Expr>,
        template: String,
        args: Vec<Expr>,
    },
}

/// Condition of an `if` / `elseif` tag
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Test(Expr),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// Options following `;` in an expression tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprOptions {
    pub separator: Option<Expr>,
    pub null: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Expr { expr: Expr, options: ExprOptions },
    If(Condition),
    ElseIf(Condition),
    Else,
    EndIf,
}

/// Parse the text between one pair of delimiters
pub fn parse_tag(input: &str) -> Result<Tag, Vec<ParseError>> {
    let len = input.len();

    let mut tokens: Vec<(ExprToken, SimpleSpan)> = Vec::new();
    for (tok, span) in ExprToken::lexer(input).spanned() {
        match tok {
            Ok(tok) => tokens.push((tok, span.into())),
            Err(()) => {
                return Err(vec![ParseError::custom(
                    span.clone(),
                    format!("Unrecognized input '{}' in expression", &input[span]),
                )])
            }
        }
    }

    let token_stream = Stream::from_iter(tokens.into_iter())
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    tag_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(ParseError::from).collect())
}

fn tag_parser<'a, I>() -> impl Parser<'a, I, Tag, extra::Err<Rich<'a, ExprToken>>> + Clone
where
    I: ValueInput<'a, Token = ExprToken, Span = SimpleSpan>,
{
    let ident = select! {
        ExprToken::Ident(s) => s,
    };

    let string = select! {
        ExprToken::String(s) => s,
    };

    let expr = recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(ExprToken::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(ExprToken::ParenOpen), just(ExprToken::ParenClose));

        let include = ident
            .clone()
            .then(args.clone())
            .map(|(template, args): (String, Vec<Expr>)| Expr::Include { template, args });

        let list = expr
            .clone()
            .separated_by(just(ExprToken::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(ExprToken::BracketOpen), just(ExprToken::BracketClose))
            .map(Expr::List);

        // Include before plain attribute: both start with an identifier
        let atom = choice((
            include,
            ident.clone().map(Expr::Attribute),
            string.clone().map(Expr::Literal),
            list,
            expr.clone()
                .delimited_by(just(ExprToken::ParenOpen), just(ExprToken::ParenClose)),
        ));

        let member = atom.foldl(
            just(ExprToken::Dot).ignore_then(ident.clone()).repeated(),
            |target: Expr, name: String| Expr::Property {
                target: Box::new(target),
                name,
            },
        );

        member
            .foldl(
                just(ExprToken::Colon)
                    .ignore_then(ident.clone().then(args))
                    .repeated(),
                |target: Expr, (template, args): (String, Vec<Expr>)| Expr::Apply {
                    target: Box::new(target),
                    template,
                    args,
                },
            )
            .boxed()
    });

    let condition = recursive(|cond| {
        let atom = choice((
            cond.clone()
                .delimited_by(just(ExprToken::ParenOpen), just(ExprToken::ParenClose)),
            expr.clone().map(Condition::Test),
        ));

        let unary = just(ExprToken::Bang)
            .repeated()
            .foldr(atom, |_bang, c: Condition| Condition::Not(Box::new(c)));

        let conjunction = unary.clone().foldl(
            just(ExprToken::And).ignore_then(unary).repeated(),
            |l: Condition, r: Condition| Condition::And(Box::new(l), Box::new(r)),
        );

        conjunction
            .clone()
            .foldl(
                just(ExprToken::Or).ignore_then(conjunction).repeated(),
                |l: Condition, r: Condition| Condition::Or(Box::new(l), Box::new(r)),
            )
            .boxed()
    });

    let option = ident
        .clone()
        .then(just(ExprToken::Equals).ignore_then(expr.clone()).or_not());

    let options = just(ExprToken::Semicolon)
        .ignore_then(
            option
                .separated_by(just(ExprToken::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .or_not()
        .try_map(|opts, span| {
            let mut options = ExprOptions::default();
            for (name, value) in opts.unwrap_or_default() {
                let slot = match name.as_str() {
                    "separator" => &mut options.separator,
                    "null" => &mut options.null,
                    other => {
                        return Err(Rich::custom(span, format!("Unknown option '{}'", other)))
                    }
                };
                match value {
                    Some(v) => *slot = Some(v),
                    None => {
                        return Err(Rich::custom(
                            span,
                            format!("Option '{}' requires a value", name),
                        ))
                    }
                }
            }
            Ok(options)
        });

    let paren_condition =
        condition.delimited_by(just(ExprToken::ParenOpen), just(ExprToken::ParenClose));

    choice((
        just(ExprToken::If)
            .ignore_then(paren_condition.clone())
            .map(Tag::If),
        just(ExprToken::ElseIf)
            .ignore_then(paren_condition)
            .map(Tag::ElseIf),
        just(ExprToken::Else).to(Tag::Else),
        just(ExprToken::EndIf).to(Tag::EndIf),
        expr.then(options)
            .map(|(expr, options)| Tag::Expr { expr, options }),
    ))
    .then_ignore(end())
}
