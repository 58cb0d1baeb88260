//! Group file parser using chumsky

use std::collections::HashMap;

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::config::Delimiters;
use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{self, Token};

/// Parse group file source into an AST
///
/// Besides syntax, this rejects redefined names and aliases whose target is
/// not a template defined in the same file.
pub fn parse(input: &str) -> Result<GroupFile, Vec<ParseError>> {
    let len = input.len();

    let mut tokens: Vec<(Token, SimpleSpan)> = Vec::new();
    let mut errors = Vec::new();
    for item in lexer::lex(input) {
        match item {
            Ok((tok, span)) => tokens.push((tok, span.into())),
            Err(span) => errors.push(ParseError::custom(
                span.clone(),
                format!("Unrecognized input '{}'", &input[span]),
            )),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let token_stream = Stream::from_iter(tokens.into_iter())
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    let file = group_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(ParseError::from).collect::<Vec<_>>())?;

    validate(&file)?;
    Ok(file)
}

fn validate(file: &GroupFile) -> Result<(), Vec<ParseError>> {
    let mut errors = Vec::new();
    let mut defined: HashMap<&str, &Definition> = HashMap::new();

    for def in &file.definitions {
        let name = def.node.name();
        if defined.insert(name.node.as_str(), &def.node).is_some() {
            errors.push(ParseError::custom(
                name.span.clone(),
                format!("Redefinition of template '{}'", name.node),
            ));
        }
    }

    for def in &file.definitions {
        if let Definition::Alias { target, .. } = &def.node {
            match defined.get(target.node.as_str()) {
                Some(Definition::Template(_)) => {}
                Some(Definition::Alias { .. }) => errors.push(ParseError::custom(
                    target.span.clone(),
                    format!("Alias target '{}' is itself an alias", target.node),
                )),
                None => errors.push(ParseError::custom(
                    target.span.clone(),
                    format!("Alias target '{}' is not defined", target.node),
                )),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn group_parser<'a, I>() -> impl Parser<'a, I, GroupFile, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    let string_literal = select! {
        Token::String(s) => s,
    };

    // delimiters "<", ">"
    let delimiter_char = string_literal.clone().try_map(|s: String, span| {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Rich::custom(span, "Delimiter must be a single character")),
        }
    });
    let delimiters = just(Token::Delimiters)
        .ignore_then(delimiter_char.clone())
        .then_ignore(just(Token::Comma))
        .then(delimiter_char)
        .map_with(|(start, stop), e| {
            Spanned::new(Delimiters::new(start, stop), span_range(&e.span()))
        });

    // name or name="default"
    let formal = identifier
        .clone()
        .then(just(Token::Equals).ignore_then(string_literal).or_not())
        .map(|(name, default)| FormalArg { name, default });

    let formals = formal
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

    let body = select! {
        Token::String(s) => s,
        Token::BigString(s) => s,
        Token::BigStringNoNl(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    let template = identifier
        .clone()
        .then(formals)
        .then_ignore(just(Token::Define))
        .then(body)
        .map(|((name, formals), body)| {
            Definition::Template(TemplateDecl {
                name,
                formals,
                body,
            })
        });

    let alias = identifier
        .clone()
        .then_ignore(just(Token::Define))
        .then(identifier)
        .map(|(name, target)| Definition::Alias { name, target });

    // Template before alias: both start with an identifier
    let definition = choice((template, alias))
        .map_with(|d, e| Spanned::new(d, span_range(&e.span())));

    delimiters
        .or_not()
        .then(definition.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|(delimiters, definitions)| GroupFile {
            delimiters,
            definitions,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(def: &Spanned<Definition>) -> &TemplateDecl {
        match &def.node {
            Definition::Template(t) => t,
            other => panic!("Expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_string_template() {
        let file = parse(r#"greet(name) ::= "hi <name>""#).expect("Should parse");
        assert_eq!(file.definitions.len(), 1);
        let t = template(&file.definitions[0]);
        assert_eq!(t.name.node, "greet");
        assert_eq!(t.formals.len(), 1);
        assert_eq!(t.formals[0].name.node, "name");
        assert_eq!(t.body.node, "hi <name>");
    }

    #[test]
    fn test_parse_multiple_templates() {
        let file = parse(
            r#"
            // the create statement
            create() ::= <<
            create table something (id int primary key, name varchar)
            >>

            /* lookup */
            findById(table, id) ::= <%
                select * from <table>
                where id = <id>
            %>
        "#,
        )
        .expect("Should parse");
        assert_eq!(file.definitions.len(), 2);
        assert!(template(&file.definitions[0]).formals.is_empty());
        let body = &template(&file.definitions[1]).body.node;
        assert!(!body.contains('\n'));
        assert_eq!(
            body.split_whitespace().collect::<Vec<_>>().join(" "),
            "select * from <table> where id = <id>"
        );
    }

    #[test]
    fn test_parse_default_values() {
        let file = parse(r#"page(limit="10", offset) ::= "limit <limit>""#).expect("Should parse");
        let t = template(&file.definitions[0]);
        assert_eq!(t.formals[0].default.as_deref(), Some("10"));
        assert_eq!(t.formals[1].default, None);
    }

    #[test]
    fn test_parse_delimiters() {
        let file = parse(
            r#"
            delimiters "$", "$"
            t(x) ::= "value $x$"
        "#,
        )
        .expect("Should parse");
        assert_eq!(file.delimiters.unwrap().node, Delimiters::new('$', '$'));
    }

    #[test]
    fn test_parse_alias() {
        let file = parse(
            r#"
            find(id) ::= "select <id>"
            lookup ::= find
        "#,
        )
        .expect("Should parse");
        match &file.definitions[1].node {
            Definition::Alias { name, target } => {
                assert_eq!(name.node, "lookup");
                assert_eq!(target.node, "find");
            }
            _ => panic!("Expected alias"),
        }
    }

    #[test]
    fn test_redefinition_is_error() {
        let errors = parse(
            r#"
            a() ::= "one"
            a() ::= "two"
        "#,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Redefinition of template 'a'"));
    }

    #[test]
    fn test_alias_to_unknown_is_error() {
        let errors = parse("lookup ::= missing").unwrap_err();
        assert!(errors[0].to_string().contains("'missing' is not defined"));
    }

    #[test]
    fn test_missing_body_is_error() {
        assert!(parse("a() ::=").is_err());
    }

    #[test]
    fn test_multi_char_delimiter_is_error() {
        assert!(parse(r#"delimiters "<<", ">""#).is_err());
    }

    #[test]
    fn test_unterminated_body_is_error() {
        let errors = parse("a() ::= <<select").unwrap_err();
        assert!(errors[0].to_string().contains("Unrecognized input"));
    }

    #[test]
    fn test_empty_group() {
        let file = parse("  // nothing here\n").expect("Should parse");
        assert!(file.definitions.is_empty());
        assert!(file.delimiters.is_none());
    }
}
