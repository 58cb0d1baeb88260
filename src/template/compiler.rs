//! Template body compiler
//!
//! Splits a body into literal text and delimited tags, then nests the
//! conditional tags into a tree. Delimiters are configurable, so this scan is
//! done by hand; the text inside each tag goes through [`parse_tag`].

use crate::config::Delimiters;
use crate::error::{ParseError, Span};

use super::expr::{parse_tag, Condition, Expr, ExprOptions, Tag};

/// Compiled template body node
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(String),
    Expr {
        expr: Expr,
        options: ExprOptions,
    },
    If {
        branches: Vec<(Condition, Vec<Element>)>,
        otherwise: Option<Vec<Element>>,
    },
}

#[derive(Debug)]
enum Chunk {
    Text(String),
    Tag(Tag, Span),
    /// `<\\>`: drop the newline and indentation that follow
    SwallowNewline,
}

impl Chunk {
    fn is_conditional(&self) -> bool {
        matches!(
            self,
            Chunk::Tag(Tag::If(_) | Tag::ElseIf(_) | Tag::Else | Tag::EndIf, _)
        )
    }
}

/// Compile a template body
pub fn compile(body: &str, delimiters: Delimiters) -> Result<Vec<Element>, Vec<ParseError>> {
    let mut chunks = scan(body, delimiters)?;
    trim_standalone_lines(&mut chunks);
    build_tree(chunks)
}

fn scan(body: &str, delimiters: Delimiters) -> Result<Vec<Chunk>, Vec<ParseError>> {
    let Delimiters { start, stop } = delimiters;
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while pos < body.len() {
        let rest = &body[pos..];
        let Some(c) = rest.chars().next() else { break };

        // `\<` is a literal start delimiter
        if c == '\\' && rest[1..].starts_with(start) {
            text.push(start);
            pos += 1 + start.len_utf8();
            continue;
        }
        if c != start {
            text.push(c);
            pos += c.len_utf8();
            continue;
        }

        let inner_start = pos + start.len_utf8();
        let inner_rest = &body[inner_start..];

        // <! comment !>
        if inner_rest.starts_with('!') {
            let terminator = format!("!{}", stop);
            match inner_rest[1..].find(&terminator) {
                Some(end) => {
                    pos = inner_start + 1 + end + terminator.len();
                    continue;
                }
                None => {
                    return Err(vec![ParseError::custom(
                        pos..body.len(),
                        "Unterminated comment",
                    )])
                }
            }
        }

        let Some(inner_end) = find_stop(body, inner_start, stop) else {
            return Err(vec![ParseError::custom(
                pos..body.len(),
                format!("Unterminated expression, expected '{}'", stop),
            )]);
        };
        let inner = &body[inner_start..inner_end];
        let span = pos..inner_end + stop.len_utf8();
        pos = span.end;

        if !text.is_empty() {
            chunks.push(Chunk::Text(std::mem::take(&mut text)));
        }

        if inner.starts_with('\\') {
            chunks.extend(escapes(inner, span.clone())?);
            continue;
        }

        let tag = parse_tag(inner)
            .map_err(|errs| errs.into_iter().map(|e| e.offset(inner_start)).collect::<Vec<_>>())?;
        chunks.push(Chunk::Tag(tag, span));
    }

    if !text.is_empty() {
        chunks.push(Chunk::Text(text));
    }
    Ok(chunks)
}

/// Find the stop delimiter, skipping over quoted strings
fn find_stop(body: &str, from: usize, stop: char) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in body[from..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == stop {
            return Some(from + offset);
        }
    }
    None
}

/// `<\n>`, `<\t>`, `<\ >` and `<\\>`
fn escapes(inner: &str, span: Span) -> Result<Vec<Chunk>, Vec<ParseError>> {
    let mut chunks = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        let escaped = if c == '\\' { chars.next() } else { None };
        match escaped {
            Some('n') => chunks.push(Chunk::Text("\n".to_string())),
            Some('t') => chunks.push(Chunk::Text("\t".to_string())),
            Some(' ') => chunks.push(Chunk::Text(" ".to_string())),
            Some('\\') => chunks.push(Chunk::SwallowNewline),
            _ => {
                return Err(vec![ParseError::custom(
                    span,
                    format!("Invalid escape '<{}>'", inner),
                )])
            }
        }
    }
    Ok(chunks)
}

/// Width of the whitespace that precedes a tag on its own line, if the tag
/// starts the line
fn line_indent(text: &str, at_body_start: bool) -> Option<usize> {
    let tail = match text.rfind('\n') {
        Some(nl) => &text[nl + 1..],
        None if at_body_start => text,
        None => return None,
    };
    tail.chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some(tail.len())
}

/// Length of trailing whitespace plus newline that ends a tag's line
fn line_end(text: &str) -> Option<usize> {
    let indent = text.len() - text.trim_start_matches([' ', '\t']).len();
    let rest = &text[indent..];
    if rest.starts_with("\r\n") {
        Some(indent + 2)
    } else if rest.starts_with('\n') {
        Some(indent + 1)
    } else {
        None
    }
}

/// Conditional tags alone on a line do not leave a blank line behind
fn trim_standalone_lines(chunks: &mut [Chunk]) {
    // Every cut is decided on untouched text, so trimming one line cannot
    // hide the start of the next
    let cuts: Vec<(usize, usize, usize)> = (0..chunks.len())
        .filter(|&idx| chunks[idx].is_conditional())
        .filter_map(|idx| {
            let indent = match idx.checked_sub(1) {
                None => Some(0),
                Some(prev) => match &chunks[prev] {
                    Chunk::Text(text) => line_indent(text, prev == 0),
                    _ => None,
                },
            }?;
            let end = match chunks.get(idx + 1) {
                None => Some(0),
                Some(Chunk::Text(text)) => line_end(text),
                Some(_) => None,
            }?;
            Some((idx, indent, end))
        })
        .collect();

    for (idx, indent, end) in cuts {
        if let Some(Chunk::Text(prev)) = idx.checked_sub(1).map(|p| &mut chunks[p]) {
            prev.truncate(prev.len() - indent);
        }
        if let Some(Chunk::Text(next)) = chunks.get_mut(idx + 1) {
            next.drain(..end);
        }
    }

    for idx in 0..chunks.len() {
        if !matches!(chunks[idx], Chunk::SwallowNewline) {
            continue;
        }
        if let Some(Chunk::Text(next)) = chunks.get_mut(idx + 1) {
            if let Some(n) = line_end(next) {
                let trimmed = next[n..].trim_start_matches([' ', '\t']).to_string();
                *next = trimmed;
            }
        }
    }
}

/// An `if` whose `endif` has not been seen yet
struct OpenIf {
    branches: Vec<(Condition, Vec<Element>)>,
    /// Condition of the branch being collected; `None` once in `else`
    pending: Option<Condition>,
    current: Vec<Element>,
    span: Span,
}

fn build_tree(chunks: Vec<Chunk>) -> Result<Vec<Element>, Vec<ParseError>> {
    let mut root = Vec::new();
    let mut open: Vec<OpenIf> = Vec::new();

    fn target<'v>(root: &'v mut Vec<Element>, open: &'v mut [OpenIf]) -> &'v mut Vec<Element> {
        match open.last_mut() {
            Some(frame) => &mut frame.current,
            None => root,
        }
    }

    for chunk in chunks {
        match chunk {
            Chunk::Text(text) if text.is_empty() => {}
            Chunk::Text(text) => target(&mut root, &mut open).push(Element::Text(text)),
            Chunk::SwallowNewline => {}
            Chunk::Tag(Tag::Expr { expr, options }, _) => {
                target(&mut root, &mut open).push(Element::Expr { expr, options })
            }
            Chunk::Tag(Tag::If(condition), span) => open.push(OpenIf {
                branches: Vec::new(),
                pending: Some(condition),
                current: Vec::new(),
                span,
            }),
            Chunk::Tag(Tag::ElseIf(condition), span) => {
                let frame = open_frame(&mut open, &span, "elseif")?;
                let Some(previous) = frame.pending.take() else {
                    return Err(vec![ParseError::custom(span, "'elseif' after 'else'")]);
                };
                let body = std::mem::take(&mut frame.current);
                frame.branches.push((previous, body));
                frame.pending = Some(condition);
            }
            Chunk::Tag(Tag::Else, span) => {
                let frame = open_frame(&mut open, &span, "else")?;
                let Some(previous) = frame.pending.take() else {
                    return Err(vec![ParseError::custom(span, "Duplicate 'else'")]);
                };
                let body = std::mem::take(&mut frame.current);
                frame.branches.push((previous, body));
            }
            Chunk::Tag(Tag::EndIf, span) => {
                open_frame(&mut open, &span, "endif")?;
                let Some(mut frame) = open.pop() else {
                    continue;
                };
                let otherwise = match frame.pending.take() {
                    Some(condition) => {
                        frame.branches.push((condition, frame.current));
                        None
                    }
                    None => Some(frame.current),
                };
                target(&mut root, &mut open).push(Element::If {
                    branches: frame.branches,
                    otherwise,
                });
            }
        }
    }

    if let Some(frame) = open.pop() {
        return Err(vec![ParseError::custom(
            frame.span,
            "Missing 'endif' for 'if'",
        )]);
    }
    Ok(root)
}

fn open_frame<'f>(
    open: &'f mut [OpenIf],
    span: &Span,
    keyword: &str,
) -> Result<&'f mut OpenIf, Vec<ParseError>> {
    open.last_mut().ok_or_else(|| {
        vec![ParseError::custom(
            span.clone(),
            format!("'{}' without matching 'if'", keyword),
        )]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn angle(body: &str) -> Vec<Element> {
        compile(body, Delimiters::default()).expect("Should compile")
    }

    fn text(s: &str) -> Element {
        Element::Text(s.to_string())
    }

    fn attr(name: &str) -> Element {
        Element::Expr {
            expr: Expr::Attribute(name.to_string()),
            options: ExprOptions::default(),
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(angle("select 1"), vec![text("select 1")]);
    }

    #[test]
    fn test_text_and_attributes() {
        assert_eq!(
            angle("select <cols> from <table>"),
            vec![text("select "), attr("cols"), text(" from "), attr("table")]
        );
    }

    #[test]
    fn test_escaped_start_delimiter() {
        assert_eq!(angle(r"a \< b"), vec![text("a < b")]);
    }

    #[test]
    fn test_stop_delimiter_alone_is_text() {
        assert_eq!(angle("a > b"), vec![text("a > b")]);
    }

    #[test]
    fn test_comment_dropped() {
        assert_eq!(angle("a<! note !>b"), vec![text("ab")]);
    }

    #[test]
    fn test_dollar_delimiters() {
        let elements = compile("x < $y$", Delimiters::new('$', '$')).unwrap();
        assert_eq!(elements, vec![text("x < "), attr("y")]);
    }

    #[test]
    fn test_stop_inside_string_option() {
        let elements = angle(r#"<xs; separator=">">"#);
        assert_eq!(
            elements,
            vec![Element::Expr {
                expr: Expr::Attribute("xs".to_string()),
                options: ExprOptions {
                    separator: Some(Expr::Literal(">".to_string())),
                    null: None,
                },
            }]
        );
    }

    #[test]
    fn test_special_escapes() {
        assert_eq!(
            angle(r"a<\n>b<\t><\ >c"),
            vec![text("a"), text("\n"), text("b"), text("\t"), text(" "), text("c")]
        );
    }

    #[test]
    fn test_swallow_newline() {
        assert_eq!(angle("a<\\\\>\n    b"), vec![text("a"), text("b")]);
    }

    #[test]
    fn test_if_else_tree() {
        assert_eq!(
            angle("<if(a)>x<elseif(b)>y<else>z<endif>"),
            vec![Element::If {
                branches: vec![
                    (
                        Condition::Test(Expr::Attribute("a".to_string())),
                        vec![text("x")]
                    ),
                    (
                        Condition::Test(Expr::Attribute("b".to_string())),
                        vec![text("y")]
                    ),
                ],
                otherwise: Some(vec![text("z")]),
            }]
        );
    }

    #[test]
    fn test_standalone_conditionals_drop_their_lines() {
        let elements = angle("select *\n  <if(id)>\n  where id = 1\n  <endif>\nlimit 1");
        assert_eq!(
            elements,
            vec![
                text("select *\n"),
                Element::If {
                    branches: vec![(
                        Condition::Test(Expr::Attribute("id".to_string())),
                        vec![text("  where id = 1\n")]
                    )],
                    otherwise: None,
                },
                text("limit 1"),
            ]
        );
    }

    #[test]
    fn test_consecutive_conditional_lines() {
        let elements = angle("a\n<if(x)>\nb\n<endif>\n<if(y)>\nc\n<endif>\nd");
        let branch = |name: &str, body: &str| Element::If {
            branches: vec![(
                Condition::Test(Expr::Attribute(name.to_string())),
                vec![text(body)],
            )],
            otherwise: None,
        };
        assert_eq!(
            elements,
            vec![text("a\n"), branch("x", "b\n"), branch("y", "c\n"), text("d")]
        );
    }

    #[test]
    fn test_inline_conditional_keeps_whitespace() {
        assert_eq!(
            angle("a <if(x)>b<endif> c"),
            vec![
                text("a "),
                Element::If {
                    branches: vec![(
                        Condition::Test(Expr::Attribute("x".to_string())),
                        vec![text("b")]
                    )],
                    otherwise: None,
                },
                text(" c"),
            ]
        );
    }

    #[test]
    fn test_missing_endif_is_error() {
        let errors = compile("<if(a)>x", Delimiters::default()).unwrap_err();
        assert!(errors[0].to_string().contains("Missing 'endif'"));
    }

    #[test]
    fn test_stray_endif_is_error() {
        let errors = compile("x<endif>", Delimiters::default()).unwrap_err();
        assert!(errors[0].to_string().contains("without matching 'if'"));
    }

    #[test]
    fn test_unterminated_expression_is_error() {
        let errors = compile("select <cols", Delimiters::default()).unwrap_err();
        assert!(errors[0].to_string().contains("Unterminated expression"));
        assert_eq!(errors[0].span(), &(7..12));
    }

    #[test]
    fn test_expression_error_span_is_body_relative() {
        let errors = compile("ab <x + y>", Delimiters::default()).unwrap_err();
        assert_eq!(errors[0].span(), &(6..7));
    }
}
