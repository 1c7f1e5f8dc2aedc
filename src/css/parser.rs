use cssparser::{ParseError as CssParseError, ParseErrorKind, Parser, ParserInput, SourceLocation, Token};

use super::tree::{AtRule, Declaration, Node, Rule, Stylesheet};
use crate::{Error, Result};

type CssError<'i> = CssParseError<'i, String>;

enum Terminator {
    Block,
    Semicolon,
    End,
}

pub fn parse_css(css: &str) -> Result<Stylesheet> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let nodes = parse_nodes(&mut parser, true).map_err(|err| {
        let message = match err.kind {
            ParseErrorKind::Custom(message) => message,
            ParseErrorKind::Basic(kind) => format!("{:?}", kind),
        };
        Error::parse(message, err.location.line + 1, err.location.column)
    })?;
    Ok(Stylesheet::new(nodes))
}

impl Stylesheet {
    pub fn parse(css: &str) -> Result<Self> {
        parse_css(css)
    }
}

fn custom_error<'i>(location: SourceLocation, message: impl Into<String>) -> CssError<'i> {
    CssParseError {
        kind: ParseErrorKind::Custom(message.into()),
        location,
    }
}

/// Parse statements until the end of the current block (or of the input).
fn parse_nodes<'i>(parser: &mut Parser<'i, '_>, top_level: bool) -> std::result::Result<Vec<Node>, CssError<'i>> {
    let mut nodes = Vec::new();

    loop {
        let start = parser.position();
        let location = parser.current_source_location();
        let first = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(nodes),
        };
        match first {
            Token::WhiteSpace(_) | Token::Semicolon => continue,
            Token::Comment(text) => {
                nodes.push(Node::Comment(text.to_string()));
                continue;
            }
            _ => {}
        }

        let mut before = start;
        let mut current = first;
        let terminator = loop {
            match current {
                Token::CurlyBracketBlock => break Terminator::Block,
                Token::Semicolon => break Terminator::Semicolon,
                Token::CloseCurlyBracket if top_level => {
                    return Err(custom_error(parser.current_source_location(), "unexpected '}'"));
                }
                Token::BadString(_) => {
                    return Err(custom_error(location, "unterminated string"));
                }
                Token::BadUrl(_) => {
                    return Err(custom_error(location, "malformed url()"));
                }
                _ => {}
            }
            before = parser.position();
            match parser.next_including_whitespace_and_comments() {
                Ok(token) => current = token.clone(),
                Err(_) => break Terminator::End,
            }
        };

        let prelude = match terminator {
            Terminator::End => parser.slice_from(start),
            Terminator::Block | Terminator::Semicolon => parser.slice(start..before),
        }
        .trim();

        if let Some(rest) = prelude.strip_prefix('@') {
            let (name, params) = split_at_rule(rest);
            let children = match terminator {
                Terminator::Block => Some(parser.parse_nested_block(|block| parse_nodes(block, false))?),
                Terminator::Semicolon | Terminator::End => None,
            };
            nodes.push(Node::AtRule(AtRule {
                name: name.to_string(),
                params: params.to_string(),
                nodes: children,
            }));
            continue;
        }

        if let Terminator::Block = terminator {
            let children = parser.parse_nested_block(|block| parse_nodes(block, false))?;
            nodes.push(Node::Rule(Rule {
                selector: prelude.to_string(),
                nodes: children,
            }));
            continue;
        }

        let Some((property, value)) = prelude.split_once(':') else {
            return Err(custom_error(location, format!("expected ':' in '{}'", prelude)));
        };
        nodes.push(Node::Declaration(Declaration {
            property: property.trim().to_string(),
            value: value.trim().to_string(),
        }));
    }
}

fn split_at_rule(rest: &str) -> (&str, &str) {
    let name_end = rest
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
        .unwrap_or(rest.len());
    (&rest[..name_end], rest[name_end..].trim())
}

#[cfg(test)]
mod tests {
    use super::parse_css;
    use crate::Error;
    use crate::css::{AtRule, Node};

    #[test]
    fn parses_rules_declarations_and_comments() {
        let sheet = parse_css("/*! banner */\n.btn { color: red; padding: 4px }\n").unwrap();
        assert_eq!(sheet.nodes.len(), 2);
        assert_eq!(sheet.nodes[0], Node::Comment("! banner ".to_string()));
        assert_eq!(
            sheet.nodes[1],
            Node::rule(
                ".btn",
                vec![Node::decl("color", "red"), Node::decl("padding", "4px")]
            )
        );
    }

    #[test]
    fn parses_nested_at_rules_and_statements() {
        let css = r#"
@layer theme, base, utilities;
@import "tailwindcss" source(none);
@media (min-width: 40rem) {
  @supports (display: grid) {
    .grid { display: grid; }
  }
}
"#;
        let sheet = parse_css(css).unwrap();
        assert_eq!(sheet.nodes[0], Node::statement("layer", "theme, base, utilities"));
        assert_eq!(
            sheet.nodes[1],
            Node::statement("import", "\"tailwindcss\" source(none)")
        );
        let Node::AtRule(AtRule { name, params, nodes: Some(children) }) = &sheet.nodes[2] else {
            panic!("expected media block");
        };
        assert_eq!(name, "media");
        assert_eq!(params, "(min-width: 40rem)");
        assert_eq!(
            children[0],
            Node::at_rule(
                "supports",
                "(display: grid)",
                vec![Node::rule(".grid", vec![Node::decl("display", "grid")])]
            )
        );
    }

    #[test]
    fn keeps_braces_and_semicolons_inside_strings_and_parens() {
        let css = r#".q::before { content: "{;}"; background: url(data:image/png;base64,AA); }"#;
        let sheet = parse_css(css).unwrap();
        assert_eq!(
            sheet.nodes[0],
            Node::rule(
                ".q::before",
                vec![
                    Node::decl("content", "\"{;}\""),
                    Node::decl("background", "url(data:image/png;base64,AA)"),
                ]
            )
        );
    }

    #[test]
    fn parses_nested_selectors_and_important_values() {
        let sheet = parse_css(".a { color: red !important; &:hover { color: blue } }").unwrap();
        assert_eq!(
            sheet.nodes[0],
            Node::rule(
                ".a",
                vec![
                    Node::decl("color", "red !important"),
                    Node::rule("&:hover", vec![Node::decl("color", "blue")]),
                ]
            )
        );
    }

    #[test]
    fn custom_property_values_keep_inner_colons() {
        let sheet = parse_css(":root { --font: ui-sans-serif, system-ui; --x: a:b; }").unwrap();
        assert_eq!(
            sheet.nodes[0],
            Node::rule(
                ":root",
                vec![
                    Node::decl("--font", "ui-sans-serif, system-ui"),
                    Node::decl("--x", "a:b"),
                ]
            )
        );
    }

    #[test]
    fn reports_missing_colon_with_position() {
        let err = parse_css("\n.a {\n  color red;\n}\n").unwrap_err();
        match err {
            Error::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_stray_closing_brace() {
        assert!(matches!(parse_css(".a { color: red; } }"), Err(Error::Parse { .. })));
        assert!(matches!(parse_css("color: red }"), Err(Error::Parse { .. })));
    }

    #[test]
    fn round_trips_through_display() {
        let css = "@media (hover: hover) {\n  .a:hover {\n    color: red;\n  }\n}\n";
        let sheet = parse_css(css).unwrap();
        assert_eq!(sheet.to_string(), css);
        assert_eq!(parse_css(&sheet.to_string()).unwrap(), sheet);
    }
}
