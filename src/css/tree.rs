//! Owned CSS tree.
//!
//! Every node is owned by the child vector of its parent, so detaching a node
//! from that vector drops the whole subtree.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(Rule),
    AtRule(AtRule),
    Declaration(Declaration),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    pub nodes: Vec<Node>,
}

/// An at-rule. `nodes` is `None` for statement at-rules like `@import "x";`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    pub nodes: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Stylesheet {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn declaration_count(&self) -> usize {
        count_declarations(&self.nodes)
    }
}

fn count_declarations(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Declaration(_) => 1,
            _ => node.children().map(count_declarations).unwrap_or(0),
        })
        .sum()
}

impl Node {
    pub fn rule(selector: impl Into<String>, nodes: Vec<Node>) -> Self {
        Node::Rule(Rule {
            selector: selector.into(),
            nodes,
        })
    }

    pub fn at_rule(name: impl Into<String>, params: impl Into<String>, nodes: Vec<Node>) -> Self {
        Node::AtRule(AtRule {
            name: name.into(),
            params: params.into(),
            nodes: Some(nodes),
        })
    }

    pub fn statement(name: impl Into<String>, params: impl Into<String>) -> Self {
        Node::AtRule(AtRule {
            name: name.into(),
            params: params.into(),
            nodes: None,
        })
    }

    pub fn decl(property: impl Into<String>, value: impl Into<String>) -> Self {
        Node::Declaration(Declaration {
            property: property.into(),
            value: value.into(),
        })
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Rule(rule) => Some(&rule.nodes),
            Node::AtRule(at_rule) => at_rule.nodes.as_deref(),
            Node::Declaration(_) | Node::Comment(_) => None,
        }
    }

    /// Textual frame this node contributes to the structural path of its
    /// descendants.
    pub fn frame(&self) -> Option<String> {
        match self {
            Node::Rule(rule) => Some(rule.selector.clone()),
            Node::AtRule(at_rule) => Some(at_rule.frame()),
            Node::Declaration(_) | Node::Comment(_) => None,
        }
    }
}

impl AtRule {
    pub fn frame(&self) -> String {
        if self.params.is_empty() {
            format!("@{}", self.name)
        } else {
            format!("@{} {}", self.name, self.params)
        }
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write_node(f, node, 0)?;
        }
        Ok(())
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        Node::Declaration(decl) => writeln!(f, "{}{}: {};", indent, decl.property, decl.value),
        Node::Comment(text) => writeln!(f, "{}/*{}*/", indent, text),
        Node::Rule(rule) => write_block(f, &indent, &rule.selector, &rule.nodes, depth),
        Node::AtRule(at_rule) => match at_rule.nodes.as_ref() {
            Some(nodes) => write_block(f, &indent, &at_rule.frame(), nodes, depth),
            None => writeln!(f, "{}{};", indent, at_rule.frame()),
        },
    }
}

fn write_block(
    f: &mut fmt::Formatter<'_>,
    indent: &str,
    header: &str,
    nodes: &[Node],
    depth: usize,
) -> fmt::Result {
    writeln!(f, "{}{} {{", indent, header)?;
    for child in nodes {
        write_node(f, child, depth + 1)?;
    }
    writeln!(f, "{}}}", indent)
}

#[cfg(test)]
mod tests {
    use super::{Node, Stylesheet};

    #[test]
    fn renders_nested_blocks_with_indentation() {
        let sheet = Stylesheet::new(vec![
            Node::statement("layer", "theme, base"),
            Node::at_rule(
                "media",
                "(min-width: 40rem)",
                vec![Node::rule(".hero", vec![Node::decl("margin", "0")])],
            ),
        ]);
        assert_eq!(
            sheet.to_string(),
            "@layer theme, base;\n@media (min-width: 40rem) {\n  .hero {\n    margin: 0;\n  }\n}\n"
        );
    }

    #[test]
    fn empty_sheet_renders_nothing() {
        assert_eq!(Stylesheet::default().to_string(), "");
    }

    #[test]
    fn counts_declarations_at_any_depth() {
        let sheet = Stylesheet::new(vec![
            Node::rule(".a", vec![Node::decl("color", "red"), Node::Comment(" x ".into())]),
            Node::at_rule(
                "supports",
                "(display: grid)",
                vec![Node::rule(".b", vec![Node::decl("display", "grid")])],
            ),
            Node::statement("charset", "\"utf-8\""),
        ]);
        assert_eq!(sheet.declaration_count(), 2);
    }
}
