use super::path::{PathSet, build_path};
use super::tree::{Node, Stylesheet};

pub fn prune_by_paths(sheet: &mut Stylesheet, excluded: &PathSet) {
    if excluded.is_empty() {
        return;
    }
    let mut frames = Vec::new();
    prune_declarations(&mut sheet.nodes, &mut frames, excluded);
}

fn prune_declarations(nodes: &mut Vec<Node>, frames: &mut Vec<String>, excluded: &PathSet) {
    nodes.retain_mut(|node| {
        if let Node::Declaration(decl) = node {
            return !excluded.contains(&build_path(frames.as_slice(), decl));
        }
        let Some(frame) = node.frame() else {
            return true;
        };
        let children = match node {
            Node::Rule(rule) => &mut rule.nodes,
            Node::AtRule(at_rule) => match at_rule.nodes.as_mut() {
                Some(children) => children,
                None => return true,
            },
            Node::Declaration(_) | Node::Comment(_) => return true,
        };
        frames.push(frame);
        prune_declarations(children, frames, excluded);
        frames.pop();
        true
    });
}

/// Remove every rule and at-rule left without children, innermost first.
///
/// Children are resolved before their parent is inspected, so a single pass
/// reaches the fixed point. Statement at-rules have no children and are
/// removed as well.
pub fn prune_empty(sheet: &mut Stylesheet) {
    prune_empty_nodes(&mut sheet.nodes);
}

fn prune_empty_nodes(nodes: &mut Vec<Node>) {
    nodes.retain_mut(|node| match node {
        Node::Rule(rule) => {
            prune_empty_nodes(&mut rule.nodes);
            !rule.nodes.is_empty()
        }
        Node::AtRule(at_rule) => match at_rule.nodes.as_mut() {
            Some(children) => {
                prune_empty_nodes(children);
                !children.is_empty()
            }
            None => false,
        },
        Node::Declaration(_) | Node::Comment(_) => true,
    });
}

pub fn subtract(sheet: &mut Stylesheet, excluded: &PathSet) {
    prune_by_paths(sheet, excluded);
    prune_empty(sheet);
}

pub fn strip_at_rules(sheet: &mut Stylesheet, name: &str) {
    strip_at_rule_nodes(&mut sheet.nodes, name);
}

fn strip_at_rule_nodes(nodes: &mut Vec<Node>, name: &str) {
    nodes.retain_mut(|node| match node {
        Node::AtRule(at_rule) if at_rule.name.eq_ignore_ascii_case(name) => false,
        Node::AtRule(at_rule) => {
            if let Some(children) = at_rule.nodes.as_mut() {
                strip_at_rule_nodes(children, name);
            }
            true
        }
        Node::Rule(rule) => {
            strip_at_rule_nodes(&mut rule.nodes, name);
            true
        }
        Node::Declaration(_) | Node::Comment(_) => true,
    });
}

#[cfg(test)]
mod tests {
    use super::{prune_by_paths, prune_empty, strip_at_rules, subtract};
    use crate::css::{Node, PathSet, Stylesheet, aggregate_paths};

    fn paths(items: &[&str]) -> PathSet {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn has_empty_container(nodes: &[Node]) -> bool {
        nodes.iter().any(|node| match node {
            Node::Rule(_) | Node::AtRule(_) => match node.children() {
                Some(children) => children.is_empty() || has_empty_container(children),
                None => true,
            },
            _ => false,
        })
    }

    #[test]
    fn removes_only_matching_declarations() {
        let mut sheet = Stylesheet::new(vec![Node::rule(
            ".btn",
            vec![Node::decl("color", "red"), Node::decl("padding", "4px")],
        )]);
        prune_by_paths(&mut sheet, &paths(&[".btn > color:red"]));
        assert_eq!(
            sheet,
            Stylesheet::new(vec![Node::rule(".btn", vec![Node::decl("padding", "4px")])])
        );
    }

    #[test]
    fn disjoint_path_set_leaves_declarations_untouched() {
        let mut sheet = Stylesheet::parse(
            ".a { color: red; } @media print { .a { color: red; } .b { margin: 0; } }",
        )
        .unwrap();
        let before = sheet.declaration_count();
        prune_by_paths(
            &mut sheet,
            &paths(&[".a > color:blue", "@media screen > .a > color:red", ".b > margin:0"]),
        );
        assert_eq!(sheet.declaration_count(), before);
    }

    #[test]
    fn drops_deeply_nested_containers_emptied_by_subtraction() {
        let mut sheet = Stylesheet::parse(
            r#"
@media (min-width: 40rem) {
  @media (prefers-color-scheme: dark) {
    @supports (display: grid) {
      .hero { margin: 0; }
    }
  }
}
.keep { color: red; }
"#,
        )
        .unwrap();
        subtract(
            &mut sheet,
            &paths(&[
                "@media (min-width: 40rem) > @media (prefers-color-scheme: dark) > @supports (display: grid) > .hero > margin:0",
            ]),
        );
        assert_eq!(
            sheet,
            Stylesheet::new(vec![Node::rule(".keep", vec![Node::decl("color", "red")])])
        );
        assert!(!has_empty_container(&sheet.nodes));
    }

    #[test]
    fn prune_empty_keeps_comments_and_leaves_root() {
        let mut sheet = Stylesheet::new(vec![
            Node::Comment(" banner ".to_string()),
            Node::rule(".empty", vec![]),
            Node::statement("layer", "theme, base"),
            Node::rule(".outer", vec![Node::rule(".inner", vec![])]),
            Node::rule(".note", vec![Node::Comment("only a comment".to_string())]),
        ]);
        prune_empty(&mut sheet);
        assert_eq!(
            sheet,
            Stylesheet::new(vec![
                Node::Comment(" banner ".to_string()),
                Node::rule(".note", vec![Node::Comment("only a comment".to_string())]),
            ])
        );

        let mut empty = Stylesheet::new(vec![Node::rule(".gone", vec![])]);
        prune_empty(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn subtracting_a_tree_from_itself_empties_it() {
        let mut sheet = Stylesheet::parse(
            ".a { color: red; } @media print { .a { color: red; } } @layer base { h1 { margin: 0; } }",
        )
        .unwrap();
        let own = aggregate_paths(&sheet);
        subtract(&mut sheet, &own);
        assert!(sheet.is_empty());
    }

    #[test]
    fn strips_source_directives_at_any_depth() {
        let mut sheet = Stylesheet::parse(
            r#"@source "/views/a.html"; @layer utilities { @source "/views/b.html"; .p-4 { padding: 1rem; } }"#,
        )
        .unwrap();
        strip_at_rules(&mut sheet, "source");
        assert_eq!(
            sheet,
            Stylesheet::new(vec![Node::at_rule(
                "layer",
                "utilities",
                vec![Node::rule(".p-4", vec![Node::decl("padding", "1rem")])]
            )])
        );
    }
}
