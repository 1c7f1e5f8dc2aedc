use std::collections::HashSet;

use super::tree::{Declaration, Node, Stylesheet};

pub const PATH_SEPARATOR: &str = " > ";

pub type PathSet = HashSet<String>;

/// Build the structural path of `decl`, given the frames of its ancestors from
/// outermost to innermost.
pub fn build_path<S: AsRef<str>>(ancestors: &[S], decl: &Declaration) -> String {
    let mut path = String::new();
    for frame in ancestors {
        path.push_str(frame.as_ref());
        path.push_str(PATH_SEPARATOR);
    }
    path.push_str(&decl.property);
    path.push(':');
    path.push_str(&decl.value);
    path
}

pub fn aggregate_paths(sheet: &Stylesheet) -> PathSet {
    let mut paths = PathSet::new();
    walk_declarations(sheet, |ancestors, decl| {
        paths.insert(build_path(ancestors, decl));
    });
    paths
}

pub fn walk_declarations<F>(sheet: &Stylesheet, mut visit: F)
where
    F: FnMut(&[String], &Declaration),
{
    let mut frames = Vec::new();
    walk_nodes(&sheet.nodes, &mut frames, &mut visit);
}

fn walk_nodes<F>(nodes: &[Node], frames: &mut Vec<String>, visit: &mut F)
where
    F: FnMut(&[String], &Declaration),
{
    for node in nodes {
        match node {
            Node::Declaration(decl) => visit(frames.as_slice(), decl),
            Node::Comment(_) => {}
            Node::Rule(_) | Node::AtRule(_) => {
                let (Some(frame), Some(children)) = (node.frame(), node.children()) else {
                    continue;
                };
                frames.push(frame);
                walk_nodes(children, frames, visit);
                frames.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate_paths, build_path};
    use crate::css::{Declaration, Node, Stylesheet};

    fn decl(property: &str, value: &str) -> Declaration {
        Declaration {
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn joins_frames_outermost_first() {
        let path = build_path(&["@media (min-width: 40rem)", ".btn"], &decl("color", "red"));
        assert_eq!(path, "@media (min-width: 40rem) > .btn > color:red");
    }

    #[test]
    fn identical_chains_produce_identical_paths() {
        let left = build_path(&[".card", "&:hover"], &decl("padding", "4px"));
        let right = build_path(&[".card".to_string(), "&:hover".to_string()], &decl("padding", "4px"));
        assert_eq!(left, right);
    }

    #[test]
    fn any_frame_difference_changes_the_path() {
        let base = build_path(&["@media (min-width: 40rem)", ".btn"], &decl("color", "red"));
        let other_params = build_path(&["@media (min-width: 48rem)", ".btn"], &decl("color", "red"));
        let other_selector = build_path(&["@media (min-width: 40rem)", ".btn-lg"], &decl("color", "red"));
        let other_value = build_path(&["@media (min-width: 40rem)", ".btn"], &decl("color", "blue"));
        let unwrapped = build_path(&[".btn"], &decl("color", "red"));
        for other in [other_params, other_selector, other_value, unwrapped] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn aggregation_collapses_duplicates_and_walks_nested_blocks() {
        let sheet = Stylesheet::new(vec![
            Node::rule(".btn", vec![Node::decl("color", "red")]),
            Node::rule(".btn", vec![Node::decl("color", "red")]),
            Node::at_rule(
                "media",
                "print",
                vec![Node::rule(".btn", vec![Node::decl("color", "red")])],
            ),
            Node::at_rule("font-face", "", vec![Node::decl("font-family", "Inter")]),
        ]);
        let paths = aggregate_paths(&sheet);
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(".btn > color:red"));
        assert!(paths.contains("@media print > .btn > color:red"));
        assert!(paths.contains("@font-face > font-family:Inter"));
    }
}
