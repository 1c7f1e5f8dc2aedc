mod parser;
mod path;
mod prune;
mod tree;

pub use parser::parse_css;
pub use path::{PATH_SEPARATOR, PathSet, aggregate_paths, build_path, walk_declarations};
pub use prune::{prune_by_paths, prune_empty, strip_at_rules, subtract};
pub use tree::{AtRule, Declaration, Node, Rule, Stylesheet};
