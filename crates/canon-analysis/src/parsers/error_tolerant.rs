//! ERROR / MISSING node accounting.

use tree_sitter::Node;

/// Count ERROR and MISSING nodes in a tree.
pub fn count_errors(root: Node) -> usize {
    if !root.has_error() {
        return 0;
    }
    let mut count = 0;
    collect_errors(root, &mut count);
    count
}

fn collect_errors(node: Node, count: &mut usize) {
    if node.is_error() || node.is_missing() {
        *count += 1;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            collect_errors(child, count);
        }
    }
}
