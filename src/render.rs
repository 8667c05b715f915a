//! ASCII rendering of stored estimate trees for the CLI.

use crate::models::{EstimateNode, EstimationTree, NodeKind};

/// Render an estimate tree as an ASCII hierarchy.
///
/// Example output:
/// ```text
/// Substructure
/// ├── Trench excavation: 19.44 m3
/// └── Strip footing concrete: 8.64 m3
/// Finishes
/// └── Floor screed: 6.4 m3
/// ```
pub fn render_tree(tree: &EstimationTree, show_costs: bool) -> String {
    let mut output = String::new();
    let sections = tree.sections();
    for section in &sections {
        output.push_str(&section.label);
        output.push('\n');
        let children = tree.children(section.id);
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            render_node(&mut output, tree, child, "", is_last, show_costs);
        }
    }
    output
}

fn render_node(
    output: &mut String,
    tree: &EstimationTree,
    node: &EstimateNode,
    prefix: &str,
    is_last: bool,
    show_costs: bool,
) {
    let branch = if is_last { "└── " } else { "├── " };
    output.push_str(prefix);
    output.push_str(branch);
    if node.kind == NodeKind::Resource {
        output.push_str("· ");
    }
    output.push_str(&node.label);
    if let (Some(quantity), Some(unit)) = (node.quantity, &node.unit) {
        output.push_str(": ");
        output.push_str(&format_quantity(quantity));
        output.push(' ');
        output.push_str(unit);
    }
    if show_costs {
        if let Some(cost) = node.cost {
            output.push_str(&format!("  ({cost:.2})"));
        }
    }
    output.push('\n');

    let continuation = if is_last { "    " } else { "│   " };
    let child_prefix = format!("{}{}", prefix, continuation);
    let children = tree.children(node.id);
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(output, tree, child, &child_prefix, child_is_last, show_costs);
    }
}

/// Quantities are stored at 3 decimals; drop trailing zeros for display.
fn format_quantity(quantity: f64) -> String {
    let text = format!("{quantity:.3}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
