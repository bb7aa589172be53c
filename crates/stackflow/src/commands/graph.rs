use crate::utils::load_stack;
use colored::Colorize;
use stackflow_core::Graph;
use std::path::PathBuf;

pub fn handle(file: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, stack) = load_stack(file)?;
    let graph = Graph::from_stack(&stack.stack)?;

    println!();
    println!("{}", "Provisioning order:".bold());
    for (position, index) in graph.topological_order().into_iter().enumerate() {
        let node = graph.node(index);
        let dependencies: Vec<&str> = node
            .dependencies
            .iter()
            .map(|&d| graph.node(d).id.as_str())
            .collect();

        if dependencies.is_empty() {
            println!("  {:>3}. {} ({})", position + 1, node.id.cyan(), node.kind);
        } else {
            println!(
                "  {:>3}. {} ({}) <- {}",
                position + 1,
                node.id.cyan(),
                node.kind,
                dependencies.join(", ")
            );
        }
    }
    Ok(())
}
