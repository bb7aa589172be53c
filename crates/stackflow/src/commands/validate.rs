use colored::Colorize;
use stackflow_core::{Graph, StackError, parse_stack_file};
use std::path::PathBuf;

pub fn handle(file: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let path = match file {
        Some(path) => path,
        None => stackflow_config::find_stack_file()?,
    };
    println!("Stack file: {}", path.display().to_string().cyan());

    let result = parse_stack_file(&path).and_then(|file| {
        let graph = Graph::from_stack(&file.stack)?;
        Ok((file, graph))
    });

    match result {
        Ok((file, graph)) => {
            println!("{}", "✓ Stack is valid".green().bold());
            println!();
            println!("Summary ({}):", file.name.cyan());
            println!("  Resources: {}", file.stack.len());
            for spec in file.stack.specs() {
                if spec.kind.is_set() {
                    let keys: Vec<&str> = spec.keys().map(String::as_str).collect();
                    println!("    - {} ({}: {})", spec.id.cyan(), spec.kind, keys.join(", "));
                } else {
                    println!("    - {} ({})", spec.id.cyan(), spec.kind);
                }
            }
            println!("  Instances: {}", graph.len());
            if !file.gateways.is_empty() {
                println!("  Gateways: {}", file.gateways.len());
                for gateway in &file.gateways {
                    println!("    - {} (pool: {})", gateway.service_name.cyan(), gateway.pool);
                }
            }
            if !file.outputs.is_empty() {
                println!("  Outputs: {}", file.outputs.len());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!();
            let title = match &e {
                StackError::Cycle(_) => "✗ Dependency cycle",
                StackError::KdlParse(_) => "✗ Syntax error",
                _ => "✗ Invalid stack",
            };
            eprintln!("{}", title.red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
