use crate::GatewayFormat;
use crate::progress::ApplyProgress;
use crate::utils::{display_value, load_stack, schedule_options};
use anyhow::Context;
use colored::Colorize;
use stackflow_cloud::{ApplyReport, OutputSet, Scheduler, project, project_available};
use stackflow_cloud_local::LocalCloudProvider;
use stackflow_core::{Graph, InstanceMap, StackFile};
use stackflow_gateway::{HealthCheckPolicy, ServiceSpec, TopologyConfig, pool_members, render_kong, synthesize};
use std::path::PathBuf;
use std::sync::Arc;

pub struct ApplyArgs {
    pub file: Option<PathBuf>,
    pub gateway_out: Option<PathBuf>,
    pub format: GatewayFormat,
    pub fail: Vec<String>,
    pub concurrency: Option<usize>,
}

pub async fn handle(args: ApplyArgs) -> anyhow::Result<()> {
    let (_, stack) = load_stack(args.file)?;
    let graph = Graph::from_stack(&stack.stack)?;
    let options = schedule_options(args.concurrency)?;

    let provider = args
        .fail
        .iter()
        .fold(LocalCloudProvider::new("local-1"), |p, id| p.with_failure(id));

    println!(
        "Applying {} ({} instances, concurrency {})",
        stack.name.cyan(),
        graph.len(),
        options.concurrency
    );

    let progress = Arc::new(ApplyProgress::new(graph.len()));
    let report = Scheduler::new(Arc::new(provider))
        .with_options(options)
        .with_observer(progress.clone())
        .apply(&graph, &InstanceMap::new())
        .await;

    if report.is_success() {
        progress.finish_success();
    } else {
        progress.finish_error(report.failures().len());
    }

    print_instances(&graph, &report);

    if !report.is_success() {
        // whatever did come up is still worth showing
        let outputs = project_available(&stack.outputs, &report.instances).context("failed to project outputs")?;
        print_outputs(&outputs);

        eprintln!();
        eprintln!("{}", "✗ Apply failed".red().bold());
        for failure in report.failures() {
            eprintln!("  {}: {}", failure.id.red(), failure.cause);
        }
        std::process::exit(1);
    }

    let outputs = project(&stack.outputs, &report.instances).context("failed to project outputs")?;
    print_outputs(&outputs);

    if !stack.gateways.is_empty() {
        let configs = synthesize_gateways(&stack, &report.instances)?;
        let rendered = render(&configs, args.format)?;
        match args.gateway_out {
            Some(path) => {
                std::fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
                println!();
                println!("Gateway config written to {}", path.display().to_string().cyan());
            }
            None => {
                println!();
                println!("{}", "Gateway config:".bold());
                print!("{}", rendered);
            }
        }
    }

    println!();
    println!("{} {} ({} ms)", "✓".green().bold(), report.summary(), report.duration_ms);
    Ok(())
}

fn print_outputs(outputs: &OutputSet) {
    if outputs.is_empty() {
        return;
    }
    println!();
    println!("{}", "Outputs:".bold());
    for (name, value) in outputs.iter() {
        println!("  {} = {}", name.cyan(), display_value(value));
    }
}

fn print_instances(graph: &Graph, report: &ApplyReport) {
    println!();
    println!("{}", "Resources:".bold());
    for index in graph.topological_order() {
        let id = &graph.node(index).id;
        let Some(instance) = report.instances.get(id) else {
            continue;
        };
        let address = instance.attribute_str("private_ip").unwrap_or("-");
        let status = format!("{:<10}", instance.status.to_string());
        let status = if instance.is_ready() { status.green() } else { status.red() };
        println!("  {:<16} {} {}", id, status, address);
    }
}

fn synthesize_gateways(stack: &StackFile, instances: &InstanceMap) -> anyhow::Result<Vec<TopologyConfig>> {
    stack
        .gateways
        .iter()
        .map(|decl| {
            let service = ServiceSpec::from_decl(decl);
            let policy = HealthCheckPolicy::from_decl(decl.health_check.as_ref());
            let pool = pool_members(&decl.pool, instances);
            synthesize(&service, &pool, &policy)
                .with_context(|| format!("gateway {} could not be synthesized", decl.service_name))
        })
        .collect()
}

/// Kong YAML documents are separated with `---`; JSON is one array.
fn render(configs: &[TopologyConfig], format: GatewayFormat) -> anyhow::Result<String> {
    match format {
        GatewayFormat::Yaml => {
            let documents = configs.iter().map(render_kong).collect::<Result<Vec<_>, _>>()?;
            Ok(documents.join("---\n"))
        }
        GatewayFormat::Json => {
            let mut json = serde_json::to_string_pretty(configs)?;
            json.push('\n');
            Ok(json)
        }
    }
}
