use anyhow::{Context, Result};
use clap::Parser;
use routemap::mapgen::{GeneratedMap, MapNode, audit};
use routemap::{MapProgress, MapSnapshot, ParameterSet, balance_choices, generate};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed to generate from; a fresh one is drawn when omitted
    #[arg(short, long)]
    seed: Option<u64>,
    /// TOML file overriding any subset of the default parameters
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Run the reward balancer with this spread threshold
    #[arg(short, long)]
    balance: Option<f64>,
    /// Print the map and report as JSON instead of text rows
    #[arg(long)]
    json: bool,
    /// Write a snapshot of the map to this path
    #[arg(long)]
    save: Option<PathBuf>,
}

fn load_params(path: Option<&Path>) -> Result<ParameterSet> {
    let Some(path) = path else {
        return Ok(ParameterSet::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file: {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("Failed to parse parameter file: {}", path.display()))
}

fn describe(node: &MapNode) -> String {
    let parents: Vec<String> = node.parents.iter().map(|parent| parent.0.to_string()).collect();
    if parents.is_empty() {
        format!("{}{}", node.kind.glyph(), node.id.0)
    } else {
        format!("{}{}<{}", node.kind.glyph(), node.id.0, parents.join(","))
    }
}

fn print_text(map: &GeneratedMap) {
    for (level, row) in map.graph.rows().iter().enumerate() {
        let cells: Vec<String> = row.iter().map(describe).collect();
        println!("{level:>3} | {}", cells.join("  "));
    }
    let report = &map.report;
    println!("Seed: {}", map.seed);
    println!("Fingerprint: {:016x}", map.graph.fingerprint());
    println!(
        "Guaranteed elites: {} placed, {} unmet, {} relaxed",
        report.guaranteed_elites.len(),
        report.unmet_elites,
        report.relaxed_elites.len()
    );
    println!(
        "Guaranteed shops: {} placed, {} unmet, {} relaxed",
        report.guaranteed_shops.len(),
        report.unmet_shops,
        report.relaxed_shops.len()
    );
    println!("Density fixes: {}", report.density_fixes);
    println!("Safety merges: {}", report.safety_merges);
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let params = load_params(args.params.as_deref())?;
    let mut map = generate(args.seed, &params).context("Invalid parameter set")?;
    if let Some(threshold) = args.balance {
        map.graph = balance_choices(map.graph, &params, threshold);
    }

    let violations = audit(&map.graph, &params);
    for violation in &violations {
        log::warn!("audit: {violation}");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&map).context("Failed to serialize map")?;
        println!("{json}");
    } else {
        print_text(&map);
    }

    if let Some(path) = &args.save {
        let progress = MapProgress::new(&map.graph);
        MapSnapshot::capture(map.seed, &map.graph, &progress)
            .write_atomic(path)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        log::info!("saved snapshot to {}", path.display());
    }

    Ok(())
}
