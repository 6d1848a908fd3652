use anyhow::{Result, bail};
use clap::Parser;
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};
use routemap::mapgen::audit;
use routemap::{MapGraph, MapProgress, ParameterSet, generate};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    /// Number of consecutive map seeds to check
    #[arg(short, long, default_value_t = 1000)]
    maps: u64,
}

fn choose<T: Copy>(rng: &mut ChaCha8Rng, slice: &[T]) -> T {
    let p = rng.next_u64() as usize % slice.len();
    slice[p]
}

/// Walks one random route to the boss, asserting tracker invariants after every step.
fn walk_route(graph: &MapGraph, rng: &mut ChaCha8Rng) -> Result<usize> {
    let mut progress = MapProgress::new(graph);
    let children = graph.children();
    let index = graph.index();

    let mut options: Vec<_> = progress.enabled().iter().copied().collect();
    let mut steps = 0;
    while !options.is_empty() {
        let current = choose(rng, &options);
        assert!(progress.is_enabled(current), "Invariant failed: chose disabled node");
        assert!(progress.mark_completed(current)?, "Invariant failed: node already completed");
        assert!(
            progress.enabled().is_disjoint(progress.completed()),
            "Invariant failed: enabled and completed overlap"
        );
        for id in progress.enabled() {
            let node = graph.node_at(index[id]);
            assert!(
                node.level == 0 || node.parents.iter().any(|p| progress.is_completed(*p)),
                "Invariant failed: {id} enabled without a completed parent"
            );
        }
        steps += 1;
        options = children[&current].clone();
    }

    if !progress.is_finished() {
        bail!("route stopped after {steps} steps without reaching the boss");
    }
    Ok(steps)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Starting fuzz harness from seed {} over {} maps...", args.seed, args.maps);
    let params = ParameterSet::default();
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut unmet = 0;

    for map_seed in args.seed..args.seed.saturating_add(args.maps) {
        let map = generate(Some(map_seed), &params)?;
        let violations = audit(&map.graph, &params);
        assert!(violations.is_empty(), "map seed {map_seed} violates {violations:?}");
        if !map.report.guarantees_met() {
            unmet += 1;
        }

        let steps = walk_route(&map.graph, &mut rng)?;
        assert_eq!(steps, map.graph.level_count(), "route must visit one node per level");
    }

    println!("Maps with unmet guarantees: {unmet}");
    println!("Fuzzing completed successfully.");
    Ok(())
}
