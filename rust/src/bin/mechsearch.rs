use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context};
use clap::Parser;
use mechsearch::chem::TransitionGuard;
use mechsearch::pipeline::make_weight;
use mechsearch::{
    explore_network, plan_with_catalysts, shortest_simple_paths, DerivationExpander, DistanceGuard,
    ExplorationConfig, Path, ReactionNetwork, SearchAlgorithm, WeightKind,
};

#[derive(Parser, Debug)]
#[command(name = "mechsearch", about = "Search reaction mechanisms in a rule-derived state space")]
struct Args {
    /// Reaction network JSON with its initial and target states
    network: PathBuf,

    /// Exploration settings JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_length: Option<usize>,

    #[arg(long)]
    num_paths: Option<usize>,

    #[arg(long, value_enum)]
    algorithm: Option<SearchAlgorithm>,

    #[arg(long, value_enum)]
    weight: Option<WeightKind>,

    #[arg(long)]
    expansion_limit: Option<usize>,

    /// Maximum atom distance of a bond formed in one step
    #[arg(long)]
    displacement_threshold: Option<f64>,

    /// Try combinations of up to this many catalysts from the network
    #[arg(long, default_value_t = 0)]
    catalysts: usize,

    #[arg(long)]
    no_prune: bool,

    /// Write the explored state space as JSON
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<ExplorationConfig> {
    let mut config = match &args.config {
        Some(path) => ExplorationConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ExplorationConfig::default(),
    };
    if let Some(max_length) = args.max_length {
        config.max_length = max_length;
    }
    if let Some(num_paths) = args.num_paths {
        config.num_paths = num_paths;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(weight) = args.weight {
        config.weight = weight;
    }
    if args.expansion_limit.is_some() {
        config.expansion_limit = args.expansion_limit;
    }
    if args.displacement_threshold.is_some() {
        config.displacement_threshold = args.displacement_threshold;
    }
    if args.no_prune {
        config.prune = false;
    }
    Ok(config)
}

fn print_mechanism(rank: usize, cost: f64, path: &Path) {
    println!("#{rank} cost={cost} steps={}", path.len());
    println!("    {path}");
}

fn run_with_catalysts(network: ReactionNetwork, config: &ExplorationConfig, max_catalysts: usize) -> anyhow::Result<String> {
    let guard = config.displacement_threshold.map(|threshold| {
        Rc::new(DistanceGuard::from_bonds(
            network.atom_count(),
            network.atom_bonds(),
            threshold,
        )) as Rc<dyn TransitionGuard>
    });
    let weight = make_weight(config.weight, network.energies());
    let initial = network.initial_state();
    let target = network.target_state();
    let catalysts = network.catalysts().to_vec();
    if catalysts.is_empty() {
        bail!("--catalysts given but the network declares no catalysts");
    }

    let expander = Rc::new(RefCell::new(DerivationExpander::with_max_sub_multiset_size(
        network,
        config.max_sub_multiset_size,
    )));
    let plan = plan_with_catalysts(&expander, &initial, &target, &catalysts, max_catalysts, config, guard)?;
    for chosen in &plan.productive {
        let names: Vec<&str> = chosen.iter().map(|s| s.name()).collect();
        println!("productive catalysts: {}", names.join(", "));
    }

    let mut space = plan.space;
    space.freeze();
    let paths = shortest_simple_paths(&mut space, weight.as_ref(), config.algorithm, config.search_expansion_limit);
    for (index, found) in paths.take(config.num_paths).enumerate() {
        let (cost, path) = found?;
        print_mechanism(index + 1, cost, &path);
    }
    Ok(serde_json::to_string_pretty(&space.to_json()?)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let text = std::fs::read_to_string(&args.network)
        .with_context(|| format!("reading network {}", args.network.display()))?;
    let network = ReactionNetwork::from_json_str(&text).context("parsing reaction network")?;

    let dump = if args.catalysts > 0 {
        run_with_catalysts(network, &config, args.catalysts)?
    } else {
        let result = explore_network(network, &config)?;
        println!("{}", result.space);
        if !result.connected {
            println!("no mechanism within {} steps", config.max_length);
        }
        for mechanism in &result.mechanisms {
            print_mechanism(mechanism.rank, mechanism.cost, &mechanism.path);
        }
        serde_json::to_string_pretty(&result.space.to_json()?)?
    };

    if let Some(path) = &args.dump {
        std::fs::write(path, dump).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
