//! Random rollouts on any arena
//!
//! Plays episodes with uniformly random actions and prints a JSON summary.
//!
//! Run with:
//! ```bash
//! cargo run --example rollout -- --arena parking --episodes 20 --seed 3
//! cargo run --example rollout -- --config arena.json
//! ```

use anyhow::Result;
use arena_rl::prelude::*;
use arena_rl::utils::init_tracing;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ArenaKind {
    Balance,
    Parking,
    Pellet,
    Chase,
}

#[derive(Debug, Parser)]
#[command(about = "Play random episodes on an arena")]
struct Args {
    /// Arena to build with default parameters
    #[arg(long, value_enum, default_value = "balance")]
    arena: ArenaKind,

    /// JSON config file; overrides --arena
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[arg(long, default_value_t = 10)]
    episodes: usize,

    /// Tick cap per episode
    #[arg(long, default_value_t = 5_000)]
    max_ticks: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn default_config(kind: ArenaKind) -> ArenaConfig {
    match kind {
        ArenaKind::Balance => ArenaConfig::Balance(BalanceConfig::new()),
        ArenaKind::Parking => ArenaConfig::Parking(ParkingConfig::new()),
        ArenaKind::Pellet => ArenaConfig::Pellet(PelletConfig::new()),
        ArenaKind::Chase => ArenaConfig::Chase(ChaseConfig::new()),
    }
}

fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ArenaConfig::from_file(path)?,
        None => default_config(args.arena),
    };
    let name = config.name();
    tracing::info!(arena = name, episodes = args.episodes, seed = args.seed, "starting rollouts");

    let report = match config.with_seed(args.seed).build()? {
        Arena::Solo(mut env) => {
            let mut source = UniformRandom::for_space(&env.action_space(), Some(args.seed))?;
            let stats = run_episodes(env.as_mut(), &mut source, args.episodes, args.max_ticks)?;
            tracing::info!(
                "{}: success rate {:.2}, average reward {:.2}",
                name,
                stats.success_rate(),
                stats.average_reward()
            );
            serde_json::to_value(&stats)?
        }
        Arena::Chase(mut env) => {
            let mut cat = UniformRandom::for_space(&env.action_space(Role::Cat), Some(args.seed))?;
            let mut mouse =
                UniformRandom::for_space(&env.action_space(Role::Mouse), Some(args.seed + 1))?;
            let mut cats = RolloutStats::default();
            let mut mice = RolloutStats::default();
            for _ in 0..args.episodes {
                let summary = run_chase_episode(&mut env, &mut cat, &mut mouse, args.max_ticks)?;
                cats.add(&summary.cat);
                mice.add(&summary.mouse);
            }
            tracing::info!(
                "chase: cat success rate {:.2}, mouse success rate {:.2}",
                cats.success_rate(),
                mice.success_rate()
            );
            serde_json::json!({ "cat": cats, "mouse": mice })
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
