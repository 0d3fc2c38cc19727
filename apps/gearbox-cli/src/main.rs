use anyhow::Context;
use clap::{Parser, Subcommand};
use gearbox_author::{ApplyForceHand, Hand, build, get_add_belt_hand, get_build_hand, update_apply_force};
use gearbox_common::EntityId;
use gearbox_kernel::{SimConfig, World};
use gearbox_persist::WorldStore;
use gearbox_tools::WorldInspector;
use glam::IVec2;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gearbox-cli", about = "CLI tool for gear worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Simulation config (JSON). Missing fields use defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build two meshed gears and a belt, push one gear, and run the clock
    Demo {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "120")]
        ticks: u64,
        /// Save the resulting world into this store directory
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
    /// Print a saved world
    Inspect {
        /// Store directory
        dir: PathBuf,
        /// Show a single entity, e.g. `gear.0.0`
        #[arg(short, long)]
        entity: Option<String>,
    },
    /// Check a saved world's schema, digest and structure
    Validate {
        /// Store directory
        dir: PathBuf,
    },
}

/// Fixed-period simulation clock. Frames of any length are split into whole
/// ticks; the remainder carries to the next frame.
struct Simulation {
    world: World,
    hand: Option<Hand>,
    period: f64,
    accumulator: f64,
    stopped: bool,
}

impl Simulation {
    fn new(world: World, config: &SimConfig) -> Self {
        Self {
            world,
            hand: None,
            period: config.tick_period(),
            accumulator: 0.0,
            stopped: false,
        }
    }

    /// Advance by one frame. Returns false once the simulation has stopped.
    ///
    /// Any error from a tick is an invariant violation: the world is no
    /// longer trustworthy, so the clock stops for good.
    fn advance(&mut self, frame: f64) -> bool {
        if self.stopped {
            return false;
        }
        self.accumulator += frame;
        while self.accumulator >= self.period {
            self.accumulator -= self.period;
            if let Err(err) = gearbox_author::tick(&mut self.world, self.hand.as_mut(), self.period) {
                tracing::error!(error = %err, tick = self.world.tick(), "simulation stopped");
                eprintln!("Something broke: {err}. The simulation has been stopped.");
                self.stopped = true;
                return false;
            }
        }
        true
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn demo_world(config: &SimConfig) -> anyhow::Result<World> {
    let mut world = World::new();
    for position in [IVec2::new(0, 0), IVec2::new(2, 0)] {
        let hand = get_build_hand(&world, position, 1, None, config)?;
        anyhow::ensure!(hand.valid(), "demo gear at {position} rejected: {:?}", hand.plan.rejection);
        build(&mut world, &hand.plan)?;
    }
    let belt = get_add_belt_hand(&world, IVec2::new(0, -1), IVec2::new(1, -1))?;
    anyhow::ensure!(belt.valid(), "demo belt rejected: {:?}", belt.plan.rejection);
    build(&mut world, &belt.plan)?;
    Ok(world)
}

fn print_world(world: &World) -> anyhow::Result<()> {
    println!("{}", WorldInspector::summary(world)?);
    for network in WorldInspector::networks(world)? {
        println!("  {network}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo { ticks, save } => {
            println!("Gear demo: ticks={ticks}, tick_hz={}", config.tick_hz);
            let world = demo_world(&config)?;
            let mut sim = Simulation::new(world, &config);

            let mut force = ApplyForceHand::new(&config);
            update_apply_force(&sim.world, &mut force, Some(IVec2::new(0, 0)), true);
            sim.hand = Some(Hand::ApplyForce(force));
            for _ in 0..ticks {
                if !sim.advance(sim.period) {
                    break;
                }
            }

            print_world(&sim.world)?;
            for id in [EntityId::gear(IVec2::new(0, 0)), EntityId::gear(IVec2::new(2, 0))] {
                println!("  {}", WorldInspector::inspect_entity(&sim.world, &id)?);
            }
            if let Some(dir) = save {
                let mut store = WorldStore::open(&dir)?;
                store.save(&sim.world)?;
                println!("Saved to {}", dir.display());
            }
            anyhow::ensure!(!sim.stopped, "simulation stopped early");
        }
        Commands::Inspect { dir, entity } => {
            let world = WorldStore::open(&dir)?
                .load()
                .with_context(|| format!("loading world from {}", dir.display()))?;
            match entity {
                Some(id) => println!("{}", WorldInspector::inspect_entity(&world, &EntityId(id))?),
                None => {
                    print_world(&world)?;
                    for id in world.entities().keys() {
                        println!("    {}", WorldInspector::inspect_entity(&world, id)?);
                    }
                }
            }
        }
        Commands::Validate { dir } => {
            let store = WorldStore::open(&dir)?;
            store.verify_integrity()?;
            let world = store.load()?;
            println!(
                "OK: {} entities, build version {}, tick {}",
                world.entity_count(),
                world.build_version(),
                world.tick()
            );
        }
    }

    Ok(())
}
