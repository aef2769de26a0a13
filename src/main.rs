use std::collections::HashSet;
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};

use chrono::Local;
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tile_regen::executor::ChunkJob;
use tile_regen::export;
use tile_regen::graph::LeftNeighbourDependencies;
use tile_regen::oracle::{LlmConfig, LlmOracle, NoiseOracle};
use tile_regen::priority::LevelRange;
use tile_regen::selection::{dependencies_of, dependency_pressure};
use tile_regen::{
    regen_with_oracle, Oracle, RegenScheduler, SchedulerConfig, Selection, SelectionProcessor, TickOutcome,
    TileLayer, TileRect,
};

#[derive(Parser, Debug)]
#[command(name = "tile_regen")]
#[command(about = "Simulate edits on a tile world and regenerate the affected chunks")]
struct Args {
    /// Width of the tile layer
    #[arg(short = 'W', long, default_value = "96")]
    width: usize,

    /// Height of the tile layer
    #[arg(short = 'H', long, default_value = "64")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of random edits to simulate
    #[arg(short, long, default_value = "24")]
    edits: usize,

    /// Number of user selections to regenerate afterwards
    #[arg(long, default_value = "4")]
    selections: usize,

    /// Number of Z-levels edits and selections are spread over
    #[arg(long, default_value = "3")]
    levels: i32,

    /// Chunk size override (tiles per chunk edge)
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Scheduler config file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// OpenAI-compatible server to use as the tile oracle (noise otherwise)
    #[arg(long)]
    llm_url: Option<String>,

    /// Model name for the LLM server
    #[arg(long)]
    model: Option<String>,

    /// Number of distinct tile indices the noise oracle produces
    #[arg(long, default_value = "8")]
    tiles: u32,

    /// Export the final layer to PNG
    #[arg(long)]
    export: Option<String>,

    /// Pixels per tile in the PNG export
    #[arg(long, default_value = "4")]
    export_scale: u32,

    /// Export the final layer and run summary as ASCII text
    #[arg(long)]
    export_ascii: Option<String>,
}

/// Frame interval of the simulated host loop.
const FRAME: Duration = Duration::from_millis(16);

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SchedulerConfig::from_json_file(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path, e);
                process::exit(1);
            }
        },
        None => SchedulerConfig::default(),
    };
    if let Some(size) = args.chunk_size {
        config.chunk_size = size;
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let levels = args.levels.max(1);

    println!("Tile regeneration with seed: {}", seed);
    println!("Layer size: {}x{}, chunk size {}", args.width, args.height, config.chunk_size);

    let oracle: Box<dyn Oracle> = match &args.llm_url {
        Some(url) => {
            let llm_config = LlmConfig {
                base_url: url.clone(),
                model: args.model.clone(),
                ..LlmConfig::default()
            };
            let llm = match LlmOracle::new(llm_config) {
                Ok(llm) => llm,
                Err(e) => {
                    eprintln!("Error creating LLM client: {}", e);
                    process::exit(1);
                }
            };
            if !llm.health_check() {
                eprintln!("Warning: LLM server at {} is not responding; regions will keep their tiles", url);
            }
            println!("Oracle: LLM at {}", url);
            Box::new(llm)
        }
        None => {
            println!("Oracle: Perlin noise ({} tiles)", args.tiles);
            Box::new(NoiseOracle::new(seed, args.tiles))
        }
    };

    let mut layer = TileLayer::new(args.width, args.height);
    let mut scheduler = RegenScheduler::new(config.clone());
    scheduler.set_dependency_provider(LeftNeighbourDependencies);

    // Initial fill: everything on the base level
    println!("Generating base layer...");
    let started = Instant::now();
    scheduler.mark_dirty(&layer.bounds(), 0);
    let reports = {
        let mut regen = |job: &ChunkJob<'_>| regen_with_oracle(&mut layer, oracle.as_ref(), job);
        scheduler.flush(&mut regen)
    };
    for report in &reports {
        println!(
            "  {} chunks, {} visits, {} failures over {} ticks",
            report.chunks,
            report.visits(),
            report.failures(),
            report.steps
        );
    }
    println!("Base layer done in {:.1?} ({} tiles set)", started.elapsed(), layer.occupied());

    // Edit bursts, driven like a game loop
    println!("Simulating {} edits...", args.edits);
    let mut summary = Vec::new();
    let mut remaining = args.edits;
    let mut frames = 0usize;
    let mut cycles = Vec::new();
    {
        let mut regen = |job: &ChunkJob<'_>| regen_with_oracle(&mut layer, oracle.as_ref(), job);
        loop {
            if remaining > 0 && rng.gen_bool(0.3) {
                let rect = random_rect(&mut rng, args.width, args.height);
                let z = rng.gen_range(0..levels);
                let added = scheduler.debounced_mark_dirty(&rect, z, None);
                log::debug!("edit {:?} at z{} dirtied {} new chunks", rect, z, added);
                remaining -= 1;
            }

            match scheduler.tick(&mut regen) {
                TickOutcome::Finished(report) => cycles.push(report),
                TickOutcome::Yielded | TickOutcome::Idle => {}
            }
            frames += 1;

            if remaining == 0 && !scheduler.is_running() && !scheduler.is_pending() && scheduler.pending_dirty() == 0 {
                break;
            }
            std::thread::sleep(FRAME);
        }
    }
    let visits: usize = cycles.iter().map(|r| r.visits()).sum();
    let failures: usize = cycles.iter().map(|r| r.failures()).sum();
    println!(
        "Edits settled after {} frames: {} cycles, {} chunk visits, {} failures",
        frames,
        cycles.len(),
        visits,
        failures
    );
    summary.push(format!("Seed: {}", seed));
    summary.push(format!("Regeneration cycles: {} ({} visits, {} failures)", cycles.len(), visits, failures));

    // Selection-driven regeneration
    if args.selections > 0 {
        println!("Regenerating {} selections...", args.selections);
        let selections: Vec<Selection> = (0..args.selections)
            .map(|i| {
                let rect = random_rect(&mut rng, args.width, args.height);
                Selection::new(i as u64 + 1, rect, rng.gen_range(0..levels))
            })
            .collect();

        let range = LevelRange::from_levels(selections.iter().map(|s| s.z_level)).unwrap_or(LevelRange::new(0, 0));
        let mut done = HashSet::new();
        let mut processor = SelectionProcessor::new(config.priority);
        let pressure = dependency_pressure(&selections, &done);
        for selection in &selections {
            let dependencies = dependencies_of(selection, &selections).count();
            let score = processor.enqueue_from_storage(&layer, selection.clone(), dependencies, range, &pressure);
            println!(
                "  selection {} z{} {}x{} ({} deps): priority {:.3}",
                selection.id.0,
                selection.z_level,
                selection.bounds.width(),
                selection.bounds.height(),
                dependencies,
                score
            );
        }

        // Re-score what is still queued as dependencies get regenerated
        let mut outcomes = Vec::new();
        while let Some(outcome) = processor.process_next(&mut layer, oracle.as_ref()) {
            done.insert(outcome.region());
            outcomes.push(outcome);
            let pressure = dependency_pressure(&selections, &done);
            let queued: Vec<&Selection> = selections.iter().filter(|s| processor.queue().contains(s.id)).collect();
            for selection in queued {
                let dependencies = dependencies_of(selection, &selections).count();
                processor.enqueue_from_storage(&layer, selection.clone(), dependencies, range, &pressure);
            }
        }
        let applied = outcomes.iter().filter(|o| o.is_applied()).count();
        processor.finish_batch();
        println!("Selections applied: {}/{}", applied, outcomes.len());
        summary.push(format!("Selections applied: {}/{}", applied, outcomes.len()));
    }

    if let Some(ref path) = args.export {
        match export::export_layer(&layer, path, args.export_scale) {
            Ok(()) => println!("Exported layer to {}", path),
            Err(e) => eprintln!("Error exporting layer: {}", e),
        }
    }

    if let Some(ref path) = args.export_ascii {
        match export::export_ascii(&layer, path, &summary) {
            Ok(()) => println!("Exported ASCII layer to {}", path),
            Err(e) => eprintln!("Error exporting ASCII layer: {}", e),
        }
    }

    println!("Finished at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
}

/// Random rectangle fully inside a `width` x `height` layer.
fn random_rect(rng: &mut ChaCha8Rng, width: usize, height: usize) -> TileRect {
    let w = width.max(1) as i32;
    let h = height.max(1) as i32;
    let rw = rng.gen_range(1..=(w / 4).max(1));
    let rh = rng.gen_range(1..=(h / 4).max(1));
    let x = rng.gen_range(0..=(w - rw));
    let y = rng.gen_range(0..=(h - rh));
    TileRect::from_origin(x, y, rw as u32, rh as u32)
}
