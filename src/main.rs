//! Crisscross handles CLI - Evolve handle assignments from a JSON design file.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crisscross_handles::{
    EvolutionEngine,
    schema::{EvolutionConfig, Grid3, HandleAssignment, Lattice},
};

/// Input file: the lattice, the run configuration and an optional seed.
#[derive(Debug, Serialize, Deserialize)]
struct Design {
    lattice: Lattice,
    #[serde(default)]
    config: EvolutionConfig,
    #[serde(default)]
    seed_assignment: Option<HandleAssignment>,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <design.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Evolve assembly handles for a slat lattice.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  design.json  Lattice, evolution config and optional seed assignment");
        eprintln!("  generations  Override evolution_generations from the config");
        eprintln!();
        eprintln!("An example design is generated with the --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_design();
        return;
    }

    let design_path = PathBuf::from(&args[1]);

    let design_str = fs::read_to_string(&design_path).unwrap_or_else(|e| {
        eprintln!("Error reading design file: {}", e);
        std::process::exit(1);
    });

    let mut design: Design = serde_json::from_str(&design_str).unwrap_or_else(|e| {
        eprintln!("Error parsing design: {}", e);
        std::process::exit(1);
    });

    if let Some(generations) = args.get(2).and_then(|s| s.parse().ok()) {
        design.config.evolution_generations = generations;
    }

    let lattice = &design.lattice;
    println!("Crisscross Handle Evolution");
    println!("===========================");
    println!(
        "Lattice: {}x{} ({} layers, {:?})",
        lattice.width(),
        lattice.height(),
        lattice.layers(),
        lattice.geometry()
    );
    println!(
        "Population: {} ({} survivors)",
        design.config.evolution_population, design.config.generational_survivors
    );
    println!(
        "Handles: {}{}",
        design.config.unique_handle_sequences,
        if design.config.split_sequence_handles {
            " (split)"
        } else {
            ""
        }
    );
    println!("Generations: {}", design.config.evolution_generations);
    println!();

    let engine = EvolutionEngine::new(design.lattice, design.config).and_then(|engine| {
        match design.seed_assignment {
            Some(seed) => engine.with_seed_assignment(seed),
            None => Ok(engine),
        }
    });
    let mut engine = engine.unwrap_or_else(|e| {
        eprintln!("Error setting up evolution: {}", e);
        std::process::exit(1);
    });

    println!(
        "Scoring {} handle/antihandle pairs per candidate",
        engine.scorer().pair_count()
    );
    println!("Running evolution...");
    let start = Instant::now();

    let result = engine
        .run_with_callback(|progress| {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Generation {}: worst={}, aggregate={:.3}, {:.1}s",
                progress.generation, progress.worst_score, progress.aggregate_score, elapsed
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!("  Worst score: {}", result.stats.best_worst_score);
    println!("  Aggregate score: {:.4}", result.stats.best_aggregate_score);
    println!("  Worst pairs: {}", result.best.score.worst_ledger.len());
    for (mismatch, count) in result.best.score.histogram.nonzero() {
        println!("    mismatch {:>3}: {}", mismatch, count);
    }
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );

    let output_path = design_path.with_extension("result.json");
    let output = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
        eprintln!("Error serializing result: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = fs::write(&output_path, output) {
        eprintln!("Error writing {}: {}", output_path.display(), e);
        std::process::exit(1);
    }
    println!("Result written to {}", output_path.display());
}

fn print_example_design() {
    // 16 horizontal slats under 16 vertical slats
    let size = 16;
    let mut occupancy = Grid3::new(size, size, 2);
    for x in 0..size {
        for y in 0..size {
            occupancy.set(x, y, 0, y as u32 + 1);
            occupancy.set(x, y, 1, x as u32 + 1);
        }
    }
    let lattice = match Lattice::square(occupancy) {
        Ok(lattice) => lattice,
        Err(e) => {
            eprintln!("Error building example lattice: {}", e);
            std::process::exit(1);
        }
    };

    let design = Design {
        lattice,
        config: EvolutionConfig::default(),
        seed_assignment: None,
    };

    println!("Example design (design.json):");
    println!("{}", serde_json::to_string_pretty(&design).unwrap());
}
