//! MBDyn playback CLI - Inspect models, replay and pack motion output.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::Path;
use std::process;
use std::time::Instant;

use mbdyn_playback::{
    parser::{LogParser, import_labels},
    playback::{ContainerWriter, PackOptions, PlaybackEngine},
    registry::EntityRegistry,
    schema::{ImportConfig, SessionConfig},
};

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} inspect <log> [labels]", program);
    eprintln!("  {} play <log> <motion> [config.json]", program);
    eprintln!("  {} pack <log> <motion.mov> <out.mbts> [time_step]", program);
    eprintln!("  {} --example", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  inspect  Import a solver log (and labels) and summarize the model");
    eprintln!("  play     Stream a text or .mbts motion file against the model");
    eprintln!("  pack     Convert a text motion file into a .mbts container");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        process::exit(1);
    }

    match args[1].as_str() {
        "--example" => print_example_config(),
        "inspect" if args.len() >= 3 => inspect(&args[2], args.get(3)),
        "play" if args.len() >= 4 => play(&args[2], &args[3], args.get(4)),
        "pack" if args.len() >= 5 => pack(&args[2], &args[3], &args[4], args.get(5)),
        _ => {
            usage(&args[0]);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&String>) -> SessionConfig {
    let Some(path) = path else {
        return SessionConfig::default();
    };
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        process::exit(1);
    });
    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        process::exit(1);
    })
}

fn load_model(log: &str, config: &ImportConfig) -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    let report = LogParser::new(config.clone())
        .import(log, &mut registry)
        .unwrap_or_else(|e| {
            eprintln!("Error importing log: {}", e);
            process::exit(1);
        });

    println!("Imported {}: {}", log, report);
    for issue in &report.issues {
        println!("  warning: {}", issue);
    }
    for (keyword, count) in &report.unsupported {
        println!("  not implemented: '{}' ({} records)", keyword, count);
    }
    registry
}

fn inspect(log: &str, labels: Option<&String>) {
    let mut registry = load_model(log, &ImportConfig::default());

    let labels = match labels {
        Some(path) => Path::new(path).to_path_buf(),
        None => Path::new(log).with_extension("lab"),
    };
    match import_labels(&labels, &mut registry) {
        Ok(changes) => println!("Labels from {}: {} renamed", labels.display(), changes),
        Err(e) => println!("  warning: {}", e),
    }

    println!();
    println!("Nodes ({}):", registry.node_count());
    let mut nodes: Vec<_> = registry.nodes().collect();
    nodes.sort_by_key(|n| n.int_label);
    for node in nodes {
        let p = node.initial_position;
        println!(
            "  {:>6} {:<20} ({:.4}, {:.4}, {:.4}) {}",
            node.int_label, node.string_label, p.x, p.y, p.z, node.parametrization
        );
    }

    println!();
    println!("Elements ({}):", registry.element_count());
    let mut elements: Vec<_> = registry.elements().collect();
    elements.sort_by_key(|e| e.key());
    for element in elements {
        println!(
            "  {:<24} {:<20} nodes {:?}",
            element.key().to_string(),
            element.string_label,
            element.nodes
        );
    }
}

fn play(log: &str, motion: &str, config_path: Option<&String>) {
    let config = load_config(config_path);
    let registry = load_model(log, &config.import);

    let mut engine = PlaybackEngine::new(&registry, config.playback).unwrap_or_else(|e| {
        eprintln!("Invalid playback config: {}", e);
        process::exit(1);
    });
    let state = engine.open(motion).unwrap_or_else(|e| {
        eprintln!("Error opening motion output: {}", e);
        process::exit(1);
    });
    println!(
        "Motion: {} rows, {} nodes, {} time steps, every {} step(s)",
        state.total_rows, state.node_count, state.timestep_count, state.decimation_frequency
    );

    let start = Instant::now();
    let mut samples = 0usize;
    let mut failures = 0usize;
    for frame in engine.frames() {
        let frame = frame.unwrap_or_else(|e| {
            eprintln!("Playback stopped: {}", e);
            process::exit(1);
        });
        samples += frame.samples.len();
        failures += frame.failures.len();
        log::debug!("Frame {} (step {}, time {:?})", frame.index, frame.step, frame.time);
    }

    let elapsed = start.elapsed();
    let frames = engine.state().current_frame_index;
    println!(
        "Played {} frames, {} samples, {} decode failures in {:.2}s ({:.1} frames/s)",
        frames,
        samples,
        failures,
        elapsed.as_secs_f32(),
        frames as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
}

fn pack(log: &str, motion: &str, output: &str, time_step: Option<&String>) {
    let registry = load_model(log, &ImportConfig::default());

    let mut options = PackOptions::default();
    if let Some(dt) = time_step {
        options.time_step = dt.parse().unwrap_or_else(|e| {
            eprintln!("Invalid time step '{}': {}", dt, e);
            process::exit(1);
        });
    }
    #[cfg(feature = "lz4")]
    {
        options.writer.compression = mbdyn_playback::playback::CompressionType::Lz4;
    }

    let stats = ContainerWriter::from_text(&registry, motion, output, options).unwrap_or_else(|e| {
        eprintln!("Error packing motion output: {}", e);
        process::exit(1);
    });
    println!("Wrote {}: {}", output, stats);
}

fn print_example_config() {
    let config = SessionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(1);
        }
    }
}
