// src/main.rs
// ============================================================================
// LISA-RECORD CLI
// ============================================================================
//
// Uso:
//   lisa-record \
//       --data_dir ./LISA \
//       --output_path out/lisa.record \
//       --label_map_path data/lisa_label_map.pbtxt
//
// Genera out/lisa.record-00000-of-00030 ... out/lisa.record-00029-of-00030
//
// ============================================================================

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use lisa_record::config::{DEFAULT_LABEL_MAP_PATH, DEFAULT_SEED};
use lisa_record::{convert, ConvertConfig};

#[derive(Parser, Debug)]
#[command(name = "lisa-record")]
#[command(about = "Convert the LISA traffic-light dataset to sharded TFRecord")]
#[command(version)]
struct Args {
    /// Dataset root (directories containing frameAnnotationsBOX.csv)
    #[arg(long = "data_dir")]
    data_dir: PathBuf,

    /// Shard path prefix
    #[arg(long = "output_path")]
    output_path: PathBuf,

    /// Label map (.pbtxt or .json)
    #[arg(long = "label_map_path", default_value = DEFAULT_LABEL_MAP_PATH)]
    label_map_path: PathBuf,

    /// Shuffle frames before shard assignment
    #[arg(long)]
    shuffle: bool,

    /// Seed for --shuffle
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Write <output_path>.summary.json
    #[arg(long)]
    summary: bool,

    /// Hide the progress bar
    #[arg(long = "no_progress")]
    no_progress: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let start = Instant::now();

    let mut config = ConvertConfig::new(&args.data_dir, &args.output_path, &args.label_map_path)
        .with_summary(args.summary)
        .with_progress(!args.no_progress);
    if args.shuffle {
        config = config.with_shuffle(args.seed);
    }

    println!("═══════════════════════════════════════════════════════════════");
    println!("  LISA-RECORD v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Data dir:   {}", config.data_dir.display());
    println!("  Label map:  {}", config.label_map_path.display());
    println!("  Output:     {}-*-of-{:05}", config.output_path.display(), config.num_shards);
    println!(
        "  Shuffle:    {}",
        if config.shuffle { format!("ON (seed {})", config.seed) } else { "OFF".to_string() }
    );
    println!("═══════════════════════════════════════════════════════════════");

    let summary = convert(&config)
        .with_context(|| format!("Conversion of {} failed", config.data_dir.display()))?;

    let elapsed = start.elapsed();
    let total_bytes: u64 = summary.shards.iter().map(|s| s.bytes).sum();
    let stats = &summary.stats;

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  CONVERSION COMPLETE");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Time:       {:.1}s", elapsed.as_secs_f64());
    println!("  Size:       {:.1} MB", total_bytes as f64 / 1024.0 / 1024.0);
    println!("  Frames:     {}", stats.frames);
    println!("  Written:    {}", stats.written);
    println!(
        "  Skipped:    {} (missing:{}, format:{}, size:{})",
        stats.skipped(),
        stats.file_missing,
        stats.bad_format,
        stats.size_mismatch
    );
    match summary.image_size {
        Some(size) => println!("  Image size: {}", size),
        None => println!("  Image size: -"),
    }
    println!("  Shards:     {}", summary.shards.len());
    if config.write_summary {
        println!("  Summary:    {}", config.summary_path().display());
    }
    println!("═══════════════════════════════════════════════════════════════");

    Ok(())
}
