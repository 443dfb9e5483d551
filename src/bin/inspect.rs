// src/bin/inspect.rs
// ============================================================================
// SHARD INSPECTOR - Verifica y resume shards TFRecord
// ============================================================================
//
// Uso: lisa-inspect out/lisa.record-0000*-of-00030 [--verbose]
//
// Cada registro se verifica (ambos CRC) y se decodifica como ejemplo de
// detección. Cualquier registro corrupto termina con error.
//
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use lisa_record::{DetectionExample, RecordReader};

#[derive(Parser)]
#[command(name = "lisa-inspect")]
#[command(about = "Inspect TFRecord shards written by lisa-record")]
struct Args {
    /// Shard files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// List every example with its boxes
    #[arg(long)]
    verbose: bool,
}

#[derive(Default)]
struct ShardReport {
    records: usize,
    boxes: usize,
    bytes: u64,
    sizes: BTreeMap<(u32, u32), usize>,
    classes: BTreeMap<String, usize>,
}

impl ShardReport {
    fn add(&mut self, example: &DetectionExample, payload_len: usize) {
        self.records += 1;
        self.boxes += example.num_boxes();
        self.bytes += payload_len as u64;
        *self.sizes.entry((example.width, example.height)).or_insert(0) += 1;
        for class in &example.class_text {
            *self.classes.entry(class.clone()).or_insert(0) += 1;
        }
    }

    fn merge(&mut self, other: &ShardReport) {
        self.records += other.records;
        self.boxes += other.boxes;
        self.bytes += other.bytes;
        for (size, count) in &other.sizes {
            *self.sizes.entry(*size).or_insert(0) += count;
        }
        for (class, count) in &other.classes {
            *self.classes.entry(class.clone()).or_insert(0) += count;
        }
    }
}

fn format_size(size: u64) -> String {
    if size == 0 {
        "empty".to_string()
    } else if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / 1024.0 / 1024.0)
    }
}

fn inspect_shard(path: &Path, verbose: bool) -> Result<ShardReport> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut report = ShardReport::default();

    for (idx, record) in RecordReader::new(BufReader::new(file)).enumerate() {
        let payload = record.with_context(|| format!("{}: record #{}", path.display(), idx))?;
        let example = DetectionExample::decode(&payload)
            .with_context(|| format!("{}: record #{}", path.display(), idx))?;

        if verbose {
            println!("  #{:<5} {} ({}x{})", idx, example.filename, example.width, example.height);
            for i in 0..example.num_boxes() {
                println!(
                    "         {:<7} id={} x=[{:.4}, {:.4}] y=[{:.4}, {:.4}]",
                    example.class_text[i],
                    example.class_label[i],
                    example.xmin[i],
                    example.xmax[i],
                    example.ymin[i],
                    example.ymax[i]
                );
            }
        }

        report.add(&example, payload.len());
    }

    Ok(report)
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  TFRECORD SHARD INSPECTOR");
    println!("═══════════════════════════════════════════════════════════════");

    let mut total = ShardReport::default();
    for path in &args.files {
        if args.verbose {
            println!("\n{}", path.display());
        }
        let report = inspect_shard(path, args.verbose)?;
        println!(
            "  {:<48} {:>6} records {:>7} boxes {:>10}",
            path.file_name().map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy()),
            report.records,
            report.boxes,
            format_size(report.bytes)
        );
        total.merge(&report);
    }

    println!("───────────────────────────────────────────────────────────────");
    println!("  Shards:   {}", args.files.len());
    println!("  Records:  {}", total.records);
    println!("  Boxes:    {}", total.boxes);
    println!("  Payload:  {}", format_size(total.bytes));
    for ((width, height), count) in &total.sizes {
        println!("  Size:     {}x{} ({} records)", width, height, count);
    }
    println!("  Classes:");
    if total.classes.is_empty() {
        println!("    (none)");
    }
    for (class, count) in &total.classes {
        println!("    {:<8} {}", class, count);
    }
    println!("═══════════════════════════════════════════════════════════════");

    Ok(())
}
