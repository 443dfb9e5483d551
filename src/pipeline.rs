// src/pipeline.rs
// ============================================================================
// PIPELINE - walk → parse → build → write
// ============================================================================
//
// La lista de frames se materializa completa antes de escribir nada: el shard
// de cada registro es `posición % N` sobre esa lista, y un frame rechazado
// consume su posición igualmente.
//
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::annotation::{parse_annotation_dir, FrameRecord, CANONICAL_CLASSES};
use crate::config::ConvertConfig;
use crate::error::{ConvertError, Result};
use crate::example::{BuildOutcome, ExampleBuilder, ImageDimensions, SkipReason};
use crate::labelmap::LabelMap;
use crate::tfrecord::{ShardSet, ShardSummary};
use crate::walker::annotated_dirs;

pub const GENERATOR: &str = concat!("lisa-record ", env!("CARGO_PKG_VERSION"));

/// Contadores de una ejecución
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub frames: usize,
    pub written: usize,
    pub file_missing: usize,
    pub bad_format: usize,
    pub size_mismatch: usize,
}

impl BuildStats {
    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::FileMissing => self.file_missing += 1,
            SkipReason::BadFormat(_) => self.bad_format += 1,
            SkipReason::SizeMismatch { .. } => self.size_mismatch += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.file_missing + self.bad_format + self.size_mismatch
    }
}

/// Resultado de `convert`; con `--summary` se vuelca como JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generator: String,
    pub created_at: DateTime<Utc>,
    pub data_dir: PathBuf,
    pub label_map: PathBuf,
    pub num_shards: usize,
    pub shuffled: bool,
    pub seed: Option<u64>,
    pub image_size: Option<ImageDimensions>,
    pub stats: BuildStats,
    pub shards: Vec<ShardSummary>,
}

/// Todos los frames bajo `data_dir`, en orden de recorrido
pub fn collect_frames(data_dir: &Path) -> Result<Vec<FrameRecord>> {
    let mut frames = Vec::new();
    for dir in annotated_dirs(data_dir) {
        frames.extend(parse_annotation_dir(&dir)?);
    }
    Ok(frames)
}

/// Barajado determinista con semilla fija
pub fn shuffle_frames(frames: &mut [FrameRecord], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    frames.shuffle(&mut rng);
}

/// Construye y escribe cada frame en el shard `i % N`. Un rechazo deja la
/// posición sin escribir; un error fatal aborta en el acto.
pub fn write_examples(
    frames: &[FrameRecord],
    builder: &mut ExampleBuilder<'_>,
    shards: &mut ShardSet,
    progress: &ProgressBar,
) -> Result<BuildStats> {
    let mut stats = BuildStats {
        frames: frames.len(),
        ..BuildStats::default()
    };

    for (index, frame) in frames.iter().enumerate() {
        match builder.build(frame)? {
            BuildOutcome::Built(example) => {
                shards.write(index, &example.encode())?;
                stats.written += 1;
            }
            BuildOutcome::Skipped(reason) => stats.record_skip(&reason),
        }
        progress.inc(1);
    }

    Ok(stats)
}

pub fn create_progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [Records] [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Invalid progress template: {}", e),
    }
    pb
}

/// Ejecución completa
pub fn convert(config: &ConvertConfig) -> Result<RunSummary> {
    config.validate()?;

    let label_map = LabelMap::load(&config.label_map_path)?;
    let missing = label_map.missing(CANONICAL_CLASSES);
    if !missing.is_empty() {
        warn!(
            "Label map {} has no entry for {:?}",
            config.label_map_path.display(),
            missing
        );
    }

    let mut frames = collect_frames(&config.data_dir)?;
    info!("Collected {} frames", frames.len());

    if config.shuffle {
        shuffle_frames(&mut frames, config.seed);
        info!("Shuffled frames with seed {}", config.seed);
    }

    let mut shards = ShardSet::open(&config.output_path, config.num_shards)?;
    let mut builder = ExampleBuilder::new(&label_map);

    let progress = create_progress_bar(frames.len() as u64, config.show_progress);
    let stats = write_examples(&frames, &mut builder, &mut shards, &progress)?;
    progress.finish_and_clear();

    let shards = shards.finish()?;
    info!(
        "Wrote {} of {} frames ({} skipped) to {} shards",
        stats.written,
        stats.frames,
        stats.skipped(),
        shards.len()
    );

    let summary = RunSummary {
        generator: GENERATOR.to_string(),
        created_at: Utc::now(),
        data_dir: config.data_dir.clone(),
        label_map: config.label_map_path.clone(),
        num_shards: config.num_shards,
        shuffled: config.shuffle,
        seed: config.shuffle.then_some(config.seed),
        image_size: builder.expected_dimensions(),
        stats,
        shards,
    };

    if config.write_summary {
        write_summary(&config.summary_path(), &summary)?;
    }

    Ok(summary)
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| ConvertError::io(path, e.into()))?;
    fs::write(path, json).map_err(|e| ConvertError::io(path, e))?;
    info!("Summary written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ANNOTATION_FILE;

    fn frame_names(frames: &[FrameRecord]) -> Vec<String> {
        frames
            .iter()
            .map(|f| f.filename.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn annotated_dir(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("frames")).unwrap();
        let mut csv = String::from(
            "Filename;Annotation tag;Upper left corner X;Upper left corner Y;Lower right corner X;Lower right corner Y\n",
        );
        for file in files {
            csv.push_str(&format!("dayTraining/{};go;1;1;2;2\n", file));
            fs::write(dir.join("frames").join(file), b"").unwrap();
        }
        fs::write(dir.join(ANNOTATION_FILE), csv).unwrap();
    }

    #[test]
    fn test_collect_frames_in_walk_order() {
        let tmp = tempfile::tempdir().unwrap();
        annotated_dir(tmp.path(), "b", &["b1.png"]);
        annotated_dir(tmp.path(), "a", &["a1.png", "a2.png"]);

        let frames = collect_frames(tmp.path()).unwrap();
        assert_eq!(frame_names(&frames), vec!["a1.png", "a2.png", "b1.png"]);
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let frames: Vec<FrameRecord> = (0..20)
            .map(|i| FrameRecord::new(format!("f{:02}.png", i)))
            .collect();

        let mut a = frames.clone();
        let mut b = frames.clone();
        shuffle_frames(&mut a, 42);
        shuffle_frames(&mut b, 42);
        assert_eq!(a, b);
        assert_ne!(a, frames);

        let mut c = frames.clone();
        shuffle_frames(&mut c, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn test_stats_count_skips_by_reason() {
        let mut stats = BuildStats::default();
        stats.record_skip(&SkipReason::FileMissing);
        stats.record_skip(&SkipReason::BadFormat("JPEG".to_string()));
        stats.record_skip(&SkipReason::BadFormat("GIF".to_string()));
        assert_eq!(stats.file_missing, 1);
        assert_eq!(stats.bad_format, 2);
        assert_eq!(stats.size_mismatch, 0);
        assert_eq!(stats.skipped(), 3);
    }

    #[test]
    fn test_missing_label_map_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConvertConfig::new(
            tmp.path(),
            tmp.path().join("out"),
            tmp.path().join("missing.pbtxt"),
        );
        assert!(convert(&config).is_err());
        assert!(!tmp.path().join("out-00000-of-00030").exists());
    }
}
