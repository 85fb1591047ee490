// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Scan orchestration
//!
//! One scan is a single pass: resolve the mount, discover candidates, process
//! each file independently (decode, score, geotag), then publish the serving
//! index and persist reports. A single file's failure never aborts the batch;
//! only a missing mount or an empty candidate set does.
//!
//! Per-file work runs on a bounded worker pool. Outcomes are collected by
//! discovery position and folded back in order, so tier buckets come out
//! deterministic regardless of completion order. The index is published only
//! after every file has been processed, and it is replaced even when a scan
//! yields zero valid records: serving yesterday's files from a stale index is
//! the worse failure mode.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::classifier::{preprocess, ClassificationAdapter, Tier};
use crate::config::AppConfig;
use crate::discover::{self, Candidate};
use crate::geotag::{GeoTag, GeoTagExtractor};
use crate::index::{ImageIndex, SharedIndex};
use crate::{mount, report, Result};

/// One triaged photo. Immutable once built; superseded wholesale by the next
/// scan.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub filename: String,
    pub source_path: PathBuf,
    pub probability_percent: f32,
    pub tier: Tier,
    pub geotag: GeoTag,
}

impl ImageRecord {
    /// Two-decimal percent string, the display form used in every report.
    pub fn prediction_display(&self) -> String {
        format!("{:.2}%", self.probability_percent)
    }
}

// One wire shape for CSV rows and JSON result objects alike.
impl Serialize for ImageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let coord = self.geotag.coordinate();
        let mut row = serializer.serialize_struct("ImageRecord", 6)?;
        row.serialize_field("filename", &self.filename)?;
        row.serialize_field("prediction", &self.prediction_display())?;
        row.serialize_field("classification", self.tier.label())?;
        row.serialize_field("latitude", &coord.lat)?;
        row.serialize_field("longitude", &coord.lon)?;
        row.serialize_field("synthetic_location", &self.geotag.is_synthetic())?;
        row.end()
    }
}

/// All records from one pass, partitioned by tier. Iteration order is tier
/// severity, then discovery order within a tier.
#[derive(Debug, Default)]
pub struct ScanResult {
    buckets: BTreeMap<Tier, Vec<ImageRecord>>,
}

impl ScanResult {
    pub fn new() -> Self {
        let buckets = Tier::ALL.iter().map(|t| (*t, Vec::new())).collect();
        Self { buckets }
    }

    pub(crate) fn push(&mut self, record: ImageRecord) {
        self.buckets.entry(record.tier).or_default().push(record);
    }

    pub fn by_tier(&self) -> impl Iterator<Item = (Tier, &[ImageRecord])> {
        self.buckets.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    /// Flat view: tier order, then per-tier discovery order.
    pub fn all(&self) -> impl Iterator<Item = &ImageRecord> {
        self.buckets.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one scan hands back to the caller.
#[derive(Debug)]
pub struct ScanOutcome {
    pub mount: PathBuf,
    pub result: ScanResult,
    pub csv_path: Option<PathBuf>,
    pub geojson_path: Option<PathBuf>,
}

/// Per-file result of the processing stage.
enum FileOutcome {
    Record(ImageRecord),
    Skipped { path: PathBuf, reason: String },
}

/// Composes discovery, classification and geotagging into one pass and owns
/// the published index.
pub struct ScanOrchestrator {
    config: AppConfig,
    adapter: ClassificationAdapter,
    geotag: GeoTagExtractor,
    index: SharedIndex,
    // Single global scan slot; concurrent requests queue here
    scan_gate: Mutex<()>,
}

impl ScanOrchestrator {
    pub fn new(config: AppConfig, adapter: ClassificationAdapter, geotag: GeoTagExtractor) -> Self {
        Self {
            config,
            adapter,
            geotag,
            index: SharedIndex::new(),
            scan_gate: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn mount_path(&self) -> &Path {
        Path::new(&self.config.scan.mount_path)
    }

    /// Run one full scan. Lookups keep seeing the previous index until this
    /// publishes.
    pub async fn run_scan(&self) -> Result<ScanOutcome> {
        let _slot = self.scan_gate.lock().await;

        let mount = mount::resolve(self.mount_path())?;
        self.scan_volume(mount).await
    }

    /// Scan an already-resolved volume root, skipping mount resolution.
    /// Same scan slot, same semantics from discovery onwards.
    pub async fn scan_mounted(&self, root: &Path) -> Result<ScanOutcome> {
        let _slot = self.scan_gate.lock().await;
        self.scan_volume(root.to_path_buf()).await
    }

    async fn scan_volume(&self, mount: PathBuf) -> Result<ScanOutcome> {
        info!("Scanning drive at {:?}", mount);

        let candidates = discover::discover(
            &mount,
            self.config.scan.recency_days,
            self.config.scan.max_candidates,
        );

        if candidates.is_empty() {
            // An attached drive with nothing new on it still invalidates
            // whatever the previous scan was serving.
            self.index.publish(ImageIndex::empty());
            return Err(crate::OakwatchError::NoImagesFound);
        }

        info!("Processing {} candidate images", candidates.len());

        let (result, working_index) = process_candidates(
            candidates,
            self.adapter.clone(),
            self.geotag.clone(),
            self.config.scan.workers,
        )
        .await;

        self.index.publish(working_index);

        let csv_path = match report::write_csv(&result, &mount) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Failed to write CSV report: {}", e);
                None
            }
        };
        let geojson_path = match report::write_geojson(&result, &mount) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Failed to write GeoJSON report: {}", e);
                None
            }
        };

        info!(
            "Scan complete: {} records, csv={:?}, geojson={:?}",
            result.len(),
            csv_path,
            geojson_path
        );

        Ok(ScanOutcome { mount, result, csv_path, geojson_path })
    }
}

/// Process every candidate on a bounded pool, then fold outcomes back in
/// discovery order into the tier buckets and the working index.
async fn process_candidates(
    candidates: Vec<Candidate>,
    adapter: ClassificationAdapter,
    geotag: GeoTagExtractor,
    workers: usize,
) -> (ScanResult, ImageIndex) {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (position, candidate) in candidates.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let adapter = adapter.clone();
        let geotag = geotag.clone();

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // Closed pool: skip this file like any other per-file
                    // failure rather than taking down the batch
                    return (
                        position,
                        FileOutcome::Skipped {
                            path: candidate.path,
                            reason: "worker pool closed".to_string(),
                        },
                    );
                }
            };
            (position, process_one(candidate.path, &adapter, &geotag).await)
        });
    }

    let mut slots: BTreeMap<usize, FileOutcome> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, outcome)) => {
                slots.insert(position, outcome);
            }
            Err(e) => error!("Scan worker panicked: {}", e),
        }
    }

    let mut result = ScanResult::new();
    let mut entries = Vec::new();

    for outcome in slots.into_values() {
        match outcome {
            FileOutcome::Record(record) => {
                entries.push((record.filename.clone(), record.source_path.clone()));
                result.push(record);
            }
            FileOutcome::Skipped { path, reason } => {
                warn!("Skipped {:?}: {}", path, reason);
            }
        }
    }

    (result, ImageIndex::from_entries(entries))
}

/// Decode, score and geotag a single file. Decode problems skip the file;
/// a scorer failure is recorded as 0% so the photo still reaches the report
/// (a deliberate low-sensitivity-on-error fallback, not a true negative).
async fn process_one(
    path: PathBuf,
    adapter: &ClassificationAdapter,
    geotag: &GeoTagExtractor,
) -> FileOutcome {
    let edge = adapter.input_edge();
    let decode_path = path.clone();
    let tensor = tokio::task::spawn_blocking(move || {
        let img = image::open(&decode_path)?;
        preprocess(&img, edge)
    })
    .await;

    let tensor = match tensor {
        Ok(Ok(t)) => t,
        Ok(Err(e)) => {
            return FileOutcome::Skipped { path, reason: format!("decode failed: {}", e) }
        }
        Err(e) => {
            return FileOutcome::Skipped { path, reason: format!("decode worker failed: {}", e) }
        }
    };

    let probability_percent = match adapter.probability_percent(&tensor).await {
        Ok(p) => p,
        Err(e) => {
            warn!("Classifier failed for {:?}, recording 0%: {}", path, e);
            0.0
        }
    };

    let tag = geotag.extract(&path);

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    FileOutcome::Record(ImageRecord {
        filename,
        source_path: path,
        probability_percent,
        tier: Tier::from_percent(probability_percent),
        geotag: tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotag::Coordinate;
    use crate::scorer::{PixelTensor, Scorer};
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};

    struct FixedScorer(f32);

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn score(&self, _pixels: &PixelTensor) -> Result<f32> {
            Ok(self.0)
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl Scorer for FailingScorer {
        async fn score(&self, _pixels: &PixelTensor) -> Result<f32> {
            Err(crate::OakwatchError::Classifier("scorer offline".to_string()))
        }
    }

    fn fallback() -> Coordinate {
        Coordinate { lat: 42.9634, lon: -85.6681 }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 8, Rgb([120, 90, 60])).save(&path).unwrap();
        path
    }

    fn candidates_for(paths: &[PathBuf]) -> Vec<Candidate> {
        paths
            .iter()
            .map(|p| Candidate { path: p.clone(), modified: chrono::Utc::now() })
            .collect()
    }

    #[tokio::test]
    async fn valid_files_become_records_and_index_entries() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png");
        let b = write_png(dir.path(), "b.png");

        let adapter = ClassificationAdapter::new(Arc::new(FixedScorer(0.95)), 16);
        let geotag = GeoTagExtractor::new(fallback());

        let (result, index) = process_candidates(candidates_for(&[a, b]), adapter, geotag, 2).await;

        assert_eq!(result.len(), 2);
        assert_eq!(index.len(), result.len());
        assert!(result.all().all(|r| r.tier == Tier::HighChance));
        assert_eq!(index.get("a.png"), Some(dir.path().join("a.png").as_path()));
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png");
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"not an image").unwrap();

        let adapter = ClassificationAdapter::new(Arc::new(FixedScorer(0.5)), 16);
        let geotag = GeoTagExtractor::new(fallback());

        let (result, index) =
            process_candidates(candidates_for(&[bad, good]), adapter, geotag, 2).await;

        assert_eq!(result.len(), 1);
        assert_eq!(index.len(), 1);
        assert!(index.get("bad.jpg").is_none());
    }

    #[tokio::test]
    async fn scorer_failure_records_zero_percent() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_png(dir.path(), "photo.png");

        let adapter = ClassificationAdapter::new(Arc::new(FailingScorer), 16);
        let geotag = GeoTagExtractor::new(fallback());

        let (result, index) =
            process_candidates(candidates_for(&[photo]), adapter, geotag, 1).await;

        // The photo still reaches the report, at 0% in the lowest tier
        assert_eq!(result.len(), 1);
        assert_eq!(index.len(), 1);
        let record = result.all().next().unwrap();
        assert_eq!(record.tier, Tier::None);
        assert_eq!(record.prediction_display(), "0.00%");
    }

    #[tokio::test]
    async fn flat_order_is_tier_then_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(dir.path(), "first.png");
        let second = write_png(dir.path(), "second.png");
        let third = write_png(dir.path(), "third.png");

        // All in one tier: discovery order must survive the parallel stage
        let adapter = ClassificationAdapter::new(Arc::new(FixedScorer(0.2)), 16);
        let geotag = GeoTagExtractor::new(fallback());

        let (result, _) =
            process_candidates(candidates_for(&[first, second, third]), adapter, geotag, 3).await;

        let names: Vec<&str> = result.all().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["first.png", "second.png", "third.png"]);
    }

    fn orchestrator_with(scorer: Arc<dyn Scorer>) -> ScanOrchestrator {
        let adapter = ClassificationAdapter::new(scorer, 16);
        let geotag = GeoTagExtractor::new(fallback());
        ScanOrchestrator::new(AppConfig::default(), adapter, geotag)
    }

    #[tokio::test]
    async fn empty_volume_reports_no_images_writes_nothing_and_clears_index() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator_with(Arc::new(FixedScorer(0.95)));

        // Simulate a previous scan's published index
        orchestrator.index().publish(ImageIndex::from_entries([(
            "stale.jpg".to_string(),
            PathBuf::from("/gone/stale.jpg"),
        )]));

        let err = orchestrator.scan_mounted(dir.path()).await.unwrap_err();
        assert!(matches!(err, crate::OakwatchError::NoImagesFound));

        // No report files appeared
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // The stale index is gone even though the scan found nothing
        assert!(orchestrator.index().snapshot().is_empty());
    }

    #[tokio::test]
    async fn full_scan_publishes_index_and_writes_both_reports() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");

        let orchestrator = orchestrator_with(Arc::new(FixedScorer(0.95)));
        let outcome = orchestrator.scan_mounted(dir.path()).await.unwrap();

        assert_eq!(outcome.mount, dir.path());
        assert_eq!(outcome.result.len(), 1);

        let csv = outcome.csv_path.expect("csv written");
        let geojson = outcome.geojson_path.expect("geojson written");
        assert!(csv.exists() && geojson.exists());
        assert_eq!(csv.parent().unwrap(), dir.path());

        let snapshot = orchestrator.index().snapshot();
        assert_eq!(snapshot.len(), outcome.result.len());
        assert_eq!(snapshot.get("a.png"), Some(dir.path().join("a.png").as_path()));
    }

    #[tokio::test]
    async fn scan_with_zero_valid_records_clears_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.jpg");

        let orchestrator = orchestrator_with(Arc::new(FixedScorer(0.95)));

        orchestrator.scan_mounted(dir.path()).await.unwrap();
        assert!(orchestrator.index().snapshot().get("a.jpg").is_some());

        // Next flight's drive: candidates exist but none decode
        std::fs::remove_file(dir.path().join("a.jpg")).unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();

        let outcome = orchestrator.scan_mounted(dir.path()).await.unwrap();
        assert!(outcome.result.is_empty());
        assert!(orchestrator.index().snapshot().get("a.jpg").is_none());
    }

    #[test]
    fn record_wire_shape_matches_reports() {
        let record = ImageRecord {
            filename: "a.jpg".to_string(),
            source_path: PathBuf::from("/mnt/a.jpg"),
            probability_percent: 97.236,
            tier: Tier::HighChance,
            geotag: GeoTag::Fallback(fallback()),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["prediction"], "97.24%");
        assert_eq!(value["classification"], "THERE'S A HIGH CHANCE OF OAK WILT");
        assert_eq!(value["synthetic_location"], true);
        assert!((value["latitude"].as_f64().unwrap() - 42.9634).abs() < 1e-9);
    }
}
