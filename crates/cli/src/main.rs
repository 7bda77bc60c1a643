use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use facetrack_core::capture::capture_session::CaptureSession;
use facetrack_core::capture::domain::camera_source::CaptureRequest;
use facetrack_core::capture::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use facetrack_core::detection::domain::detector_options::TinyFaceDetectorOptions;
use facetrack_core::detection::infrastructure::detector_factory::{
    create_face_detector, create_landmark_detector, load_onnx_models,
};
use facetrack_core::models::domain::model_bundle::model_paths;
use facetrack_core::models::domain::retry_policy::{RetryPolicy, DEFAULT_BASE_DELAY};
use facetrack_core::models::infrastructure::asset_downloader::{
    default_catalog, load_catalog, AssetDownloader, AssetStatus,
};
use facetrack_core::overlay::domain::overlay_surface::OverlaySurface;
use facetrack_core::overlay::infrastructure::raster_overlay::RasterOverlay;
use facetrack_core::pipeline::detection_loop::{DetectionLoop, TickOutcome};
use facetrack_core::pipeline::pipeline_logger::LogPipelineLogger;
use facetrack_core::recording::infrastructure::download_dir_delivery::DownloadDirDelivery;
use facetrack_core::recording::infrastructure::ffmpeg_webm_encoder::FfmpegWebmEncoder;
use facetrack_core::recording::infrastructure::json_key_value_store::JsonKeyValueStore;
use facetrack_core::recording::infrastructure::local_storage_history::LocalStorageHistory;
use facetrack_core::recording::recording_controller::RecordingController;
use facetrack_core::shared::cancellation::CancellationToken;
use facetrack_core::shared::frame::Frame;
use facetrack_core::shared::runtime_config::RuntimeConfig;

/// Real-time webcam face tracking.
#[derive(Parser)]
#[command(name = "facetrack", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the model manifests and shards into a local directory.
    FetchModels {
        /// Target directory (default: the configured local model directory).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// JSON catalog of {name, url, size} entries to use instead of the
        /// built-in one.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Attempts per file.
        #[arg(long, default_value = "2")]
        retries: u32,
    },

    /// Load both models and run one detection on a blank frame.
    CheckModels,

    /// Track faces from the webcam.
    Track {
        /// How long to run.
        #[arg(long, default_value = "10")]
        seconds: u64,

        /// Record the annotated video to the downloads folder.
        #[arg(long)]
        record: bool,

        /// Camera device (platform specific, e.g. /dev/video1).
        #[arg(long)]
        device: Option<String>,

        /// Draw the 68 facial landmarks too.
        #[arg(long)]
        landmarks: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();
    log::info!(
        "Runtime mode {}, asset origin {}",
        config.mode,
        config.asset_origin
    );

    match cli.command {
        Command::FetchModels {
            dir,
            catalog,
            retries,
        } => {
            let dir = dir
                .or_else(|| config.local_model_dir())
                .ok_or("asset origin is a URL; pass --dir")?;
            fetch_models(&dir, catalog.as_deref(), retries)
        }
        Command::CheckModels => check_models(&config),
        Command::Track {
            seconds,
            record,
            device,
            landmarks,
        } => track(&config, seconds, record, device, landmarks),
    }
}

fn fetch_models(
    dir: &Path,
    catalog: Option<&Path>,
    retries: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = match catalog {
        Some(path) => load_catalog(path)?,
        None => default_catalog(),
    };
    eprintln!("Downloading {} files to {}", catalog.len(), dir.display());

    let downloader = AssetDownloader::new(dir, RetryPolicy::new(retries, DEFAULT_BASE_DELAY))
        .with_progress(Box::new(|name, done, total| {
            if total > 0 {
                eprint!("\r{name}: {}%   ", done * 100 / total);
            }
        }));
    let reports = downloader.ensure_all(&catalog, &CancellationToken::new())?;
    eprintln!();

    let mut failed = 0;
    for report in &reports {
        match &report.status {
            AssetStatus::AlreadyValid => eprintln!("  ok      {}", report.entry.name),
            AssetStatus::Downloaded { attempts } => {
                eprintln!("  fetched {} ({attempts} attempt(s))", report.entry.name)
            }
            AssetStatus::Failed(reason) => {
                failed += 1;
                eprintln!("  FAILED  {}: {reason}", report.entry.name);
            }
        }
    }
    if failed > 0 {
        return Err(format!("{failed} of {} files could not be downloaded", reports.len()).into());
    }
    eprintln!("All models downloaded and verified");
    Ok(())
}

fn check_models(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let base = config.model_location();
    let paths = model_paths(&base);
    eprintln!("Model base: {}", paths.base);
    for (bundle, location) in &paths.manifests {
        eprintln!("  {bundle}: {location}");
    }

    let registry = load_onnx_models(&base, RetryPolicy::default(), &CancellationToken::new())
        .map_err(|e| e.to_string())?;
    let mut detector = create_face_detector(&registry, TinyFaceDetectorOptions::default())?;
    let result = detector.detect(&Frame::blank(300, 300))?;
    eprintln!(
        "Models loaded; blank 300x300 frame: {} face(s)",
        result.boxes.len()
    );
    Ok(())
}

fn track(
    config: &RuntimeConfig,
    seconds: u64,
    record: bool,
    device: Option<String>,
    landmarks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let registry = load_onnx_models(&config.model_location(), RetryPolicy::default(), &cancel)
        .map_err(|e| e.to_string())?;

    let request = CaptureRequest::default().with_device(device);
    let capture = CaptureSession::start(Box::new(FfmpegCameraSource::new()), &request)?;
    let (width, height) = capture.dimensions();
    eprintln!("Camera started at {width}x{height}");

    let detector = create_face_detector(&registry, TinyFaceDetectorOptions::default())?;
    let mut detection_loop = DetectionLoop::new(
        capture,
        detector,
        Box::new(RasterOverlay::new(width, height)),
        &registry,
    )?
    .with_logger(Box::new(LogPipelineLogger::default()));
    if landmarks {
        if let Some(net) = create_landmark_detector(&registry) {
            detection_loop = detection_loop.with_landmarks(net);
        }
    }

    let mut recorder = if record {
        let mut recorder = build_recorder();
        recorder.start(width, height)?;
        Some(recorder)
    } else {
        None
    };

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let loop_cancel = cancel.clone();
    let mut faces_seen = 0usize;
    let mut observer = |outcome: &TickOutcome, overlay: &dyn OverlaySurface| {
        if let TickOutcome::Drawn { faces } = outcome {
            faces_seen = faces_seen.max(*faces);
        }
        if let Some(recorder) = recorder.as_mut() {
            if let Some(elapsed) = recorder.elapsed() {
                if let Err(e) = recorder.capture(&overlay.snapshot(), elapsed) {
                    log::error!("{e}");
                    loop_cancel.cancel();
                }
            }
        }
        if Instant::now() >= deadline {
            loop_cancel.cancel();
        }
    };
    let result = detection_loop.run(&cancel, &mut observer);
    eprintln!(
        "Tracked {} frames, up to {faces_seen} face(s) at once",
        detection_loop.ticks()
    );

    if let Some(mut recorder) = recorder {
        let saved = recorder.stop(chrono::Utc::now())?;
        eprintln!("{}", saved.message());
        eprintln!("  {}", saved.path.display());
    }
    result?;
    Ok(())
}

fn build_recorder() -> RecordingController {
    let store_path = JsonKeyValueStore::default_path()
        .unwrap_or_else(|| PathBuf::from("facetrack-storage.json"));
    RecordingController::new(
        Box::new(FfmpegWebmEncoder::new()),
        Box::new(DownloadDirDelivery::default()),
        Box::new(LocalStorageHistory::new(JsonKeyValueStore::new(store_path))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_track_defaults() {
        let cli = Cli::try_parse_from(["facetrack", "track"]).unwrap();
        match cli.command {
            Command::Track {
                seconds,
                record,
                device,
                landmarks,
            } => {
                assert_eq!(seconds, 10);
                assert!(!record);
                assert!(device.is_none());
                assert!(!landmarks);
            }
            _ => panic!("expected track"),
        }
    }

    #[test]
    fn test_fetch_models_flags() {
        let cli = Cli::try_parse_from([
            "facetrack",
            "fetch-models",
            "--dir",
            "out",
            "--retries",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::FetchModels { dir, retries, catalog } => {
                assert_eq!(dir, Some(PathBuf::from("out")));
                assert_eq!(retries, 5);
                assert!(catalog.is_none());
            }
            _ => panic!("expected fetch-models"),
        }
    }

    #[test]
    fn test_fetch_models_with_bad_catalog_fails() {
        let dir = std::env::temp_dir();
        let err = fetch_models(&dir, Some(Path::new("/nonexistent/catalog.json")), 1)
            .unwrap_err();
        assert!(err.to_string().contains("catalog"));
    }
}
