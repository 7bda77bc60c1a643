use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use facetrack_core::capture::capture_session::CaptureSession;
use facetrack_core::capture::domain::camera_source::{CaptureError, CaptureRequest};
use facetrack_core::capture::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use facetrack_core::detection::domain::detector_options::TinyFaceDetectorOptions;
use facetrack_core::detection::infrastructure::detector_factory::{
    create_face_detector, create_landmark_detector, is_cancelled, load_onnx_models,
};
use facetrack_core::models::domain::retry_policy::RetryPolicy;
use facetrack_core::overlay::domain::overlay_surface::OverlaySurface;
use facetrack_core::overlay::infrastructure::raster_overlay::RasterOverlay;
use facetrack_core::pipeline::detection_loop::{DetectionLoop, TickOutcome};
use facetrack_core::pipeline::pipeline_logger::LogPipelineLogger;
use facetrack_core::recording::domain::recording_record::RecordingRecord;
use facetrack_core::recording::infrastructure::download_dir_delivery::DownloadDirDelivery;
use facetrack_core::recording::infrastructure::ffmpeg_webm_encoder::FfmpegWebmEncoder;
use facetrack_core::recording::infrastructure::json_key_value_store::JsonKeyValueStore;
use facetrack_core::recording::infrastructure::local_storage_history::LocalStorageHistory;
use facetrack_core::recording::recording_controller::RecordingController;
use facetrack_core::shared::cancellation::CancellationToken;
use facetrack_core::shared::frame::Frame;

pub const CAMERA_ERROR: &str =
    "Could not access camera. Please ensure you have granted camera permissions.";

pub enum WorkerEvent {
    ModelsLoaded,
    CameraStarted { width: u32, height: u32 },
    RecordingStarted,
    RecordingSaved {
        path: PathBuf,
        record: RecordingRecord,
        message: &'static str,
    },
    RecordingFailed(String),
    Failed(String),
}

pub enum WorkerCommand {
    StartRecording,
    StopRecording,
}

pub struct SessionParams {
    pub model_base: String,
    pub device: Option<String>,
    pub recordings_dir: PathBuf,
    pub storage_path: PathBuf,
    pub draw_landmarks: bool,
}

/// Handle to a running tracking session. Dropping it tears the session down.
pub struct SessionHandle {
    pub events: Receiver<WorkerEvent>,
    pub frames: Receiver<Frame>,
    commands: Sender<WorkerCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn send(&self, command: WorkerCommand) {
        let _ = self.commands.send(command);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn spawn(params: SessionParams) -> SessionHandle {
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<WorkerEvent>();
    // Only the newest frame matters; older ones are dropped when the UI lags.
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(1);
    let (command_tx, command_rx) = crossbeam_channel::unbounded::<WorkerCommand>();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    thread::spawn(move || {
        if let Err(e) = run_session(&params, &event_tx, &frame_tx, &command_rx, &worker_cancel) {
            if !worker_cancel.is_cancelled() {
                log::error!("Tracking session failed: {e}");
                let _ = event_tx.send(WorkerEvent::Failed(e));
            }
        }
        log::info!("Tracking session ended");
    });

    SessionHandle {
        events: event_rx,
        frames: frame_rx,
        commands: command_tx,
        cancel,
    }
}

fn run_session(
    params: &SessionParams,
    events: &Sender<WorkerEvent>,
    frames: &Sender<Frame>,
    commands: &Receiver<WorkerCommand>,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let registry = match load_onnx_models(&params.model_base, RetryPolicy::default(), cancel) {
        Ok(registry) => registry,
        Err(e) if is_cancelled(e.as_ref()) => return Ok(()),
        Err(e) => {
            return Err(format!(
                "Failed to load face detection models: {e}. Check the log for more details."
            ))
        }
    };
    let _ = events.send(WorkerEvent::ModelsLoaded);

    let request = CaptureRequest::default().with_device(params.device.clone());
    let capture = CaptureSession::start(Box::new(FfmpegCameraSource::new()), &request)
        .map_err(|e| match e {
            CaptureError::PermissionDenied => CAMERA_ERROR.to_string(),
            CaptureError::DeviceUnavailable(reason) => format!("{CAMERA_ERROR} ({reason})"),
        })?;
    let (width, height) = capture.dimensions();
    let _ = events.send(WorkerEvent::CameraStarted { width, height });

    let detector = create_face_detector(&registry, TinyFaceDetectorOptions::default())
        .map_err(|e| e.to_string())?;
    let mut detection_loop = DetectionLoop::new(
        capture,
        detector,
        Box::new(RasterOverlay::new(width, height)),
        &registry,
    )
    .map_err(|e| e.to_string())?
    .with_logger(Box::new(LogPipelineLogger::default()));
    if params.draw_landmarks {
        if let Some(net) = create_landmark_detector(&registry) {
            detection_loop = detection_loop.with_landmarks(net);
        }
    }

    let mut recorder = RecordingController::new(
        Box::new(FfmpegWebmEncoder::new()),
        Box::new(DownloadDirDelivery::new(&params.recordings_dir)),
        Box::new(LocalStorageHistory::new(JsonKeyValueStore::new(
            &params.storage_path,
        ))),
    );

    let mut observer = |outcome: &TickOutcome, overlay: &dyn OverlaySurface| {
        handle_commands(commands, &mut recorder, overlay.dimensions(), events);
        if matches!(outcome, TickOutcome::Skipped(_)) {
            return;
        }
        let snapshot = overlay.snapshot();
        if let Some(elapsed) = recorder.elapsed() {
            if let Err(e) = recorder.capture(&snapshot, elapsed) {
                let _ = events.send(WorkerEvent::RecordingFailed(e.to_string()));
            }
        }
        let _ = frames.try_send(snapshot);
    };
    let result = detection_loop
        .run(cancel, &mut observer)
        .map_err(|e| e.to_string());

    if recorder.is_recording() {
        log::warn!("Session closed while recording; the recording is discarded");
    }
    result
}

fn handle_commands(
    commands: &Receiver<WorkerCommand>,
    recorder: &mut RecordingController,
    (width, height): (u32, u32),
    events: &Sender<WorkerEvent>,
) {
    loop {
        let command = match commands.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
        };
        let event = match command {
            WorkerCommand::StartRecording => match recorder.start(width, height) {
                Ok(()) => WorkerEvent::RecordingStarted,
                Err(e) => WorkerEvent::RecordingFailed(e.to_string()),
            },
            WorkerCommand::StopRecording => match recorder.stop(chrono::Utc::now()) {
                Ok(saved) => WorkerEvent::RecordingSaved {
                    message: saved.message(),
                    path: saved.path,
                    record: saved.record,
                },
                Err(e) => WorkerEvent::RecordingFailed(e.to_string()),
            },
        };
        let _ = events.send(event);
    }
}
