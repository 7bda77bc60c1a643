pub const TINY_FACE_DETECTOR_MANIFEST: &str = "tiny_face_detector_model-weights_manifest.json";
pub const FACE_LANDMARK_68_MANIFEST: &str = "face_landmark_68_model-weights_manifest.json";

/// Default upstream location for the model asset files.
pub const MODEL_CDN_BASE: &str = "https://cdn.jsdelivr.net/npm/face-api.js@0.22.2/weights";

pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

pub const RECORDING_FPS: u32 = 30;
pub const RECORDING_MIME_TYPE: &str = "video/webm;codecs=vp9";
pub const RECORDING_FILE_PREFIX: &str = "face-tracking-";
pub const RECORDING_FILE_EXTENSION: &str = "webm";

/// Storage key under which the recording history is persisted.
pub const HISTORY_STORAGE_KEY: &str = "faceTrackingVideos";
pub const HISTORY_LIMIT: usize = 10;

pub const BOX_LABEL: &str = "Face";
pub const BOX_LINE_WIDTH: u32 = 2;
pub const BOX_COLOR: [u8; 4] = [0, 255, 0, 255];

/// Application directory name under platform config/data/cache dirs.
pub const APP_DIR_NAME: &str = "FaceTrack";
