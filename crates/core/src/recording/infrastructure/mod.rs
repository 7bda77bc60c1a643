pub mod download_dir_delivery;
pub mod ffmpeg_webm_encoder;
pub mod json_key_value_store;
pub mod local_storage_history;
