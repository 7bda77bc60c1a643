pub mod file_delivery;
pub mod media_encoder;
pub mod recording_history;
pub mod recording_record;
