pub mod cancellation;
pub mod constants;
pub mod face_box;
pub mod frame;
pub mod runtime_config;
