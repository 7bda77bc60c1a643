pub mod detection_loop;
pub mod pipeline_logger;
pub mod refresh_pacer;
