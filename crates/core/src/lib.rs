pub mod capture;
pub mod detection;
pub mod models;
pub mod overlay;
pub mod pipeline;
pub mod recording;
pub mod shared;
