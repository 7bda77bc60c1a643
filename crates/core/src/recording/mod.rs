pub mod domain;
pub mod infrastructure;
pub mod recording_controller;
