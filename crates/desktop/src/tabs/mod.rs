pub mod about_tab;
pub mod recordings_tab;
pub mod settings_tab;
pub mod tracker_tab;
