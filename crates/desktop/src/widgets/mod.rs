pub mod record_button;
