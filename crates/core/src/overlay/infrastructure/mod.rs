pub mod label_font;
pub mod raster_overlay;
