pub mod ffmpeg;
pub mod fetch;
pub mod raster;
