use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::overlay::TextOverlay;

/// Asset slots per job, one per script segment.
pub const SLOT_COUNT: usize = 3;

/// Length of every clip.
pub const CLIP_SECONDS: u32 = 3;

pub const OUTPUT_FPS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Portrait 9:16 target for every composited image.
pub const CANONICAL_CANVAS: Resolution = Resolution {
    width: 1080,
    height: 1920,
};

/// Encoder parameters shared by every render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub canvas: Resolution,
    pub fps: u32,
    pub clip_seconds: u32,
    pub video_codec: String,
    pub pixel_format: String,
    pub crf: u8,
    pub preset: String,
    /// Font handed to drawtext; fontconfig picks one when unset.
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            canvas: CANONICAL_CANVAS,
            fps: OUTPUT_FPS,
            clip_seconds: CLIP_SECONDS,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 23,
            preset: "fast".to_string(),
            font_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInstance {
    pub slot: usize,
    pub image_path: PathBuf,
    pub timeline_start_secs: u32,
    pub duration_secs: u32,
    /// `None` when the segment text sanitized to nothing.
    pub overlay: Option<TextOverlay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub settings: RenderSettings,
    pub clips: Vec<ClipInstance>,
}

impl Timeline {
    pub fn new(settings: RenderSettings) -> Self {
        Timeline {
            settings,
            clips: Vec::new(),
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.clips
            .iter()
            .map(|c| c.timeline_start_secs + c.duration_secs)
            .max()
            .unwrap_or(0)
    }
}
