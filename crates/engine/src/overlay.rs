use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::script::Segment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub font_size: u32,
    pub font_color: String,
    pub box_color: String,
    pub box_opacity: f32,
    pub box_border: u32,
    /// Distance of the text from the top edge, in pixels.
    pub y: u32,
}

impl OverlayStyle {
    pub fn for_segment(segment: Segment) -> Self {
        match segment {
            Segment::Hook => OverlayStyle {
                font_size: 40,
                font_color: "white".to_string(),
                box_color: "black".to_string(),
                box_opacity: 0.7,
                box_border: 5,
                y: 200,
            },
            Segment::Body => OverlayStyle {
                font_size: 36,
                font_color: "white".to_string(),
                box_color: "black".to_string(),
                box_opacity: 0.7,
                box_border: 5,
                y: 300,
            },
            Segment::Cta => OverlayStyle {
                font_size: 38,
                font_color: "yellow".to_string(),
                box_color: "black".to_string(),
                box_opacity: 0.8,
                box_border: 5,
                y: 400,
            },
        }
    }
}

/// Sanitized text plus the style it is drawn with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub segment: Segment,
    pub text: String,
    pub style: OverlayStyle,
}

impl TextOverlay {
    /// `drawtext` filter for this overlay.
    ///
    /// `text` must already be sanitized: it is single-quoted, so it may not
    /// contain a quote, and it must be free of filtergraph separators.
    pub fn to_drawtext(&self, font_file: Option<&Path>) -> String {
        let style = &self.style;
        let mut filter = String::from("drawtext=");
        if let Some(font) = font_file {
            filter.push_str(&format!("fontfile='{}':", escape_path(font)));
        }
        filter.push_str(&format!(
            "text='{}':expansion=none:fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}:box=1:boxcolor={}@{:.1}:boxborderw={}",
            self.text,
            style.font_size,
            style.font_color,
            style.y,
            style.box_color,
            style.box_opacity,
            style.box_border,
        ));
        filter
    }
}

// Quoted filter values still treat ':' and '\' specially at the option level.
fn escape_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "")
        .replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(segment: Segment, text: &str) -> TextOverlay {
        TextOverlay {
            segment,
            text: text.to_string(),
            style: OverlayStyle::for_segment(segment),
        }
    }

    #[test]
    fn styles_differ_per_segment_but_share_layout() {
        let hook = OverlayStyle::for_segment(Segment::Hook);
        let body = OverlayStyle::for_segment(Segment::Body);
        let cta = OverlayStyle::for_segment(Segment::Cta);

        assert_ne!(hook, body);
        assert_ne!(body, cta);
        assert!(hook.y < body.y && body.y < cta.y);
        assert_eq!(cta.font_color, "yellow");
        for style in [&hook, &body, &cta] {
            assert!(style.box_opacity > 0.0 && style.box_opacity < 1.0);
        }
    }

    #[test]
    fn drawtext_is_centered_and_boxed() {
        let filter = overlay(Segment::Hook, "Act now").to_drawtext(None);
        assert_eq!(
            filter,
            "drawtext=text='Act now':expansion=none:fontsize=40:fontcolor=white:x=(w-text_w)/2:y=200:box=1:boxcolor=black@0.7:boxborderw=5"
        );
    }

    #[test]
    fn drawtext_includes_font_file() {
        let filter = overlay(Segment::Cta, "Buy today")
            .to_drawtext(Some(Path::new("C:\\fonts\\Inter.ttf")));
        assert!(filter.starts_with("drawtext=fontfile='C\\:/fonts/Inter.ttf':text='Buy today'"));
        assert!(filter.contains("boxcolor=black@0.8"));
    }
}
