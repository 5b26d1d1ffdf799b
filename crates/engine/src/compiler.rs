use crate::asset::AssetSet;
use crate::overlay::{OverlayStyle, TextOverlay};
use crate::sanitize::sanitize;
use crate::script::{AdScript, Segment};
use crate::timeline::*;

/// Bind each script segment to its asset slot and lay the clips out back to
/// back.
pub fn compile_ad(assets: &AssetSet, script: &AdScript, settings: RenderSettings) -> Timeline {
    let mut timeline = Timeline::new(settings);
    let clip_seconds = timeline.settings.clip_seconds;

    // AssetSet holds exactly one asset per segment, in slot order
    for (asset, segment) in assets.iter().zip(Segment::ALL) {
        let slot = segment.slot();

        let text = sanitize(script.segment(segment));
        let overlay = (!text.is_empty()).then(|| TextOverlay {
            segment,
            text,
            style: OverlayStyle::for_segment(segment),
        });

        timeline.clips.push(ClipInstance {
            slot,
            image_path: asset.local_path.clone(),
            timeline_start_secs: slot as u32 * clip_seconds,
            duration_secs: clip_seconds,
            overlay,
        });
    }

    timeline
}
