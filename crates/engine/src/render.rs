use crate::timeline::{ClipInstance, RenderSettings, Timeline};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    pub output_path: PathBuf,
}

impl RenderCommand {
    pub fn command_line(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in &self.ffmpeg_args {
            line.push(' ');
            if arg.contains(' ') || arg.contains(';') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Generate the FFmpeg command for a timeline: one looped still per clip,
/// text drawn per clip, clips concatenated in order, video only.
pub fn generate_render_command(timeline: &Timeline, output_path: PathBuf) -> RenderCommand {
    let settings = &timeline.settings;
    let mut clips: Vec<&ClipInstance> = timeline.clips.iter().collect();
    clips.sort_by_key(|c| c.timeline_start_secs);

    let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "error", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for clip in &clips {
        args.push("-loop".to_string());
        args.push("1".to_string());
        args.push("-t".to_string());
        args.push(clip.duration_secs.to_string());
        args.push("-i".to_string());
        args.push(clip.image_path.to_string_lossy().to_string());
    }

    let mut filter_parts = Vec::new();
    for (idx, clip) in clips.iter().enumerate() {
        filter_parts.push(format!("[{}:v]{}[v{}]", idx, clip_chain(clip, settings), idx));
    }
    let concat_inputs: String = (0..clips.len()).map(|i| format!("[v{}]", i)).collect();
    filter_parts.push(format!("{}concat=n={}:v=1:a=0[out]", concat_inputs, clips.len()));

    args.push("-filter_complex".to_string());
    args.push(filter_parts.join(";"));
    args.push("-map".to_string());
    args.push("[out]".to_string());
    push_encode_args(&mut args, settings);
    args.push(output_path.to_string_lossy().to_string());

    RenderCommand {
        ffmpeg_args: args,
        output_path,
    }
}

// Every clip leaves the chain at canvas size, square pixels, output rate and
// pixel format so concat sees identical streams.
fn clip_chain(clip: &ClipInstance, settings: &RenderSettings) -> String {
    let (w, h) = (settings.canvas.width, settings.canvas.height);
    let mut chain = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={},format={}",
        settings.fps, settings.pixel_format
    );
    if let Some(overlay) = &clip.overlay {
        chain.push(',');
        chain.push_str(&overlay.to_drawtext(settings.font_file.as_deref()));
    }
    chain
}

fn push_encode_args(args: &mut Vec<String>, settings: &RenderSettings) {
    args.extend([
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
        "-r".to_string(),
        settings.fps.to_string(),
        "-crf".to_string(),
        settings.crf.to_string(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-an".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetSet, ImageAsset};
    use crate::compiler::compile_ad;
    use crate::script::AdScript;

    fn timeline() -> Timeline {
        let assets = AssetSet::new(vec![
            ImageAsset::downloaded(0, "/tmp/j/a.jpg"),
            ImageAsset::downloaded(1, "/tmp/j/b.jpg"),
            ImageAsset::placeholder(2, "/tmp/j/c.png"),
        ])
        .unwrap();
        compile_ad(
            &assets,
            &AdScript::new("Act now", "Limited stock", "Buy today"),
            RenderSettings::default(),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn loops_each_image_for_clip_duration() {
        let cmd = generate_render_command(&timeline(), PathBuf::from("/tmp/j/out.mp4"));
        let joined = cmd.ffmpeg_args.join(" ");
        assert!(joined.contains("-loop 1 -t 3 -i /tmp/j/a.jpg"));
        assert!(joined.contains("-loop 1 -t 3 -i /tmp/j/b.jpg"));
        assert!(joined.contains("-loop 1 -t 3 -i /tmp/j/c.png"));
        assert_eq!(cmd.ffmpeg_args.iter().filter(|a| *a == "-i").count(), 3);
    }

    #[test]
    fn filter_overlays_and_concatenates_in_order() {
        let cmd = generate_render_command(&timeline(), PathBuf::from("/tmp/j/out.mp4"));
        let filter = value_after(&cmd.ffmpeg_args, "-filter_complex").unwrap();
        let parts: Vec<_> = filter.split(';').collect();

        assert_eq!(parts.len(), 4);
        assert!(parts[0].starts_with("[0:v]scale=1080:1920"));
        assert!(parts[0].contains("text='Act now'"));
        assert!(parts[0].ends_with("[v0]"));
        assert!(parts[1].contains("text='Limited stock'"));
        assert!(parts[2].contains("fontcolor=yellow"));
        assert_eq!(parts[3], "[v0][v1][v2]concat=n=3:v=1:a=0[out]");
        assert_eq!(value_after(&cmd.ffmpeg_args, "-map"), Some("[out]"));
    }

    #[test]
    fn encodes_with_fixed_parameters_and_no_audio() {
        let cmd = generate_render_command(&timeline(), PathBuf::from("/tmp/j/out.mp4"));
        let args = &cmd.ffmpeg_args;
        assert_eq!(value_after(args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(value_after(args, "-r"), Some("30"));
        assert_eq!(value_after(args, "-crf"), Some("23"));
        assert_eq!(value_after(args, "-preset"), Some("fast"));
        assert!(args.iter().any(|a| a == "-an"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/j/out.mp4"));
        assert_eq!(cmd.output_path, PathBuf::from("/tmp/j/out.mp4"));
    }

    #[test]
    fn reports_progress_on_stdout() {
        let cmd = generate_render_command(&timeline(), PathBuf::from("/tmp/j/out.mp4"));
        assert_eq!(value_after(&cmd.ffmpeg_args, "-progress"), Some("pipe:1"));
    }

    #[test]
    fn command_line_quotes_filter() {
        let cmd = generate_render_command(&timeline(), PathBuf::from("/tmp/j/out.mp4"));
        let line = cmd.command_line("ffmpeg");
        assert!(line.starts_with("ffmpeg -y "));
        assert!(line.contains("-filter_complex \"[0:v]"));
    }
}
