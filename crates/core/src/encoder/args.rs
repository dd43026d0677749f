//! Argument vector construction for encoder invocations.

use std::path::Path;

use super::error::EncoderError;
use super::types::{AudioAttributes, EncodingAttributes, VideoAttributes};

/// Logical codec name that gets replaced by the bundled AAC encoder.
const LOGICAL_AAC: &str = "aac";

/// Builds argument vectors for encode, probe and listing invocations.
#[derive(Debug, Clone)]
pub struct ArgumentBuilder {
    aac_encoder: String,
}

impl ArgumentBuilder {
    /// Creates a builder that substitutes `aac` with `aac_encoder`.
    pub fn new(aac_encoder: impl Into<String>) -> Self {
        Self {
            aac_encoder: aac_encoder.into(),
        }
    }

    /// Arguments for listing the codecs the encoder was built with.
    pub fn codecs_args() -> Vec<String> {
        vec!["-codecs".to_string()]
    }

    /// Arguments for listing the container formats the encoder supports.
    pub fn formats_args() -> Vec<String> {
        vec!["-formats".to_string()]
    }

    /// Arguments for printing the encoder's version banner.
    pub fn version_args() -> Vec<String> {
        vec!["-version".to_string()]
    }

    /// Arguments for reading source information without producing output.
    pub fn probe_args(input_path: &Path) -> Vec<String> {
        vec!["-i".to_string(), input_path.to_string_lossy().to_string()]
    }

    /// Builds the arguments for an encode invocation.
    pub fn build(
        &self,
        input_path: &Path,
        output_path: &Path,
        attributes: &EncodingAttributes,
    ) -> Result<Vec<String>, EncoderError> {
        if attributes.audio.is_none() && attributes.video.is_none() {
            return Err(EncoderError::invalid_configuration(
                "both audio and video attributes are absent",
            ));
        }

        let mut args = Vec::new();

        // input seek, placed before -i
        if let Some(offset) = attributes.offset_secs {
            args.extend(["-ss".to_string(), offset.to_string()]);
        }

        args.extend(["-i".to_string(), input_path.to_string_lossy().to_string()]);

        if let Some(duration) = attributes.duration_secs {
            args.extend(["-t".to_string(), duration.to_string()]);
        }

        match &attributes.video {
            None => args.push("-vn".to_string()),
            Some(video) => self.push_video_args(&mut args, video),
        }

        match &attributes.audio {
            None => args.push("-an".to_string()),
            Some(audio) => self.push_audio_args(&mut args, audio),
        }

        if let Some(ref format) = attributes.format {
            args.extend(["-f".to_string(), format.clone()]);
        }

        args.push("-y".to_string());
        args.push(output_path.to_string_lossy().to_string());

        Ok(args)
    }

    fn push_video_args(&self, args: &mut Vec<String>, video: &VideoAttributes) {
        if let Some(ref codec) = video.codec {
            args.extend(["-vcodec".to_string(), codec.clone()]);
        }
        if let Some(ref tag) = video.tag {
            args.extend(["-vtag".to_string(), tag.clone()]);
        }
        if let Some(bit_rate) = video.bit_rate {
            args.extend(["-vb".to_string(), bit_rate.to_string()]);
        }
        if let Some(frame_rate) = video.frame_rate {
            args.extend(["-r".to_string(), frame_rate.to_string()]);
        }
        if let Some(size) = video.size {
            args.extend(["-s".to_string(), size.to_arg()]);
        }
        if video.faststart {
            args.extend(["-movflags".to_string(), "faststart".to_string()]);
        }
        if let Some(profile) = video.profile {
            args.extend(["-profile:v".to_string(), profile.mode_name().to_string()]);
        }
        for filter in &video.filters {
            args.extend(["-vf".to_string(), filter.expression().to_string()]);
        }
    }

    fn push_audio_args(&self, args: &mut Vec<String>, audio: &AudioAttributes) {
        if let Some(ref codec) = audio.codec {
            let codec = if codec == LOGICAL_AAC {
                self.aac_encoder.clone()
            } else {
                codec.clone()
            };
            args.extend(["-acodec".to_string(), codec]);
        }
        if let Some(bit_rate) = audio.bit_rate {
            args.extend(["-ab".to_string(), bit_rate.to_string()]);
        }
        if let Some(channels) = audio.channels {
            args.extend(["-ac".to_string(), channels.to_string()]);
        }
        if let Some(sampling_rate) = audio.sampling_rate {
            args.extend(["-ar".to_string(), sampling_rate.to_string()]);
        }
        if let Some(volume) = audio.volume {
            args.extend(["-vol".to_string(), volume.to_string()]);
        }
    }
}

impl Default for ArgumentBuilder {
    fn default() -> Self {
        Self::new(super::config::default_aac_encoder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::types::{VideoFilter, VideoProfile, VideoSize};

    fn build(attributes: &EncodingAttributes) -> Vec<String> {
        ArgumentBuilder::new("libvo_aacenc")
            .build(Path::new("/in.avi"), Path::new("/out/clip.mp4"), attributes)
            .unwrap()
    }

    #[test]
    fn test_nothing_to_encode_is_rejected() {
        let result = ArgumentBuilder::default().build(
            Path::new("/in.avi"),
            Path::new("/out.mp4"),
            &EncodingAttributes::default().with_offset(3.0).with_format("mp4"),
        );
        assert!(matches!(
            result,
            Err(EncoderError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_audio_only_with_aac_substitution() {
        let attributes = EncodingAttributes::default().with_audio(
            AudioAttributes::default()
                .with_codec("aac")
                .with_bit_rate(128_000)
                .with_sampling_rate(44_100)
                .with_channels(2),
        );

        assert_eq!(
            build(&attributes),
            vec![
                "-i", "/in.avi", "-vn", "-acodec", "libvo_aacenc", "-ab", "128000", "-ac", "2",
                "-ar", "44100", "-y", "/out/clip.mp4",
            ]
        );
    }

    #[test]
    fn test_seek_and_duration_surround_input() {
        let attributes = EncodingAttributes::default()
            .with_offset(1.5)
            .with_duration(10.0)
            .with_audio(AudioAttributes::default());

        let args = build(&attributes);
        assert_eq!(&args[..7], &["-ss", "1.5", "-i", "/in.avi", "-t", "10", "-vn"]);
        // Audio present but empty: no audio flags at all
        assert_eq!(&args[7..], &["-y", "/out/clip.mp4"]);
    }

    #[test]
    fn test_full_video_argument_order() {
        let attributes = EncodingAttributes::default()
            .with_format("mp4")
            .with_video(
                VideoAttributes::default()
                    .with_codec("libx264")
                    .with_tag("avc1")
                    .with_bit_rate(800_000)
                    .with_frame_rate(25)
                    .with_size(VideoSize::new(640, 360))
                    .with_faststart(true)
                    .with_profile(VideoProfile::Main)
                    .with_filter(VideoFilter::new("hflip"))
                    .with_filter(VideoFilter::new("scale=640:-2")),
            )
            .with_audio(AudioAttributes::default().with_codec("libmp3lame").with_volume(512));

        assert_eq!(
            build(&attributes),
            vec![
                "-i", "/in.avi", "-vcodec", "libx264", "-vtag", "avc1", "-vb", "800000", "-r",
                "25", "-s", "640x360", "-movflags", "faststart", "-profile:v", "main", "-vf",
                "hflip", "-vf", "scale=640:-2", "-acodec", "libmp3lame", "-vol", "512", "-f",
                "mp4", "-y", "/out/clip.mp4",
            ]
        );
    }

    #[test]
    fn test_video_only_disables_audio() {
        let attributes =
            EncodingAttributes::default().with_video(VideoAttributes::default().with_codec("copy"));
        let args = build(&attributes);
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-vn".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/clip.mp4"));
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn test_non_aac_codec_is_passed_through() {
        let attributes = EncodingAttributes::default()
            .with_audio(AudioAttributes::default().with_codec("aac_at"));
        let args = build(&attributes);
        assert!(args.contains(&"aac_at".to_string()));
        assert!(!args.contains(&"libvo_aacenc".to_string()));
    }

    #[test]
    fn test_listing_and_probe_args() {
        assert_eq!(ArgumentBuilder::codecs_args(), vec!["-codecs"]);
        assert_eq!(ArgumentBuilder::formats_args(), vec!["-formats"]);
        assert_eq!(
            ArgumentBuilder::probe_args(Path::new("/media/a.mkv")),
            vec!["-i", "/media/a.mkv"]
        );
    }
}
