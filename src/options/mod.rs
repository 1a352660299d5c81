use crate::error::ProcessError;
use crate::media::{classify, MediaKind, SourceFile};
use std::fmt;

/// Segmentation models offered by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Model {
    #[default]
    #[value(name = "u2net")]
    U2net,
    #[value(name = "u2netp")]
    U2netp,
    #[value(name = "u2net_human_seg")]
    U2netHumanSeg,
}

impl Model {
    /// Identifier sent in the `model` field
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netHumanSeg => "u2net_human_seg",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alpha matting refinement, image pipeline only
///
/// The four numeric parameters only mean something while `alpha_matting`
/// is on. Values are never clamped here.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub alpha_matting: bool,
    pub foreground_threshold: i32,
    pub background_threshold: i32,
    pub erode_structure_size: i32,
    pub base_size: i32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            alpha_matting: false,
            foreground_threshold: 240,
            background_threshold: 10,
            erode_structure_size: 10,
            base_size: 1000,
        }
    }
}

impl ImageOptions {
    /// Names of matting parameters outside the ranges the service documents
    pub fn out_of_range(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if !(0..=255).contains(&self.foreground_threshold) {
            fields.push("foreground_threshold");
        }
        if !(0..=255).contains(&self.background_threshold) {
            fields.push("background_threshold");
        }
        if self.erode_structure_size < 1 {
            fields.push("erode_structure_size");
        }
        if self.base_size < 100 {
            fields.push("base_size");
        }
        fields
    }
}

/// Video pipeline flags
///
/// `frame_rate` and `frame_limit` are `None` when unset and are then left
/// out of the request entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoOptions {
    /// TV mode
    pub tv: bool,
    /// Masks only
    pub mk: bool,
    /// Transparent output video
    pub tov: bool,
    /// Transparent output images
    pub toi: bool,
    /// Green background
    pub gb: bool,
    /// White background
    pub wn: bool,
    pub frame_rate: Option<f64>,
    pub frame_limit: Option<f64>,
}

impl VideoOptions {
    /// Mode flags in wire order
    pub fn flags(&self) -> [(&'static str, bool); 6] {
        [
            ("tv", self.tv),
            ("mk", self.mk),
            ("tov", self.tov),
            ("toi", self.toi),
            ("gb", self.gb),
            ("wn", self.wn),
        ]
    }
}

/// Replacement background, shared by both pipelines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundOptions {
    /// Hex color such as `#FF0000`; empty means transparent
    pub color: Option<String>,
    image: Option<SourceFile>,
}

impl BackgroundOptions {
    pub fn image(&self) -> Option<&SourceFile> {
        self.image.as_ref()
    }

    /// Set the background image; it has to be an image file
    pub fn set_image(&mut self, file: SourceFile) -> Result<(), ProcessError> {
        match classify(file.mime()) {
            Ok(MediaKind::Image) => {
                self.image = Some(file);
                Ok(())
            }
            _ => Err(ProcessError::BackgroundNotImage),
        }
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Color to send, if any; blank strings count as unset
    pub fn effective_color(&self) -> Option<&str> {
        self.color.as_deref().filter(|c| !c.is_empty())
    }
}

/// Every processing parameter for both media kinds
///
/// Settings for the kind that is not currently selected are kept, so
/// switching between an image and a video does not lose them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionState {
    pub model: Model,
    pub background: BackgroundOptions,
    pub image: ImageOptions,
    pub video: VideoOptions,
}

/// The subset of [`OptionState`] that applies to one media kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppliedOptions<'a> {
    Image(&'a ImageOptions),
    Video(&'a VideoOptions),
}

impl OptionState {
    pub fn applicable(&self, kind: MediaKind) -> AppliedOptions<'_> {
        match kind {
            MediaKind::Image => AppliedOptions::Image(&self.image),
            MediaKind::Video => AppliedOptions::Video(&self.video),
        }
    }

    /// Human-readable warnings for values the service is likely to reject
    ///
    /// Only the fields that will actually be sent for `kind` are checked.
    pub fn warnings(&self, kind: MediaKind) -> Vec<String> {
        match self.applicable(kind) {
            AppliedOptions::Image(image) if image.alpha_matting => image
                .out_of_range()
                .into_iter()
                .map(|field| format!("alpha matting {field} is out of range"))
                .collect(),
            AppliedOptions::Image(_) => Vec::new(),
            AppliedOptions::Video(video) => {
                let mut warnings = Vec::new();
                for (name, value) in [("frame rate", video.frame_rate), ("frame limit", video.frame_limit)] {
                    if let Some(v) = value {
                        if !v.is_finite() || v <= 0.0 {
                            warnings.push(format!("{name} {v} is not a positive number"));
                        }
                    }
                }
                warnings
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_match_service_defaults() {
        let options = OptionState::default();
        assert_eq!(options.model, Model::U2net);
        assert!(!options.image.alpha_matting);
        assert_eq!(options.image.foreground_threshold, 240);
        assert_eq!(options.image.background_threshold, 10);
        assert_eq!(options.image.erode_structure_size, 10);
        assert_eq!(options.image.base_size, 1000);
        assert_eq!(options.video, VideoOptions::default());
        assert!(options.background.effective_color().is_none());
        assert!(options.background.image().is_none());
    }

    #[test]
    fn model_identifiers() {
        assert_eq!(Model::U2net.as_str(), "u2net");
        assert_eq!(Model::U2netp.as_str(), "u2netp");
        assert_eq!(Model::U2netHumanSeg.to_string(), "u2net_human_seg");
    }

    #[test]
    fn applicable_picks_branch() {
        let options = OptionState::default();
        assert_matches!(options.applicable(MediaKind::Image), AppliedOptions::Image(_));
        assert_matches!(options.applicable(MediaKind::Video), AppliedOptions::Video(_));
    }

    #[test]
    fn out_of_range_only_warns_when_matting_enabled() {
        let mut options = OptionState::default();
        options.image.foreground_threshold = 300;
        options.image.base_size = 50;
        assert!(options.warnings(MediaKind::Image).is_empty());

        options.image.alpha_matting = true;
        let warnings = options.warnings(MediaKind::Image);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("foreground_threshold"));
        assert!(warnings[1].contains("base_size"));

        // Values are kept as entered
        assert_eq!(options.image.foreground_threshold, 300);
    }

    #[test]
    fn video_warnings_ignore_unset_values() {
        let mut options = OptionState::default();
        assert!(options.warnings(MediaKind::Video).is_empty());

        options.video.frame_rate = Some(-1.0);
        options.video.frame_limit = Some(30.0);
        assert_eq!(options.warnings(MediaKind::Video).len(), 1);
    }

    #[test]
    fn blank_color_is_unset() {
        let mut background = BackgroundOptions::default();
        background.color = Some(String::new());
        assert!(background.effective_color().is_none());
        background.color = Some("#00FF00".into());
        assert_eq!(background.effective_color(), Some("#00FF00"));
    }

    #[test]
    fn background_image_must_be_an_image() {
        let mut background = BackgroundOptions::default();
        let video = SourceFile::new("clip.mp4", "video/mp4", vec![1, 2, 3]);
        assert_matches!(background.set_image(video), Err(ProcessError::BackgroundNotImage));
        assert!(background.image().is_none());

        let png = SourceFile::new("bg.png", "image/png", vec![1, 2, 3]);
        background.set_image(png).unwrap();
        assert_eq!(background.image().map(SourceFile::name), Some("bg.png"));

        background.clear_image();
        assert!(background.image().is_none());
    }
}
