//! Multipart payload construction for the two removal endpoints.
//!
//! [`build_request`] is a pure function of the selected file, its media
//! kind and the option state. It performs no I/O, so a payload can be
//! rebuilt from the same inputs at any time and compare equal.

use crate::media::{MediaKind, SourceFile};
use crate::options::{AppliedOptions, OptionState};

/// One multipart field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FieldValue {
    fn text(value: impl ToString) -> Self {
        Self::Text(value.to_string())
    }

    fn file(source: &SourceFile) -> Self {
        Self::File {
            file_name: source.name().to_string(),
            mime: source.mime().to_string(),
            bytes: source.bytes().to_vec(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::File { .. } => None,
        }
    }
}

/// A fully encoded request: target path plus ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub path: &'static str,
    pub fields: Vec<(String, FieldValue)>,
}

impl Payload {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, value: FieldValue) {
        self.fields.push((name.to_string(), value));
    }

    /// First field with the given name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Text value of a field, `None` when absent or a file part
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in wire order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Encode `file` and the options applicable to `kind`
pub fn build_request(file: &SourceFile, kind: MediaKind, options: &OptionState) -> Payload {
    let mut payload = Payload::new(kind.endpoint());

    payload.push("file", FieldValue::file(file));
    payload.push("model", FieldValue::text(options.model));

    match options.applicable(kind) {
        AppliedOptions::Image(image) => {
            payload.push("alpha_matting", FieldValue::text(image.alpha_matting));
            if image.alpha_matting {
                payload.push(
                    "alpha_matting_foreground_threshold",
                    FieldValue::text(image.foreground_threshold),
                );
                payload.push(
                    "alpha_matting_background_threshold",
                    FieldValue::text(image.background_threshold),
                );
                payload.push(
                    "alpha_matting_erode_structure_size",
                    FieldValue::text(image.erode_structure_size),
                );
                payload.push("alpha_matting_base_size", FieldValue::text(image.base_size));
            }
        }
        AppliedOptions::Video(video) => {
            // The service distinguishes an explicit false from a missing flag
            for (name, enabled) in video.flags() {
                payload.push(name, FieldValue::text(enabled));
            }
            if let Some(fr) = video.frame_rate {
                payload.push("fr", FieldValue::text(fr));
            }
            if let Some(fl) = video.frame_limit {
                payload.push("fl", FieldValue::text(fl));
            }
        }
    }

    if let Some(color) = options.background.effective_color() {
        payload.push("background_color", FieldValue::text(color));
    }
    if let Some(image) = options.background.image() {
        payload.push("background_image", FieldValue::file(image));
    }

    payload
}
