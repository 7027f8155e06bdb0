//! Background display state and `[IMAGE: ...]` tag extraction
//!
//! The model marks location imagery with an inline tag such as
//! `[IMAGE: Munnar, Kerala]`. The tag never reaches the user; it moves the
//! page background to a keyword image for the named place instead.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const DEFAULT_BACKGROUND_URL: &str =
    "https://source.unsplash.com/1920x1080/?india,monsoon,landscape";
pub const DEFAULT_LOCATION_LABEL: &str = "Monsoon Landscape, India";

const IMAGE_SEARCH_BASE: &str = "https://source.unsplash.com/1920x1080/?";
const IMAGE_SEARCH_QUALIFIERS: &str = "india,monsoon";

static IMAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMAGE: (.*?)\]").expect("image tag pattern is valid"));

/// What the page shows behind the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub background_image_url: String,
    pub current_location_label: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            background_image_url: DEFAULT_BACKGROUND_URL.to_string(),
            current_location_label: DEFAULT_LOCATION_LABEL.to_string(),
        }
    }
}

impl DisplayState {
    pub fn for_tag(tag: &ImageTag) -> Self {
        Self {
            background_image_url: tag.image_url(),
            current_location_label: tag.label.clone(),
        }
    }
}

/// A detected image tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    /// Full captured text, e.g. `Munnar, Kerala`
    pub label: String,
    /// First comma-separated segment, trimmed, e.g. `Munnar`
    pub location: String,
}

impl ImageTag {
    fn from_capture(captured: &str) -> Self {
        let location = captured.split(',').next().unwrap_or(captured).trim();
        Self {
            label: captured.to_string(),
            location: location.to_string(),
        }
    }

    /// Keyword image search URL for this location
    pub fn image_url(&self) -> String {
        format!(
            "{IMAGE_SEARCH_BASE}{},{IMAGE_SEARCH_QUALIFIERS}",
            urlencoding::encode(&self.location)
        )
    }
}

/// Result of running tag extraction over a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Text with the first tag removed (unchanged when there was none)
    pub text: String,
    pub tag: Option<ImageTag>,
}

/// Find the first `[IMAGE: ...]` tag, strip it and report what it named.
///
/// Only the first match is handled per call. Whitespace around the tag
/// collapses to a single separator: a newline if the gap held one, else a
/// space, and nothing at the very start of the text.
pub fn extract_image_tag(text: &str) -> Extraction {
    let Some(caps) = IMAGE_TAG.captures(text) else {
        return Extraction {
            text: text.to_string(),
            tag: None,
        };
    };
    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return Extraction {
            text: text.to_string(),
            tag: None,
        };
    };

    let (before, rest) = text.split_at(whole.start());
    let after = rest.get(whole.len()..).unwrap_or_default();

    Extraction {
        text: join_around_tag(before, after),
        tag: Some(ImageTag::from_capture(inner.as_str())),
    }
}

fn join_around_tag(before: &str, after: &str) -> String {
    let left = before.trim_end();
    let right = after.trim_start();
    if left.is_empty() {
        return right.to_string();
    }

    let gap_before = before.get(left.len()..).unwrap_or_default();
    let gap_after = after.get(..after.len() - right.len()).unwrap_or_default();
    let separator = if gap_before.contains('\n') || gap_after.contains('\n') {
        "\n"
    } else if gap_before.is_empty() && gap_after.is_empty() {
        ""
    } else {
        " "
    };
    format!("{left}{separator}{right}")
}
