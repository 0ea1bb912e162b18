//! Asset metadata records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// File extension shared by every primary asset.
pub const PRIMARY_EXTENSION: &str = ".jpg";

/// Media type used when archiving primary assets.
pub const PRIMARY_MEDIA_TYPE: &str = "image/jpeg";

/// Delimiter between tag tokens in [`AssetRecord::tags`].
pub const TAG_DELIMITER: char = ',';

/// How a primary asset should be framed when its variants are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// No orientation chosen; profiles apply as configured.
    #[default]
    #[serde(rename = "")]
    Unset,
    /// Resize parameters are transposed before the transform runs.
    Portrait,
    /// Resize parameters apply as configured.
    Landscape,
}

impl Orientation {
    /// The string stored in the record store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }

    /// Lenient parse for values read back from the store.
    ///
    /// Rows written by older tools may carry arbitrary strings; those are
    /// treated as [`Orientation::Unset`].
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::warn!("Unknown stored orientation {:?}, treating as unset", value);
            Self::Unset
        })
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Error returned when an orientation string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown orientation '{0}' (expected portrait, landscape or unset)")]
pub struct ParseOrientationError(pub String);

impl FromStr for Orientation {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unset" | "none" => Ok(Self::Unset),
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::Landscape),
            _ => Err(ParseOrientationError(s.to_string())),
        }
    }
}

/// Pixel bounds of a derived variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Metadata for one primary asset, keyed by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Unique file name, including the extension (e.g. `a.jpg`).
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Bounds of the "small" variant.
    pub small: Dimensions,
    /// Bounds of the "medium" variant.
    pub medium: Dimensions,

    // User-editable fields.
    pub orientation: Orientation,
    /// Comma-delimited tag list, as typed by the user.
    pub tags: String,
    pub description: String,
    /// Hidden records stay in the store but are not meant for display.
    pub hidden: bool,
    pub alt: String,
}

impl AssetRecord {
    /// Create a fresh record for a newly added asset.
    ///
    /// The alt text defaults to the file stem with underscores turned into
    /// spaces.
    #[must_use]
    pub fn new(name: impl Into<String>, orientation: Orientation) -> Self {
        let name = name.into();
        let alt = default_alt(&name);
        Self {
            name,
            created_at: Utc::now(),
            small: Dimensions::default(),
            medium: Dimensions::default(),
            orientation,
            tags: String::new(),
            description: String::new(),
            hidden: false,
            alt,
        }
    }

    /// Iterate over the trimmed, non-empty tag tokens of this record.
    pub fn tag_tokens(&self) -> impl Iterator<Item = &str> {
        split_tags(&self.tags)
    }

    /// Whether this record carries exactly `tag` among its tokens.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_tokens().any(|t| t == tag)
    }

    /// Apply user edits, returning `true` if the orientation changed.
    pub fn apply(&mut self, edits: &RecordEdits) -> bool {
        let mut orientation_changed = false;
        if let Some(orientation) = edits.orientation {
            orientation_changed = orientation != self.orientation;
            self.orientation = orientation;
        }
        if let Some(tags) = &edits.tags {
            self.tags.clone_from(tags);
        }
        if let Some(description) = &edits.description {
            self.description.clone_from(description);
        }
        if let Some(alt) = &edits.alt {
            self.alt.clone_from(alt);
        }
        if let Some(hidden) = edits.hidden {
            self.hidden = hidden;
        }
        orientation_changed
    }
}

/// Partial update of the user-editable fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdits {
    pub orientation: Option<Orientation>,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub alt: Option<String>,
    pub hidden: Option<bool>,
}

/// Split a delimited tag field into trimmed, non-empty tokens.
pub fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(TAG_DELIMITER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn default_alt(name: &str) -> String {
    name.strip_suffix(PRIMARY_EXTENSION)
        .unwrap_or(name)
        .replace('_', " ")
}
