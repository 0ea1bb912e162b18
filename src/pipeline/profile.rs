//! Size profiles and orientation-aware parameter rewriting.

use crate::store::Orientation;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Flag token that introduces the resize geometry in a parameter list.
pub const RESIZE_FLAG: &str = "-resize";

/// Which derived variant a profile produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileKind {
    Small,
    Medium,
}

impl ProfileKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named list of transform parameters and the directory its output lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub kind: ProfileKind,
    pub target_dir: PathBuf,
    pub params: Vec<String>,
}

impl Profile {
    #[must_use]
    pub fn new(kind: ProfileKind, target_dir: impl Into<PathBuf>, params: Vec<String>) -> Self {
        Self {
            kind,
            target_dir: target_dir.into(),
            params,
        }
    }

    /// Build a profile from a space-separated parameter string.
    #[must_use]
    pub fn from_opts(kind: ProfileKind, target_dir: impl Into<PathBuf>, opts: &str) -> Self {
        Self::new(kind, target_dir, split_opts(opts))
    }

    /// Where the variant of `name` is written.
    #[must_use]
    pub fn target_path(&self, name: &str) -> PathBuf {
        self.target_dir.join(name)
    }

    /// Parameters to pass to the transform for a record with `orientation`.
    #[must_use]
    pub fn params_for(&self, orientation: Orientation) -> Vec<String> {
        rewrite_for_orientation(&self.params, orientation)
    }
}

/// The two derived variants every asset has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    pub small: Profile,
    pub medium: Profile,
}

impl ProfileSet {
    #[must_use]
    pub fn new(small: Profile, medium: Profile) -> Self {
        Self { small, medium }
    }

    /// Profiles in generation order.
    #[must_use]
    pub fn iter(&self) -> [&Profile; 2] {
        [&self.small, &self.medium]
    }

    /// Directories that must exist before regeneration.
    #[must_use]
    pub fn target_dirs(&self) -> Vec<&Path> {
        self.iter().iter().map(|p| p.target_dir.as_path()).collect()
    }
}

/// Split a space-separated option string, dropping repeated spaces.
#[must_use]
pub fn split_opts(opts: &str) -> Vec<String> {
    opts.split_whitespace().map(str::to_string).collect()
}

fn geometry_regex() -> &'static Regex {
    static GEOMETRY: OnceLock<Regex> = OnceLock::new();
    // width x height, with any trailing geometry modifiers (e.g. `>` or `^`).
    GEOMETRY.get_or_init(|| {
        Regex::new(r"^(?P<w>[^x]*)x(?P<h>[^x]*?)(?P<m>[!<>^%@]*)$")
            .unwrap_or_else(|e| unreachable!("static geometry regex: {e}"))
    })
}

/// Transpose `WxH` to `HxW` after the first `-resize` flag for portrait records.
///
/// Only the first occurrence is rewritten. Lists without the flag, a flag
/// with no value, or a value without an `x` are returned unchanged.
#[must_use]
pub fn rewrite_for_orientation(params: &[String], orientation: Orientation) -> Vec<String> {
    let mut params = params.to_vec();
    if orientation != Orientation::Portrait {
        return params;
    }

    let Some(index) = params.iter().position(|p| p == RESIZE_FLAG) else {
        return params;
    };
    let Some(value) = params.get_mut(index + 1) else {
        log::debug!("{} flag has no value, leaving parameters unchanged", RESIZE_FLAG);
        return params;
    };

    if let Some(caps) = geometry_regex().captures(value) {
        let rewritten = format!("{}x{}{}", &caps["h"], &caps["w"], &caps["m"]);
        log::trace!("Rewrote resize geometry {} -> {}", value, rewritten);
        *value = rewritten;
    }
    params
}
