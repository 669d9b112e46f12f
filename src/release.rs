//! No-Intro/Redump file name parsing.
//!
//! Release names carry their metadata in parenthesised tags, for example
//! `Sonic the Hedgehog (USA, Europe) (Rev 1).md` or `Wario Land (Japan) (Proto).gb`.

use serde::Serialize;

use crate::region::detect_region;

/// Release categories that get their own destination folder.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Special {
    Demo,
    Aftermarket,
    Unlicensed,
    Unreleased,
}

impl Special {
    /// Checked in this order, first match wins.
    pub const ALL: [Special; 4] = [
        Special::Demo,
        Special::Aftermarket,
        Special::Unlicensed,
        Special::Unreleased,
    ];

    /// Tag fragments that put a release into this category.
    pub fn criteria(&self) -> &'static [&'static str] {
        match self {
            Special::Demo => &["Demo"],
            Special::Aftermarket => &["Aftermarket"],
            Special::Unlicensed => &["Unlicensed", "Unl", "Pirate"],
            Special::Unreleased => &["Unreleased", "Proto"],
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Special::Demo => "Demo",
            Special::Aftermarket => "Aftermarket",
            Special::Unlicensed => "Unlicensed",
            Special::Unreleased => "Unreleased",
        }
    }
}

/// Parsed naming information for a single file.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ReleaseInfo {
    pub region_dir: String,
    pub region_full: String,
    pub special: Option<Special>,
    /// Bracket contents other than the region tag.
    pub extra_info: Vec<String>,
}

impl ReleaseInfo {
    pub fn from_file_name(name: &str) -> ReleaseInfo {
        let mut extra_info = bracket_contents(name);

        let region = detect_region(&extra_info);
        if let Some(index) = region.index {
            extra_info.remove(index);
        }

        let special = detect_special(&extra_info);

        ReleaseInfo {
            region_dir: region.dir,
            region_full: region.full,
            special,
            extra_info,
        }
    }

    /// Folder name under the system's remote directory.
    pub fn destination_dir(&self) -> &str {
        match self.special {
            Some(special) => special.dir_name(),
            None => &self.region_dir,
        }
    }
}

/// Contents of every `( ... )` group in `name`, in order.
///
/// Each group ends at the first `)` after its opening `(`, so nested
/// parentheses are not balanced.
pub fn bracket_contents(name: &str) -> Vec<String> {
    let mut contents = Vec::new();
    let mut rest = name;

    while let Some(open) = rest.find('(') {
        let after_open = &rest[open + 1..];
        match after_open.find(')') {
            Some(close) => {
                contents.push(after_open[..close].to_string());
                rest = &after_open[close + 1..];
            }
            None => break,
        }
    }

    contents
}

pub fn detect_special<S: AsRef<str>>(snippets: &[S]) -> Option<Special> {
    snippets.iter().find_map(|snippet| {
        let snippet = snippet.as_ref();
        Special::ALL.into_iter().find(|special| {
            special
                .criteria()
                .iter()
                .any(|criterion| snippet.contains(criterion))
        })
    })
}
