use log::info;

/// Known No-Intro/Redump regions, highest precedence first.
pub const REGION_LIST: &[&str] = &[
    "USA", // Highest precedence when it comes to retro gaming
    "Europe",
    "Japan",
    "World",
    "Asia",
    "Korea",
    "Australia",
    "Germany",
    "France",
    "Italy",
    "Taiwan",
    "Sweden",
    "Spain",
    "Unknown",
    "Hong Kong",
    "China",
    "Brazil",
    "Canada",
];

/// Regions that pass any include list.
pub const REGION_ALWAYS_ALLOWED: &[&str] = &["World", "Unknown"];

pub const UNKNOWN_REGION: &str = "Unknown";

/// Result of looking for a region among the bracketed parts of a file name.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RegionMatch {
    /// Region used to name the destination folder (e.g. "USA").
    pub dir: String,
    /// The full bracket contents the region came from (e.g. "USA, Europe").
    pub full: String,
    /// Index of the snippet the region was found in.
    pub index: Option<usize>,
}

impl RegionMatch {
    fn unknown() -> RegionMatch {
        RegionMatch {
            dir: UNKNOWN_REGION.to_string(),
            full: UNKNOWN_REGION.to_string(),
            index: None,
        }
    }
}

/// Find the region among bracket snippets.
///
/// An exact snippet match is preferred; the last one wins since the region
/// tag comes after the title. Failing that, a snippet that contains a region
/// name (e.g. "USA, Europe") is used, picking the highest precedence region
/// within the last such snippet.
pub fn detect_region<S: AsRef<str>>(snippets: &[S]) -> RegionMatch {
    let exact = snippets
        .iter()
        .enumerate()
        .filter(|(_, snippet)| REGION_LIST.contains(&snippet.as_ref()))
        .last();

    if let Some((index, snippet)) = exact {
        return RegionMatch {
            dir: snippet.as_ref().to_string(),
            full: snippet.as_ref().to_string(),
            index: Some(index),
        };
    }

    let partial = snippets.iter().enumerate().rev().find_map(|(index, snippet)| {
        let snippet = snippet.as_ref();
        REGION_LIST
            .iter()
            .find(|region| snippet.contains(*region))
            .map(|region| RegionMatch {
                dir: region.to_string(),
                full: snippet.to_string(),
                index: Some(index),
            })
    });

    partial.unwrap_or_else(|| {
        let joined: Vec<&str> = snippets.iter().map(|s| s.as_ref()).collect();
        info!("Region not found in [{}]", joined.join(" "));
        RegionMatch::unknown()
    })
}

pub fn is_always_allowed(region: &str) -> bool {
    REGION_ALWAYS_ALLOWED.contains(&region)
}
