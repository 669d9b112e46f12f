use crate::config::System;
use crate::region::REGION_ALWAYS_ALLOWED;
use crate::release::ReleaseInfo;

/// Per-system include/exclude rules.
///
/// Matching is by substring: an exclude entry of "Beta" rejects "Beta 2",
/// and an include entry of "Europe" accepts "USA, Europe".
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    pub region_include: Vec<String>,
    pub region_exclude: Vec<String>,
    pub special_include: Vec<String>,
    pub special_exclude: Vec<String>,
}

impl FilterRules {
    pub fn from_system(system: &System) -> FilterRules {
        FilterRules {
            region_include: system.region_list_include.clone(),
            region_exclude: system.region_list_exclude.clone(),
            special_include: system.special_list_include.clone(),
            special_exclude: system.special_list_exclude.clone(),
        }
    }

    pub fn allows(&self, info: &ReleaseInfo) -> bool {
        self.allows_special(info) && self.allows_region(info)
    }

    pub fn allows_special(&self, info: &ReleaseInfo) -> bool {
        let tag_matches = |wanted: &String| info.extra_info.iter().any(|tag| tag.contains(wanted.as_str()));

        if self.special_exclude.iter().any(tag_matches) {
            return false;
        }

        if !self.special_include.is_empty() {
            return self.special_include.iter().any(tag_matches);
        }

        true
    }

    pub fn allows_region(&self, info: &ReleaseInfo) -> bool {
        let region = info.region_full.as_str();

        if self
            .region_exclude
            .iter()
            .any(|excluded| region.contains(excluded.as_str()))
        {
            return false;
        }

        if !self.region_include.is_empty() {
            return self
                .region_include
                .iter()
                .map(String::as_str)
                .chain(REGION_ALWAYS_ALLOWED.iter().copied())
                .any(|included| region.contains(included));
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(
        region_include: &[&str],
        region_exclude: &[&str],
        special_include: &[&str],
        special_exclude: &[&str],
    ) -> FilterRules {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        FilterRules {
            region_include: owned(region_include),
            region_exclude: owned(region_exclude),
            special_include: owned(special_include),
            special_exclude: owned(special_exclude),
        }
    }

    #[test]
    fn test_empty_rules_allow_everything() {
        let rules = FilterRules::default();
        assert!(rules.allows(&ReleaseInfo::from_file_name("Tetris (Japan) (Beta).gb")));
        assert!(rules.allows(&ReleaseInfo::from_file_name("notes.txt")));
    }

    #[test]
    fn test_region_include() {
        let rules = rules(&["USA", "Europe"], &[], &[], &[]);
        assert!(rules.allows_region(&ReleaseInfo::from_file_name("Game (USA).gb")));
        assert!(rules.allows_region(&ReleaseInfo::from_file_name("Game (Japan, Europe).gb")));
        assert!(!rules.allows_region(&ReleaseInfo::from_file_name("Game (Japan).gb")));
        // World and Unknown always pass an include list.
        assert!(rules.allows_region(&ReleaseInfo::from_file_name("Game (World).gb")));
        assert!(rules.allows_region(&ReleaseInfo::from_file_name("Game.gb")));
    }

    #[test]
    fn test_region_exclude_beats_include() {
        let rules = rules(&["USA"], &["Japan"], &[], &[]);
        assert!(!rules.allows_region(&ReleaseInfo::from_file_name("Game (Japan, USA).gb")));
        assert!(rules.allows_region(&ReleaseInfo::from_file_name("Game (USA).gb")));
    }

    #[test]
    fn test_special_exclude() {
        let rules = rules(&[], &[], &[], &["Beta", "Proto"]);
        assert!(!rules.allows_special(&ReleaseInfo::from_file_name("Game (USA) (Beta 2).gb")));
        assert!(!rules.allows_special(&ReleaseInfo::from_file_name("Game (Europe) (Proto).gb")));
        assert!(rules.allows_special(&ReleaseInfo::from_file_name("Game (USA) (Rev 1).gb")));
    }

    #[test]
    fn test_special_include() {
        let rules = rules(&[], &[], &["Demo"], &[]);
        assert!(rules.allows_special(&ReleaseInfo::from_file_name("Game (USA) (Demo).gb")));
        assert!(!rules.allows_special(&ReleaseInfo::from_file_name("Game (USA).gb")));
    }

    #[test]
    fn test_region_tag_is_not_a_special_tag() {
        // The region tag is removed before special matching, even when it is the first tag.
        let rules = rules(&[], &[], &[], &["USA"]);
        assert!(rules.allows_special(&ReleaseInfo::from_file_name("Game (USA) (Rev 1).gb")));
    }

    #[test]
    fn test_from_system() {
        let system = System {
            region_list_include: vec!["USA".to_string()],
            special_list_exclude: vec!["Beta".to_string()],
            ..System::default()
        };
        let rules = FilterRules::from_system(&system);
        assert!(rules.allows(&ReleaseInfo::from_file_name("Game (USA).gb")));
        assert!(!rules.allows(&ReleaseInfo::from_file_name("Game (USA) (Beta).gb")));
        assert!(!rules.allows(&ReleaseInfo::from_file_name("Game (Japan).gb")));
    }
}
