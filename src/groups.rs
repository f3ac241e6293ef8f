//! Conversation groups and the capabilities they enable.

use crate::config::GroupsConfig;

/// Resolves a conversation group to the capability names it enables.
///
/// Passed into the server at startup so tests can swap in their own mapping.
pub trait CapabilityLookup: Send + Sync {
    /// Capability names enabled for `group`, or `None` for an unknown group.
    fn tools_for(&self, group: &str) -> Option<Vec<String>>;
}

/// Lookup over the `[groups]` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    groups: GroupsConfig,
}

impl StaticGroups {
    /// Wrap a configured group table.
    pub fn new(groups: GroupsConfig) -> Self {
        Self { groups }
    }
}

impl CapabilityLookup for StaticGroups {
    fn tools_for(&self, group: &str) -> Option<Vec<String>> {
        self.groups.0.get(group).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXTREME_SEARCH;

    #[test]
    fn default_groups_enable_search() {
        let groups = StaticGroups::default();
        assert_eq!(groups.tools_for("web"), Some(vec![EXTREME_SEARCH.to_owned()]));
        assert_eq!(groups.tools_for("academic"), Some(vec![EXTREME_SEARCH.to_owned()]));
        assert_eq!(groups.tools_for("chat"), None);
    }

    #[test]
    fn empty_group_is_known_but_empty() {
        let mut config = GroupsConfig::default();
        config.0.insert("chat".into(), Vec::new());
        let groups = StaticGroups::new(config);
        assert_eq!(groups.tools_for("chat"), Some(Vec::new()));
    }
}
