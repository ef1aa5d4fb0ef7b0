//! Objective filters decide which objectives a mission skips at dispatch time.

use questline_core::ObjectiveDefinition;

/// Decides whether an objective is skipped when its turn comes.
pub trait ObjectiveFilter {
    /// Whether `objective` is skipped.
    fn should_skip(&self, objective: &ObjectiveDefinition) -> bool;
}

impl<F> ObjectiveFilter for F
where
    F: Fn(&ObjectiveDefinition) -> bool,
{
    fn should_skip(&self, objective: &ObjectiveDefinition) -> bool {
        self(objective)
    }
}

/// Never skips.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ObjectiveFilter for AllowAll {
    fn should_skip(&self, _objective: &ObjectiveDefinition) -> bool {
        false
    }
}

/// Skips objectives carrying any tag that contains one of the ignored patterns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IgnoredTags {
    patterns: Vec<String>,
}

impl IgnoredTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns. Empty patterns are dropped, duplicates kept once.
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !pattern.is_empty() && !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl ObjectiveFilter for IgnoredTags {
    fn should_skip(&self, objective: &ObjectiveDefinition) -> bool {
        objective.tags.iter().any(|tag| {
            self.patterns
                .iter()
                .any(|pattern| tag.contains(pattern.as_str()))
        })
    }
}
