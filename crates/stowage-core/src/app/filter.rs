//! TargetFilter - 単一 target / 単一 group / 種類による絞り込み

use crate::domain::{ConfigError, SourceKind, Target};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// Full identity (`alice/notes`) or short name (`notes`).
    pub target: Option<String>,
    pub group: Option<String>,
    pub kind: Option<SourceKind>,
}

impl TargetFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn target(mut self, selector: impl Into<String>) -> Self {
        self.target = Some(selector.into());
        self
    }

    pub fn group(mut self, selector: impl Into<String>) -> Self {
        self.group = Some(selector.into());
        self
    }

    pub fn kind(mut self, kind: SourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, target: &Target) -> bool {
        let by_name = self.target.as_deref().is_none_or(|sel| {
            target.name.as_str() == sel || target.name.short_name() == sel
        });
        let by_group = self
            .group
            .as_deref()
            .is_none_or(|sel| target.group.as_deref() == Some(sel));
        let by_kind = self.kind.is_none_or(|kind| target.kind() == kind);
        by_name && by_group && by_kind
    }

    /// Targets kept by this filter, in configuration order.
    ///
    /// A target or group selector that matches nothing is a configuration
    /// error; a kind restriction alone may legitimately select nothing.
    pub fn select<'a>(&self, targets: &'a [Target]) -> Result<Vec<&'a Target>, ConfigError> {
        let selected: Vec<&Target> = targets.iter().filter(|t| self.matches(t)).collect();
        if selected.is_empty() && (self.target.is_some() || self.group.is_some()) {
            return Err(ConfigError::NoMatch(self.describe()));
        }
        Ok(selected)
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(target) = &self.target {
            parts.push(format!("target `{target}`"));
        }
        if let Some(group) = &self.group {
            parts.push(format!("group `{group}`"));
        }
        if let Some(kind) = self.kind {
            parts.push(format!("{kind} targets"));
        }
        parts.join(", ")
    }
}
