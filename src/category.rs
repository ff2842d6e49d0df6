use poise::serenity_prelude::{ChannelId, ChannelType, PermissionOverwrite};

use crate::{platform::ChannelSummary, provision::ProvisionError};

/// A guild category that course channels can be filed under.
#[derive(Debug, Clone)]
pub struct CourseCategory {
    pub id: ChannelId,
    pub label: String,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// Short label -> course category, in guild display order.
///
/// Built from a fresh channel listing on every use and never cached: categories
/// get renamed between presentations of the form.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    entries: Vec<CourseCategory>,
}

impl CategoryIndex {
    /// Scans `channels` for categories named `<label><suffix>`.
    ///
    /// Whitespace between label and suffix is dropped. When two categories
    /// share a label, the one shown first in the guild wins.
    pub fn build(channels: &[ChannelSummary], suffix: &str) -> Self {
        let mut categories: Vec<&ChannelSummary> = channels
            .iter()
            .filter(|channel| channel.kind == ChannelType::Category)
            .collect();
        categories.sort_by_key(|channel| (channel.position, channel.id));

        let mut entries: Vec<CourseCategory> = Vec::new();
        for channel in categories {
            let Some(label) = channel.name.strip_suffix(suffix) else {
                continue;
            };
            let label = label.trim_end();
            if entries.iter().any(|entry| entry.label == label) {
                continue;
            }
            entries.push(CourseCategory {
                id: channel.id,
                label: label.to_string(),
                overwrites: channel.overwrites.clone(),
            });
        }

        Self { entries }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<&CourseCategory> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact, case-sensitive match on `requested`, else the `fallback` label.
    pub fn resolve(&self, requested: &str, fallback: &str) -> Result<&CourseCategory, ProvisionError> {
        self.get(requested)
            .or_else(|| self.get(fallback))
            .ok_or_else(|| ProvisionError::MissingFallback(fallback.to_string()))
    }
}
