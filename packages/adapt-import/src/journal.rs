use adapt_store::domain::InstalledPlugin;
use parking_lot::Mutex;
use std::sync::Arc;

/// Course written by the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalCourse {
    pub id: String,
    /// True when an existing course was overwritten in place
    pub replaced: bool,
}

/// Snapshot of every side effect recorded so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalEntries {
    /// Ids of plugins that were not installed before the run
    pub installed_plugins: Vec<String>,
    /// Registry records as they were before the run updated them
    pub updated_plugins: Vec<InstalledPlugin>,
    pub tags: Vec<String>,
    pub assets: Vec<String>,
    pub course: Option<JournalCourse>,
}

impl JournalEntries {
    pub fn is_empty(&self) -> bool {
        self.installed_plugins.is_empty()
            && self.updated_plugins.is_empty()
            && self.tags.is_empty()
            && self.assets.is_empty()
            && self.course.is_none()
    }
}

/// Record of side effects a failed import must compensate
///
/// Appended to from concurrent fan-out; rollback reads a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SideEffectJournal {
    entries: Arc<Mutex<JournalEntries>>,
}

impl SideEffectJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_plugin_install(&self, id: impl Into<String>) {
        self.entries.lock().installed_plugins.push(id.into());
    }

    /// Keep the pre-update record of a plugin about to be overwritten
    pub fn record_plugin_update(&self, previous: InstalledPlugin) {
        let mut entries = self.entries.lock();
        // Only the first backup reflects the state before the run
        if !entries.updated_plugins.iter().any(|p| p.name == previous.name) {
            entries.updated_plugins.push(previous);
        }
    }

    pub fn record_tag(&self, id: impl Into<String>) {
        self.entries.lock().tags.push(id.into());
    }

    pub fn record_asset(&self, id: impl Into<String>) {
        self.entries.lock().assets.push(id.into());
    }

    pub fn record_course(&self, id: impl Into<String>, replaced: bool) {
        self.entries.lock().course = Some(JournalCourse {
            id: id.into(),
            replaced,
        });
    }

    pub fn snapshot(&self) -> JournalEntries {
        self.entries.lock().clone()
    }
}
