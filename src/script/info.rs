//! Script-level editable fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptStatus {
    /// Being written.
    #[default]
    Draft,
    /// In rehearsal, still changing.
    Working,
    /// Locked for performances.
    Final,
    /// Kept for reference only.
    Backup,
}

/// Header information of a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    /// Display name.
    pub script_name: String,
    /// Lifecycle status.
    #[serde(default)]
    pub script_status: ScriptStatus,
    /// Scheduled show start.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Scheduled show end.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Venue name.
    #[serde(default)]
    pub venue: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub script_notes: Option<String>,
}

impl ScriptInfo {
    /// Creates script info with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { script_name: name.into(), ..Self::default() }
    }
}

/// A change to one script-level field, with the value before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum ScriptFieldChange {
    /// Display name.
    ScriptName {
        /// Value before the change.
        old: String,
        /// Value after the change.
        new: String,
    },
    /// Lifecycle status.
    ScriptStatus {
        /// Value before the change.
        old: ScriptStatus,
        /// Value after the change.
        new: ScriptStatus,
    },
    /// Scheduled start.
    StartTime {
        /// Value before the change.
        old: Option<DateTime<Utc>>,
        /// Value after the change.
        new: Option<DateTime<Utc>>,
    },
    /// Scheduled end.
    EndTime {
        /// Value before the change.
        old: Option<DateTime<Utc>>,
        /// Value after the change.
        new: Option<DateTime<Utc>>,
    },
    /// Venue.
    Venue {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
    /// Notes.
    ScriptNotes {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
}

impl ScriptFieldChange {
    /// Writes the new value into `info`.
    pub fn apply(&self, info: &mut ScriptInfo) {
        match self {
            Self::ScriptName { new, .. } => info.script_name.clone_from(new),
            Self::ScriptStatus { new, .. } => info.script_status = *new,
            Self::StartTime { new, .. } => info.start_time = *new,
            Self::EndTime { new, .. } => info.end_time = *new,
            Self::Venue { new, .. } => info.venue.clone_from(new),
            Self::ScriptNotes { new, .. } => info.script_notes.clone_from(new),
        }
    }

    /// The same change with old and new swapped.
    #[must_use]
    pub fn inverted(&self) -> Self {
        match self.clone() {
            Self::ScriptName { old, new } => Self::ScriptName { old: new, new: old },
            Self::ScriptStatus { old, new } => Self::ScriptStatus { old: new, new: old },
            Self::StartTime { old, new } => Self::StartTime { old: new, new: old },
            Self::EndTime { old, new } => Self::EndTime { old: new, new: old },
            Self::Venue { old, new } => Self::Venue { old: new, new: old },
            Self::ScriptNotes { old, new } => Self::ScriptNotes { old: new, new: old },
        }
    }

    /// The minimal list of changes that turns `before` into `after`.
    pub fn diff(before: &ScriptInfo, after: &ScriptInfo) -> Vec<Self> {
        let mut changes = Vec::new();
        if before.script_name != after.script_name {
            changes.push(Self::ScriptName {
                old: before.script_name.clone(),
                new: after.script_name.clone(),
            });
        }
        if before.script_status != after.script_status {
            changes.push(Self::ScriptStatus { old: before.script_status, new: after.script_status });
        }
        if before.start_time != after.start_time {
            changes.push(Self::StartTime { old: before.start_time, new: after.start_time });
        }
        if before.end_time != after.end_time {
            changes.push(Self::EndTime { old: before.end_time, new: after.end_time });
        }
        if before.venue != after.venue {
            changes.push(Self::Venue { old: before.venue.clone(), new: after.venue.clone() });
        }
        if before.script_notes != after.script_notes {
            changes.push(Self::ScriptNotes {
                old: before.script_notes.clone(),
                new: after.script_notes.clone(),
            });
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_and_apply_round_trip() {
        let before = ScriptInfo::new("Hamlet - Tech");
        let mut after = before.clone();
        after.script_status = ScriptStatus::Working;
        after.venue = Some("Main Stage".into());

        let changes = ScriptFieldChange::diff(&before, &after);
        assert_eq!(changes.len(), 2);

        let mut info = before.clone();
        for change in &changes {
            change.apply(&mut info);
        }
        assert_eq!(info, after);

        for change in changes.iter().rev() {
            change.inverted().apply(&mut info);
        }
        assert_eq!(info, before);
    }
}
