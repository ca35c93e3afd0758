use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{trim_in_place, trim_optional};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Incident,
    #[default]
    Observation,
    Requisition,
}

string_enum!(EntryType {
    Incident => "incident",
    Observation => "observation",
    Requisition => "requisition",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    New,
    InProgress,
    Closed,
    AwaitingRequisition,
}

string_enum!(EntryStatus {
    New => "new",
    InProgress => "in_progress",
    Closed => "closed",
    AwaitingRequisition => "awaiting_requisition",
});

/// Recording window kept around an event: two minutes before, five after.
pub const BOOKMARK_LEAD_MINUTES: i64 = 2;
pub const BOOKMARK_TAIL_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub description: String,
    // Author; the store decides what happens to it when the user is deleted
    pub user_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    #[serde(default)]
    pub is_judicial_requisition: bool,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub priority: Priority,
    pub location: Option<String>,
    #[serde(default)]
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    // Rows written before the column existed fall back to created_at
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "logbook_actions")]
    pub actions: Vec<LogbookAction>,
    #[serde(default)]
    pub video_bookmarks: Vec<VideoBookmark>,
}

fn default_event_type() -> String {
    "observation".to_string()
}

impl LogbookEntry {
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewLogbookEntry {
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub user_id: Uuid,

    pub equipment_id: Option<Uuid>,

    #[serde(default)]
    pub is_judicial_requisition: bool,

    #[validate(length(min = 1, message = "Event type is required"))]
    pub event_type: String,

    #[serde(default)]
    pub priority: Priority,

    pub location: Option<String>,

    #[serde(default)]
    pub status: EntryStatus,
}

impl NewLogbookEntry {
    pub fn normalized(mut self) -> Self {
        trim_in_place(&mut self.description);
        trim_in_place(&mut self.event_type);
        self.location = trim_optional(self.location);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateLogbookEntry {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Event type is required"))]
    pub event_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
}

impl UpdateLogbookEntry {
    pub fn normalized(mut self) -> Self {
        if let Some(ref mut v) = self.description {
            trim_in_place(v);
        }
        if let Some(ref mut v) = self.event_type {
            trim_in_place(v);
        }
        self.location = trim_optional(self.location);
        self
    }
}

/// Follow-up step recorded against an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookAction {
    pub id: i64,
    pub logbook_entry_id: i64,
    pub action_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewLogbookAction {
    pub logbook_entry_id: i64,

    #[validate(length(min = 1, message = "Action type is required"))]
    pub action_type: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub timestamp: DateTime<Utc>,

    pub user_id: Uuid,
}

impl NewLogbookAction {
    pub fn normalized(mut self) -> Self {
        trim_in_place(&mut self.action_type);
        trim_in_place(&mut self.description);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBookmark {
    pub id: i64,
    pub logbook_entry_id: i64,
    pub equipment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideoBookmark {
    pub logbook_entry_id: i64,
    pub equipment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
}

impl NewVideoBookmark {
    /// Bookmark covering the recording window around an event.
    pub fn around_event(entry_id: i64, equipment_id: Uuid, event_time: DateTime<Utc>) -> Self {
        Self {
            logbook_entry_id: entry_id,
            equipment_id,
            start_time: event_time - Duration::minutes(BOOKMARK_LEAD_MINUTES),
            end_time: event_time + Duration::minutes(BOOKMARK_TAIL_MINUTES),
            description: Some("Automatic bookmark for the event".to_string()),
        }
    }
}
