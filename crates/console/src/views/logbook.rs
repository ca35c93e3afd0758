use super::{contains_term, require, search_term, Choice, ViewState};
use crate::error::{Result, ViewError};
use chrono::{NaiveDate, Utc};
use sensicity_auth::Session;
use sensicity_authz::catalog;
use sensicity_database::{LogbookRepository, SharedStore};
use sensicity_models::{
    EntryStatus, EntryType, LogbookAction, LogbookEntry, NewLogbookAction, NewLogbookEntry,
    NewVideoBookmark, Priority, UpdateLogbookEntry,
};
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct LogbookFilter {
    /// Matched against description and event type.
    pub search: String,
    pub entry_type: Choice<EntryType>,
    pub priority: Choice<Priority>,
    pub status: Choice<EntryStatus>,
    /// Inclusive bounds on the calendar day of the entry timestamp.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LogbookFilter {
    pub fn matches(&self, entry: &LogbookEntry) -> bool {
        let search_ok = match search_term(&self.search) {
            Some(term) => {
                contains_term(&entry.description, &term) || contains_term(&entry.event_type, &term)
            }
            None => true,
        };
        let day = entry.timestamp.date_naive();

        search_ok
            && self.entry_type.matches(&entry.entry_type)
            && self.priority.matches(&entry.priority)
            && self.status.matches(&entry.status)
            && self.date_from.map_or(true, |from| day >= from)
            && self.date_to.map_or(true, |to| day <= to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogbookStats {
    pub total: usize,
    pub critical: usize,
    pub in_progress: usize,
    pub closed: usize,
}

/// Incident and event logbook screen.
pub struct LogbookView {
    repo: LogbookRepository,
    entries: Vec<LogbookEntry>,
    state: ViewState,
}

impl LogbookView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            repo: LogbookRepository::new(store),
            entries: Vec::new(),
            state: ViewState::default(),
        }
    }

    pub fn entries(&self) -> &[LogbookEntry] {
        &self.entries
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn can_read(session: &Session) -> bool {
        session.has_permission(catalog::LOGBOOK_READ)
    }

    pub fn can_create(session: &Session) -> bool {
        session.has_permission(catalog::LOGBOOK_CREATE)
    }

    pub fn can_update(session: &Session) -> bool {
        session.has_permission(catalog::LOGBOOK_UPDATE)
    }

    pub fn can_delete(session: &Session) -> bool {
        session.has_permission(catalog::LOGBOOK_DELETE)
    }

    pub async fn load(&mut self, session: &Session) -> Result<()> {
        self.state.begin(true);
        let result: Result<Vec<LogbookEntry>> = async {
            require(session, catalog::LOGBOOK_READ)?;
            Ok(self.repo.list().await?)
        }
        .await;

        let entries = self.state.settle("logbook.load", result)?;
        tracing::debug!(count = entries.len(), "Logbook loaded");
        self.entries = entries;
        Ok(())
    }

    pub fn filtered(&self, filter: &LogbookFilter) -> Vec<&LogbookEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn stats<'a>(entries: impl IntoIterator<Item = &'a LogbookEntry>) -> LogbookStats {
        entries.into_iter().fold(LogbookStats::default(), |mut stats, entry| {
            stats.total += 1;
            if entry.priority == Priority::Critical {
                stats.critical += 1;
            }
            match entry.status {
                EntryStatus::InProgress => stats.in_progress += 1,
                EntryStatus::Closed => stats.closed += 1,
                _ => {}
            }
            stats
        })
    }

    /// Record a new entry authored by the session user. When the entry names
    /// a camera, a video bookmark around the event time is added as well.
    pub async fn create(&mut self, session: &Session, entry: NewLogbookEntry) -> Result<LogbookEntry> {
        self.state.begin(false);
        let result: Result<LogbookEntry> = async {
            require(session, catalog::LOGBOOK_CREATE)?;
            let mut entry = entry.normalized();
            entry.user_id = session.user_id();
            entry.validate()?;
            Ok(self.repo.create(&entry).await?)
        }
        .await;

        let mut created = self.state.settle("logbook.create", result)?;
        tracing::info!(entry_id = created.id, entry_type = %created.entry_type, "Logbook entry created");

        if let Some(equipment_id) = created.equipment_id {
            let bookmark = NewVideoBookmark::around_event(created.id, equipment_id, created.timestamp);
            match self.repo.create_bookmark(&bookmark).await {
                Ok(bookmark) => created.video_bookmarks.push(bookmark),
                Err(e) => tracing::warn!(
                    entry_id = created.id,
                    equipment_id = %equipment_id,
                    error = %e,
                    "Failed to create video bookmark"
                ),
            }
        }

        self.entries.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update(
        &mut self,
        session: &Session,
        id: i64,
        update: UpdateLogbookEntry,
    ) -> Result<LogbookEntry> {
        self.state.begin(false);
        let result: Result<LogbookEntry> = async {
            require(session, catalog::LOGBOOK_UPDATE)?;
            let update = update.normalized();
            update.validate()?;
            Ok(self.repo.update(id, &update).await?)
        }
        .await;

        let updated = self.state.settle("logbook.update", result)?;
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(slot) => *slot = updated.clone(),
            None => self.entries.insert(0, updated.clone()),
        }
        Ok(updated)
    }

    /// Append a follow-up action, timestamped now, to an entry.
    pub async fn add_action(
        &mut self,
        session: &Session,
        entry_id: i64,
        action_type: &str,
        description: &str,
    ) -> Result<LogbookAction> {
        self.state.begin(false);
        let result: Result<LogbookAction> = async {
            require(session, catalog::LOGBOOK_CREATE)?;
            let action = NewLogbookAction {
                logbook_entry_id: entry_id,
                action_type: action_type.to_string(),
                description: description.to_string(),
                timestamp: Utc::now(),
                user_id: session.user_id(),
            }
            .normalized();
            action.validate()?;
            Ok(self.repo.add_action(&action).await?)
        }
        .await;

        let action = self.state.settle("logbook.add_action", result)?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
            entry.actions.push(action.clone());
        }
        Ok(action)
    }

    pub async fn delete(&mut self, session: &Session, id: i64) -> Result<()> {
        self.state.begin(false);
        let result: Result<()> = async {
            require(session, catalog::LOGBOOK_DELETE)?;
            Ok(self.repo.delete(id).await?)
        }
        .await;

        self.state.settle("logbook.delete", result)?;
        self.entries.retain(|e| e.id != id);
        tracing::info!(entry_id = id, "Logbook entry deleted");
        Ok(())
    }

    pub fn find(&self, id: i64) -> Result<&LogbookEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ViewError::NotFound(format!("Logbook entry {}", id)))
    }
}
