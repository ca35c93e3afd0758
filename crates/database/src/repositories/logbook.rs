use super::first_or_not_found;
use crate::error::{DatabaseError, Result};
use crate::store::{from_row, to_row, Embed, Filter, Query, SharedStore, Table};
use sensicity_models::{
    LogbookAction, LogbookEntry, NewLogbookAction, NewLogbookEntry, NewVideoBookmark,
    UpdateLogbookEntry, VideoBookmark,
};

#[derive(Clone)]
pub struct LogbookRepository {
    store: SharedStore,
}

fn entry_query() -> Query {
    Query::table(Table::LogbookEntries)
        .embed(Embed::many(Table::LogbookActions, "id", "logbook_entry_id"))
        .embed(Embed::many(Table::VideoBookmarks, "id", "logbook_entry_id"))
}

/// Actions in the order they happened.
fn sorted(mut entry: LogbookEntry) -> LogbookEntry {
    entry.actions.sort_by_key(|a| a.timestamp);
    entry.video_bookmarks.sort_by_key(|b| b.start_time);
    entry
}

impl LogbookRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Entries by event time, newest first, with actions and bookmarks.
    pub async fn list(&self) -> Result<Vec<LogbookEntry>> {
        let rows = self
            .store
            .select(&entry_query().order_by("timestamp", false))
            .await?;
        rows.into_iter()
            .map(|row| from_row(row).map(sorted))
            .collect()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<LogbookEntry> {
        let rows = self.store.select(&entry_query().eq("id", id).limit(1)).await?;
        first_or_not_found(rows, "Logbook entry", &id.to_string()).map(sorted)
    }

    /// Insert the entry alone; a new entry has no actions or bookmarks yet.
    pub async fn create(&self, entry: &NewLogbookEntry) -> Result<LogbookEntry> {
        let row = self
            .store
            .insert(Table::LogbookEntries, to_row(entry)?)
            .await?;
        from_row(row)
    }

    /// Apply the patch and reload the entry with its children.
    pub async fn update(&self, id: i64, update: &UpdateLogbookEntry) -> Result<LogbookEntry> {
        let patch = to_row(update)?;
        if !patch.is_empty() {
            let rows = self
                .store
                .update(Table::LogbookEntries, patch, &[Filter::eq("id", id)])
                .await?;
            if rows.is_empty() {
                return Err(DatabaseError::not_found("Logbook entry", &id.to_string()));
            }
        }
        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .store
            .delete(Table::LogbookEntries, &[Filter::eq("id", id)])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("Logbook entry", &id.to_string()));
        }
        Ok(())
    }

    pub async fn add_action(&self, action: &NewLogbookAction) -> Result<LogbookAction> {
        let row = self
            .store
            .insert(Table::LogbookActions, to_row(action)?)
            .await?;
        from_row(row)
    }

    pub async fn create_bookmark(&self, bookmark: &NewVideoBookmark) -> Result<VideoBookmark> {
        let row = self
            .store
            .insert(Table::VideoBookmarks, to_row(bookmark)?)
            .await?;
        from_row(row)
    }
}
