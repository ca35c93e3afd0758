use super::first_or_not_found;
use crate::error::{DatabaseError, Result};
use crate::store::{from_row, from_rows, to_row, Filter, Query, SharedStore, Table};
use sensicity_models::{Equipment, NewEquipment, UpdateEquipment};
use uuid::Uuid;

#[derive(Clone)]
pub struct EquipmentRepository {
    store: SharedStore,
}

impl EquipmentRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Whole inventory, most recently created first.
    pub async fn list(&self) -> Result<Vec<Equipment>> {
        let rows = self
            .store
            .select(&Query::table(Table::Equipment).order_by("created_at", false))
            .await?;
        from_rows(rows)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Equipment> {
        let rows = self
            .store
            .select(&Query::table(Table::Equipment).eq("id", id).limit(1))
            .await?;
        first_or_not_found(rows, "Equipment", &id.to_string())
    }

    pub async fn create(&self, equipment: &NewEquipment) -> Result<Equipment> {
        let row = self
            .store
            .insert(Table::Equipment, to_row(equipment)?)
            .await?;
        from_row(row)
    }

    pub async fn update(&self, id: Uuid, update: &UpdateEquipment) -> Result<Equipment> {
        let patch = to_row(update)?;
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let rows = self
            .store
            .update(Table::Equipment, patch, &[Filter::eq("id", id)])
            .await?;
        first_or_not_found(rows, "Equipment", &id.to_string())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .store
            .delete(Table::Equipment, &[Filter::eq("id", id)])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("Equipment", &id.to_string()));
        }
        Ok(())
    }

    /// Delete every listed item in one statement; returns how many went.
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store
            .delete(Table::Equipment, &[Filter::is_in("id", ids)])
            .await
    }
}
