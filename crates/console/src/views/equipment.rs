use super::{contains_term, require, search_term, Choice, ViewState};
use crate::error::Result;
use sensicity_auth::Session;
use sensicity_authz::catalog;
use sensicity_database::{EquipmentRepository, SharedStore};
use sensicity_models::{
    ConformityStatus, Equipment, EquipmentStatus, EquipmentType, NewEquipment, UpdateEquipment,
};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    /// Matched against name and model, case-insensitive.
    pub search: String,
    pub equipment_type: Choice<EquipmentType>,
    pub status: Choice<EquipmentStatus>,
    pub conformity: Choice<ConformityStatus>,
}

impl EquipmentFilter {
    pub fn matches(&self, equipment: &Equipment) -> bool {
        let search_ok = match search_term(&self.search) {
            Some(term) => contains_term(&equipment.name, &term) || contains_term(&equipment.model, &term),
            None => true,
        };

        search_ok
            && self.equipment_type.matches(&equipment.equipment_type)
            && self.status.matches(&equipment.status)
            && self.conformity.matches(&equipment.conformity_status)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentStats {
    pub total: usize,
    pub by_type: HashMap<EquipmentType, usize>,
    pub by_status: HashMap<EquipmentStatus, usize>,
    pub by_conformity: HashMap<ConformityStatus, usize>,
}

impl EquipmentStats {
    pub fn of_type(&self, kind: EquipmentType) -> usize {
        self.by_type.get(&kind).copied().unwrap_or(0)
    }

    pub fn with_status(&self, status: EquipmentStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn with_conformity(&self, conformity: ConformityStatus) -> usize {
        self.by_conformity.get(&conformity).copied().unwrap_or(0)
    }
}

/// Equipment inventory screen.
pub struct EquipmentView {
    repo: EquipmentRepository,
    items: Vec<Equipment>,
    state: ViewState,
}

impl EquipmentView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            repo: EquipmentRepository::new(store),
            items: Vec::new(),
            state: ViewState::default(),
        }
    }

    pub fn items(&self) -> &[Equipment] {
        &self.items
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn can_read(session: &Session) -> bool {
        session.has_permission(catalog::EQUIPMENT_READ)
    }

    pub fn can_create(session: &Session) -> bool {
        session.has_permission(catalog::EQUIPMENT_CREATE)
    }

    pub fn can_update(session: &Session) -> bool {
        session.has_permission(catalog::EQUIPMENT_UPDATE)
    }

    pub fn can_delete(session: &Session) -> bool {
        session.has_permission(catalog::EQUIPMENT_DELETE)
    }

    /// Fetch the whole inventory, newest first.
    pub async fn load(&mut self, session: &Session) -> Result<()> {
        self.state.begin(true);
        let result: Result<Vec<Equipment>> = async {
            require(session, catalog::EQUIPMENT_READ)?;
            Ok(self.repo.list().await?)
        }
        .await;

        let items = self.state.settle("equipment.load", result)?;
        tracing::debug!(count = items.len(), "Equipment loaded");
        self.items = items;
        Ok(())
    }

    pub fn filtered(&self, filter: &EquipmentFilter) -> Vec<&Equipment> {
        self.items.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn stats<'a>(items: impl IntoIterator<Item = &'a Equipment>) -> EquipmentStats {
        let mut stats = EquipmentStats::default();
        for item in items {
            stats.total += 1;
            *stats.by_type.entry(item.equipment_type).or_default() += 1;
            *stats.by_status.entry(item.status).or_default() += 1;
            *stats.by_conformity.entry(item.conformity_status).or_default() += 1;
        }
        stats
    }

    pub async fn create(&mut self, session: &Session, equipment: NewEquipment) -> Result<Equipment> {
        self.state.begin(false);
        let result: Result<Equipment> = async {
            require(session, catalog::EQUIPMENT_CREATE)?;
            let equipment = equipment.normalized();
            equipment.validate()?;
            Ok(self.repo.create(&equipment).await?)
        }
        .await;

        let created = self.state.settle("equipment.create", result)?;
        tracing::info!(equipment_id = %created.id, name = %created.name, "Equipment created");
        self.items.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update(
        &mut self,
        session: &Session,
        id: Uuid,
        update: UpdateEquipment,
    ) -> Result<Equipment> {
        self.state.begin(false);
        let result: Result<Equipment> = async {
            require(session, catalog::EQUIPMENT_UPDATE)?;
            let update = update.normalized();
            update.validate()?;
            Ok(self.repo.update(id, &update).await?)
        }
        .await;

        let updated = self.state.settle("equipment.update", result)?;
        match self.items.iter_mut().find(|e| e.id == id) {
            Some(slot) => *slot = updated.clone(),
            None => self.items.insert(0, updated.clone()),
        }
        Ok(updated)
    }

    pub async fn delete(&mut self, session: &Session, id: Uuid) -> Result<()> {
        self.state.begin(false);
        let result: Result<()> = async {
            require(session, catalog::EQUIPMENT_DELETE)?;
            Ok(self.repo.delete(id).await?)
        }
        .await;

        self.state.settle("equipment.delete", result)?;
        self.items.retain(|e| e.id != id);
        tracing::info!(equipment_id = %id, "Equipment deleted");
        Ok(())
    }

    /// Bulk delete with a single store call.
    pub async fn delete_many(&mut self, session: &Session, ids: &[Uuid]) -> Result<u64> {
        self.state.begin(false);
        let result: Result<u64> = async {
            require(session, catalog::EQUIPMENT_DELETE)?;
            Ok(self.repo.delete_many(ids).await?)
        }
        .await;

        let deleted = self.state.settle("equipment.delete_many", result)?;
        self.items.retain(|e| !ids.contains(&e.id));
        tracing::info!(requested = ids.len(), deleted, "Equipment bulk delete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use crate::views::test_support::session_with;
    use sensicity_database::{fixtures, DatabaseError, MemoryStore, Table};
    use std::sync::Arc;

    fn all_equipment_permissions() -> Vec<&'static str> {
        vec![
            catalog::EQUIPMENT_READ,
            catalog::EQUIPMENT_CREATE,
            catalog::EQUIPMENT_UPDATE,
            catalog::EQUIPMENT_DELETE,
        ]
    }

    #[tokio::test]
    async fn test_create_prepends_and_filters() {
        let store = fixtures::memory_store();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store);
        view.load(&session).await.unwrap();

        view.create(&session, fixtures::new_camera("CAM-Bellecour-01")).await.unwrap();
        let mut server = fixtures::new_camera("SRV-Archive");
        server.equipment_type = EquipmentType::Server;
        server.model = "Dell R740".to_string();
        server.conformity_status = ConformityStatus::NonCompliant;
        view.create(&session, server).await.unwrap();

        assert_eq!(view.items()[0].name, "SRV-Archive");

        let filter = EquipmentFilter {
            search: "bellecour".to_string(),
            ..Default::default()
        };
        assert_eq!(view.filtered(&filter).len(), 1);

        let filter = EquipmentFilter {
            search: "r740".to_string(),
            ..Default::default()
        };
        assert_eq!(view.filtered(&filter)[0].name, "SRV-Archive");

        let filter = EquipmentFilter {
            equipment_type: Choice::Only(EquipmentType::Camera),
            conformity: Choice::Only(ConformityStatus::NonCompliant),
            ..Default::default()
        };
        assert!(view.filtered(&filter).is_empty());

        let stats = EquipmentView::stats(view.items());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.of_type(EquipmentType::Camera), 1);
        assert_eq!(stats.of_type(EquipmentType::Switch), 0);
        assert_eq!(stats.with_conformity(ConformityStatus::NonCompliant), 1);
        assert_eq!(stats.with_status(EquipmentStatus::Active), 2);
    }

    #[tokio::test]
    async fn test_invalid_latitude_never_reaches_store() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store);

        let mut camera = fixtures::new_camera("CAM-North");
        camera.latitude = 91.0;
        let err = view.create(&session, camera).await.unwrap_err();

        match err {
            ViewError::Validation(fields) => assert!(fields.contains_key("latitude")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(memory.row_count(Table::Equipment).await, 0);
        assert!(view.items().is_empty());
        assert!(view.state_mut().take_error().is_some());
        assert!(view.state().last_error().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_coordinates_never_reach_store() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store);

        let cases: [(f64, f64, &str); 8] = [
            (45.76, 181.0, "longitude"),
            (45.76, -180.5, "longitude"),
            (f64::NAN, 4.83, "latitude"),
            (f64::INFINITY, 4.83, "latitude"),
            (f64::NEG_INFINITY, 4.83, "latitude"),
            (45.76, f64::NAN, "longitude"),
            (45.76, f64::INFINITY, "longitude"),
            (45.76, f64::NEG_INFINITY, "longitude"),
        ];
        for (latitude, longitude, field) in cases {
            let mut camera = fixtures::new_camera("CAM-Perrache-02");
            camera.latitude = latitude;
            camera.longitude = longitude;
            match view.create(&session, camera).await.unwrap_err() {
                ViewError::Validation(fields) => {
                    assert!(fields.contains_key(field), "{} {} {:?}", latitude, longitude, fields)
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(memory.row_count(Table::Equipment).await, 0);

        // The inventory still loads after the rejected attempts
        let kept = view.create(&session, fixtures::new_camera("CAM-Perrache-03")).await.unwrap();
        let err = view
            .update(
                &session,
                kept.id,
                UpdateEquipment {
                    latitude: Some(f64::NAN),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::Validation(ref f) if f.contains_key("latitude")));
        view.load(&session).await.unwrap();
        assert_eq!(view.items().len(), 1);
        assert_eq!(view.items()[0].latitude, kept.latitude);
    }

    #[tokio::test]
    async fn test_permission_checked_before_validation() {
        let store = fixtures::memory_store();
        let session = session_with(&store, "viewer@sensicity.fr", &[catalog::EQUIPMENT_READ]).await;
        let mut view = EquipmentView::new(store);

        let mut camera = fixtures::new_camera("");
        camera.latitude = 200.0;
        let err = view.create(&session, camera).await.unwrap_err();
        assert!(matches!(err, ViewError::Unauthorized(_)));
        assert!(!EquipmentView::can_create(&session));
        assert!(EquipmentView::can_read(&session));
    }

    #[tokio::test]
    async fn test_update_and_delete_patch_local_list() {
        let store = fixtures::memory_store();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store.clone());

        let a = view.create(&session, fixtures::new_camera("CAM-A")).await.unwrap();
        let b = view.create(&session, fixtures::new_camera("CAM-B")).await.unwrap();
        let c = view.create(&session, fixtures::new_camera("CAM-C")).await.unwrap();

        view.update(
            &session,
            a.id,
            UpdateEquipment {
                status: Some(EquipmentStatus::Maintenance),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let local = view.items().iter().find(|e| e.id == a.id).unwrap();
        assert_eq!(local.status, EquipmentStatus::Maintenance);
        assert_eq!(view.items().len(), 3);

        view.delete(&session, c.id).await.unwrap();
        assert_eq!(view.delete_many(&session, &[a.id, b.id]).await.unwrap(), 2);
        assert!(view.items().is_empty());

        // A fresh load agrees with the patched list
        view.load(&session).await.unwrap();
        assert!(view.items().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_transient() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store);

        memory
            .fail_next(DatabaseError::ConnectionFailed("network unreachable".to_string()))
            .await;
        let err = view.load(&session).await.unwrap_err();
        assert!(matches!(err, ViewError::Transient(_)));
        assert!(!view.state().is_loading());
        assert_eq!(view.state().last_error(), Some(&err));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = fixtures::memory_store();
        let session = session_with(&store, "tech@sensicity.fr", &all_equipment_permissions()).await;
        let mut view = EquipmentView::new(store);
        let err = view.delete(&session, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ViewError::NotFound(_)));
    }
}
