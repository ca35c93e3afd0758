use sensicity_auth::{FileSessionStore, PasswordHasher, SessionStore};
use sensicity_authz::catalog;
use sensicity_console::cli::{run, Command, EquipmentCommand, LogbookCommand};
use sensicity_console::views::Choice;
use sensicity_console::{AppState, Config};
use sensicity_database::{fixtures, EquipmentRepository, RoleRepository, SharedStore};
use std::sync::Arc;

const PASSWORD: &str = "Vid3oProtect!";

struct Console {
    _dir: tempfile::TempDir,
    store: SharedStore,
    state: AppState,
}

impl Console {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_memory(dir.path());
        let store = fixtures::memory_store();
        let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_file));
        Self {
            state: AppState::new(store.clone(), sessions, &config),
            store,
            _dir: dir,
        }
    }

    async fn seed_user(&self, email: &str, role: &str, permissions: &[&str]) {
        let role = fixtures::seed_role(&self.store, role, permissions).await.unwrap();
        let hash = PasswordHasher::default().hash(PASSWORD).unwrap();
        fixtures::seed_user(&self.store, email, Some(role.id), &hash)
            .await
            .unwrap();
    }

    async fn run(&self, command: Command) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(command, &self.state, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    async fn login(&self, email: &str) -> anyhow::Result<String> {
        self.run(Command::Login {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
    }
}

fn equipment_list() -> Command {
    Command::Equipment(EquipmentCommand::List {
        search: String::new(),
        equipment_type: Choice::All,
        status: Choice::All,
        conformity: Choice::All,
    })
}

#[tokio::test]
async fn test_dpo_session_end_to_end() {
    let console = Console::new();
    console
        .seed_user("dpo@sensicity.fr", "DPO", &[catalog::LOGBOOK_READ, catalog::USERS_READ])
        .await;

    let out = console.login("dpo@sensicity.fr").await.unwrap();
    assert!(out.contains("dpo@sensicity.fr"));
    assert!(out.contains("2 permissions"));

    // The session survives across commands through the mirror file
    let out = console.run(Command::Whoami).await.unwrap();
    assert!(out.contains("logbook.read"));
    assert!(!out.contains("equipment.delete"));

    console
        .run(Command::Check {
            permissions: vec![catalog::LOGBOOK_READ.to_string()],
        })
        .await
        .unwrap();
    let err = console
        .run(Command::Check {
            permissions: vec![catalog::EQUIPMENT_DELETE.to_string()],
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("equipment.delete"));

    let out = console
        .run(Command::Logbook(LogbookCommand::List {
            search: String::new(),
            priority: Choice::All,
            status: Choice::All,
        }))
        .await
        .unwrap();
    assert!(out.contains("0 entries"));

    // No equipment.read
    assert!(console.run(equipment_list()).await.is_err());

    console.run(Command::Logout).await.unwrap();
    assert!(console.run(Command::Whoami).await.is_err());
}

#[tokio::test]
async fn test_role_change_applies_on_next_restore() {
    let console = Console::new();
    console
        .seed_user("tech@sensicity.fr", "Technician", &[catalog::LOGBOOK_READ])
        .await;
    EquipmentRepository::new(console.store.clone())
        .create(&fixtures::new_camera("CAM-Terreaux-03"))
        .await
        .unwrap();
    console.login("tech@sensicity.fr").await.unwrap();
    assert!(console.run(equipment_list()).await.is_err());

    let roles = RoleRepository::new(console.store.clone());
    let role = roles.find_by_name("Technician").await.unwrap();
    let read = roles
        .ensure_permission(
            &sensicity_models::NewPermission::from_name(catalog::EQUIPMENT_READ, None).unwrap(),
        )
        .await
        .unwrap();
    roles.assign_permission(role.id, read.id).await.unwrap();

    let out = console.run(equipment_list()).await.unwrap();
    assert!(out.contains("CAM-Terreaux-03"));
    assert!(out.contains("1 equipment"));
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let console = Console::new();
    console.seed_user("op@sensicity.fr", "Operator", &[]).await;

    let err = console
        .run(Command::Login {
            email: "op@sensicity.fr".to_string(),
            password: "not-the-password".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid credentials"));
    assert!(console.run(Command::Whoami).await.is_err());
}
