use sensicity_authz::{catalog, AuthzError, PermissionEvaluator, PermissionPolicy};
use sensicity_database::{fixtures, RoleRepository};
use sensicity_models::NewPermission;
use uuid::Uuid;

#[tokio::test]
async fn test_effective_set_tracks_role_exactly() {
    let store = fixtures::memory_store();
    let role = fixtures::seed_role(&store, "Supervisor", &[catalog::EQUIPMENT_READ, catalog::AUDIT_READ])
        .await
        .unwrap();
    let user = fixtures::seed_user(&store, "sup@sensicity.fr", Some(role.id), "x")
        .await
        .unwrap();
    let evaluator = PermissionEvaluator::new(store.clone(), PermissionPolicy::Strict);
    let roles = RoleRepository::new(store);

    let (_, perms) = evaluator.load_user(user.id).await.unwrap();
    let role_names: Vec<String> = roles
        .permissions_for_role(role.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    for name in catalog::names() {
        assert_eq!(perms.has(name), role_names.iter().any(|n| n == name), "{}", name);
    }

    // Revoking on the role shows up on the next load
    let audit = roles
        .ensure_permission(&NewPermission::from_name(catalog::AUDIT_READ, None).unwrap())
        .await
        .unwrap();
    assert!(roles.revoke_permission(role.id, audit.id).await.unwrap());
    let (_, perms) = evaluator.load_user(user.id).await.unwrap();
    assert!(!perms.has(catalog::AUDIT_READ));
    assert!(perms.has(catalog::EQUIPMENT_READ));
}

#[tokio::test]
async fn test_missing_user_establishes_nothing() {
    let evaluator = PermissionEvaluator::new(fixtures::memory_store(), PermissionPolicy::Strict);
    assert!(matches!(
        evaluator.load_user(Uuid::new_v4()).await,
        Err(AuthzError::NotFound(_))
    ));
}
