//! Provisioning and resolver tests against in-memory SurrealDB.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use vitality_authz::{
    AuthzConfig, CatalogHooks, Identity, OrganizationEvent, UserEvent, full_template_id,
    minimal_template_id,
};
use vitality_core::catalog::{DATASET_FIELDS, MINIMUM_FIELDS, PUBLIC_FIELDS};
use vitality_core::models::dataset::CreateDataset;
use vitality_core::models::element::FieldMap;
use vitality_core::models::role::{ADMIN_ROLE_ID, MEMBER_ROLE_NAME, PUBLIC_ROLE_ID};
use vitality_core::models::template::{CreateTemplate, FULL_TEMPLATE, MINIMAL_TEMPLATE};
use vitality_core::repository::{
    DatasetRepository, ElementRepository, MetaStore, RoleRepository, TemplateRepository,
};
use vitality_db::SurrealMetaStore;

type Store = SurrealMetaStore<Db>;

async fn setup() -> (Arc<Store>, CatalogHooks<Store>) {
    let (_db, store, hooks) = setup_with_db().await;
    (store, hooks)
}

async fn setup_with_db() -> (Surreal<Db>, Arc<Store>, CatalogHooks<Store>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitality_db::run_migrations(&db).await.unwrap();
    let store = Arc::new(SurrealMetaStore::new(db.clone()));
    let hooks = CatalogHooks::new(Arc::clone(&store), AuthzConfig::default());

    for (id, name) in [("u1", "alice"), ("u2", "bob")] {
        hooks
            .on_user_created(UserEvent {
                id: id.into(),
                username: Some(name.into()),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    hooks
        .on_organization_created(OrganizationEvent {
            id: "o1".into(),
            name: Some("Ocean Networks".into()),
            member_usernames: vec!["alice".into()],
        })
        .await
        .unwrap();
    (db, store, hooks)
}

fn record() -> Value {
    json!({
        "id": "d1",
        "type": "dataset",
        "owner_org": "o1",
        "title": "Sea temperature",
        "notes": "{\"en\": \"Temperature\", \"fr\": \"Temperature FR\"}",
        "bbox-north-lat": "49.0",
    })
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn member_role_id(store: &Store) -> String {
    store
        .roles()
        .list(Some("o1"))
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name.as_deref() == Some(MEMBER_ROLE_NAME))
        .unwrap()
        .id
}

#[tokio::test]
async fn provisions_full_and_minimal_templates() {
    let (store, hooks) = setup().await;
    assert!(hooks.before_index(&record()).await.unwrap());

    let templates = store.templates().list_by_dataset("d1").await.unwrap();
    let template_names: BTreeSet<String> =
        templates.iter().filter_map(|t| t.name.clone()).collect();
    assert_eq!(template_names, names(&[FULL_TEMPLATE, MINIMAL_TEMPLATE]));

    let full = store
        .templates()
        .visible_fields_for_template(&full_template_id("d1"))
        .await
        .unwrap();
    let full_names: BTreeSet<String> = full.into_keys().collect();
    assert_eq!(full_names, names(DATASET_FIELDS));

    let minimal = store
        .templates()
        .visible_fields_for_template(&minimal_template_id("d1"))
        .await
        .unwrap();
    let minimal_names: BTreeSet<String> = minimal.into_keys().collect();
    let expected: BTreeSet<String> = names(PUBLIC_FIELDS)
        .union(&names(MINIMUM_FIELDS))
        .cloned()
        .collect();
    assert_eq!(minimal_names, expected);
}

#[tokio::test]
async fn provisioning_records_dataset_attributes() {
    let (store, hooks) = setup().await;
    hooks.before_index(&record()).await.unwrap();

    let dataset = store.datasets().get_by_id("d1").await.unwrap();
    assert_eq!(dataset.name.as_deref(), Some("Sea temperature"));
    assert_eq!(dataset.owner_org_id.as_deref(), Some("o1"));
    assert_eq!(dataset.descriptions["en"], "Temperature");
    assert_eq!(dataset.descriptions["fr"], "Temperature FR");

    let elements = store.elements().get_elements("d1").await.unwrap();
    let required: BTreeSet<String> = elements
        .iter()
        .filter(|e| e.required)
        .map(|e| e.name.clone())
        .collect();
    assert_eq!(required, names(MINIMUM_FIELDS));
}

#[tokio::test]
async fn provisioning_runs_once() {
    let (store, hooks) = setup().await;
    assert!(hooks.before_index(&record()).await.unwrap());
    assert!(!hooks.before_index(&record()).await.unwrap());

    assert_eq!(store.templates().list_by_dataset("d1").await.unwrap().len(), 2);
    assert_eq!(
        store.elements().get_elements("d1").await.unwrap().len(),
        DATASET_FIELDS.len()
    );
}

#[tokio::test]
async fn non_dataset_records_are_not_provisioned() {
    let (store, hooks) = setup().await;
    let harvest = json!({"id": "h1", "type": "harvest", "owner_org": "o1"});
    assert!(!hooks.before_index(&harvest).await.unwrap());
    assert!(store.datasets().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn provisioning_binds_roles_to_templates() {
    let (store, hooks) = setup().await;
    hooks.before_index(&record()).await.unwrap();
    let templates = store.templates();

    let public = templates
        .template_access_for_role("d1", PUBLIC_ROLE_ID)
        .await
        .unwrap();
    assert_eq!(public.as_deref(), Some(MINIMAL_TEMPLATE));

    let admin = templates
        .template_access_for_role("d1", ADMIN_ROLE_ID)
        .await
        .unwrap();
    assert_eq!(admin.as_deref(), Some(FULL_TEMPLATE));

    let member = templates
        .template_access_for_role("d1", &member_role_id(&store).await)
        .await
        .unwrap();
    assert_eq!(member.as_deref(), Some(FULL_TEMPLATE));
}

#[tokio::test]
async fn interrupted_provisioning_is_completed() {
    let (store, hooks) = setup().await;

    // Simulate a run that stopped right after creating the Full template.
    store
        .datasets()
        .create(CreateDataset {
            id: "d1".into(),
            owner_org_id: "o1".into(),
            name: None,
        })
        .await
        .unwrap();
    let partial: FieldMap = [("id", "e-id"), ("title", "e-title")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    store
        .templates()
        .create_full(
            "d1",
            CreateTemplate {
                id: full_template_id("d1"),
                name: Some(FULL_TEMPLATE.into()),
                description: None,
            },
            &partial,
        )
        .await
        .unwrap();

    assert!(hooks.before_index(&record()).await.unwrap());

    let templates = store.templates().list_by_dataset("d1").await.unwrap();
    assert_eq!(templates.len(), 2);
    let public = store
        .templates()
        .template_access_for_role("d1", PUBLIC_ROLE_ID)
        .await
        .unwrap();
    assert_eq!(public.as_deref(), Some(MINIMAL_TEMPLATE));

    let known = store.elements().get_metadata_fields("d1").await.unwrap();
    assert_eq!(known.len(), DATASET_FIELDS.len());
    assert_eq!(known["id"], "e-id");
}

#[tokio::test]
async fn unrestricted_only_through_full() {
    let (_store, hooks) = setup().await;
    hooks
        .on_user_created(UserEvent {
            id: "root".into(),
            username: Some("root".into()),
            sysadmin: true,
            ..Default::default()
        })
        .await
        .unwrap();
    hooks.before_index(&record()).await.unwrap();
    let resolver = hooks.resolver();

    assert!(!resolver.is_unrestricted("d1").await.unwrap());
    assert!(
        resolver
            .is_unrestricted_for_user("d1", &Identity::User("u1".into()))
            .await
            .unwrap()
    );
    assert!(
        resolver
            .is_unrestricted_for_user("d1", &Identity::User("root".into()))
            .await
            .unwrap()
    );
    // bob has no role in o1 and inherits the public binding.
    assert!(
        !resolver
            .is_unrestricted_for_user("d1", &Identity::User("u2".into()))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn unbound_user_falls_back_to_public() {
    let (_store, hooks) = setup().await;
    hooks.before_index(&record()).await.unwrap();
    let resolver = hooks.resolver();

    let public = resolver
        .resolve_visible_fields("d1", &Identity::Public)
        .await
        .unwrap();
    let bob = resolver
        .resolve_visible_fields("d1", &Identity::User("u2".into()))
        .await
        .unwrap();
    let alice = resolver
        .resolve_visible_fields("d1", &Identity::User("u1".into()))
        .await
        .unwrap();

    assert!(!public.is_empty());
    assert_eq!(bob, public);
    assert!(alice.is_superset(&public));
    assert_eq!(alice.len(), DATASET_FIELDS.len());
}

#[tokio::test]
async fn unprovisioned_dataset_resolves_to_nothing() {
    let (_store, hooks) = setup().await;
    let visible = hooks
        .resolver()
        .resolve_visible_fields("d1", &Identity::User("u1".into()))
        .await
        .unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn concurrent_first_encounters_both_succeed() {
    let (store, hooks) = setup().await;
    let other = CatalogHooks::new(Arc::clone(&store), AuthzConfig::default());
    let rec = record();

    let (first, second) = tokio::join!(hooks.before_index(&rec), other.before_index(&rec));
    let first = first.unwrap();
    let second = second.unwrap();
    assert!(first || second);

    assert_eq!(store.templates().list_by_dataset("d1").await.unwrap().len(), 2);
    assert_eq!(
        store.elements().get_metadata_fields("d1").await.unwrap().len(),
        DATASET_FIELDS.len()
    );
    let public = store
        .templates()
        .template_access_for_role("d1", PUBLIC_ROLE_ID)
        .await
        .unwrap();
    assert_eq!(public.as_deref(), Some(MINIMAL_TEMPLATE));

    let visible = hooks
        .resolver()
        .resolve_visible_fields("d1", &Identity::Public)
        .await
        .unwrap();
    let expected: BTreeSet<String> = names(PUBLIC_FIELDS)
        .union(&names(MINIMUM_FIELDS))
        .cloned()
        .collect();
    assert_eq!(visible.len(), expected.len());
}

#[tokio::test]
async fn failed_field_leaves_dataset_unprovisioned_until_retried() {
    let (db, store, hooks) = setup_with_db().await;
    db.query("DEFINE FIELD OVERWRITE name ON TABLE element TYPE string ASSERT $value != 'eov';")
        .await
        .unwrap()
        .check()
        .unwrap();

    assert!(hooks.before_index(&record()).await.is_err());
    let public = store
        .templates()
        .template_access_for_role("d1", PUBLIC_ROLE_ID)
        .await
        .unwrap();
    assert!(public.is_none());

    db.query("DEFINE FIELD OVERWRITE name ON TABLE element TYPE string;")
        .await
        .unwrap()
        .check()
        .unwrap();

    assert!(hooks.before_index(&record()).await.unwrap());
    assert_eq!(
        store.elements().get_metadata_fields("d1").await.unwrap().len(),
        DATASET_FIELDS.len()
    );
    let public = store
        .templates()
        .template_access_for_role("d1", PUBLIC_ROLE_ID)
        .await
        .unwrap();
    assert_eq!(public.as_deref(), Some(MINIMAL_TEMPLATE));
}
