//! Catalog hook tests: read-path redaction and directory lifecycle events.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use vitality_authz::{
    AuthzConfig, CatalogHooks, Identity, OrganizationEvent, PUBLIC_VISIBILITY_KEY, UserEvent,
};
use vitality_core::VitalityError;
use vitality_core::models::role::{ADMIN_ROLE_ID, MEMBER_ROLE_NAME};
use vitality_core::repository::{
    DatasetRepository, ElementRepository, MetaStore, OrganizationRepository, RoleRepository,
    TemplateRepository, UserRepository,
};
use vitality_db::SurrealMetaStore;

type Store = SurrealMetaStore<Db>;

struct Fixture {
    db: Surreal<Db>,
    store: Arc<Store>,
    hooks: CatalogHooks<Store>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitality_db::run_migrations(&db).await.unwrap();
    let store = Arc::new(SurrealMetaStore::new(db.clone()));
    let hooks = CatalogHooks::new(Arc::clone(&store), AuthzConfig::default());

    for (id, name, sysadmin) in [("u1", "alice", false), ("u2", "bob", false), ("root", "root", true)] {
        hooks
            .on_user_created(UserEvent {
                id: id.into(),
                username: Some(name.into()),
                email: Some(format!("{name}@example.org")),
                sysadmin,
            })
            .await
            .unwrap();
    }
    hooks
        .on_organization_created(OrganizationEvent {
            id: "o1".into(),
            name: Some("Ocean Networks".into()),
            member_usernames: vec!["alice".into(), "nobody".into()],
        })
        .await
        .unwrap();
    Fixture { db, store, hooks }
}

fn record() -> Value {
    json!({
        "id": "d1",
        "type": "dataset",
        "owner_org": "o1",
        "title": "Sea temperature",
        "notes": "{\"en\": \"Temperature\", \"fr\": \"Temperature FR\"}",
        "eov": "seaSurfaceTemperature",
        "bbox-north-lat": "49.0",
        "temporal-extent": "{\"begin\": \"2020-01-01\", \"end\": \"2021-01-01\"}",
    })
}

fn keys(value: &Value) -> BTreeSet<String> {
    value.as_object().unwrap().keys().cloned().collect()
}

fn alice() -> Identity {
    Identity::User("u1".into())
}

fn bob() -> Identity {
    Identity::User("u2".into())
}

#[tokio::test]
async fn public_sees_curated_subset() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let shown = f.hooks.after_show(record(), &Identity::Public).await;

    assert_eq!(shown["id"], "d1");
    assert_eq!(shown["eov"], "seaSurfaceTemperature");
    assert_eq!(
        shown["notes"],
        "{\"en\": \"Temperature\", \"fr\": \"Temperature FR\"}"
    );
    assert!(shown.get("bbox-north-lat").is_none());
    assert!(shown.get("temporal-extent").is_none());

    let public: Vec<&str> = shown[PUBLIC_VISIBILITY_KEY]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(public.contains(&"eov"));
    assert!(public.contains(&"id"));
    assert!(!public.contains(&"bbox-north-lat"));
}

#[tokio::test]
async fn show_fills_template_placeholders() {
    let f = setup().await;
    let shown = f.hooks.after_show(record(), &Identity::Public).await;

    assert_eq!(shown["resources"], json!([]));
    assert_eq!(shown["xml_location_url"], "");
    assert_eq!(shown["relationships_as_object"], "");
    assert_eq!(shown["relationships_as_subject"], "");
}

#[tokio::test]
async fn member_sees_everything() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let shown = f.hooks.after_show(record(), &alice()).await;

    assert_eq!(shown["bbox-north-lat"], "49.0");
    assert_eq!(
        shown["temporal-extent"],
        "{\"begin\": \"2020-01-01\", \"end\": \"2021-01-01\"}"
    );
    assert_eq!(shown["title"], "Sea temperature");
}

#[tokio::test]
async fn non_member_gets_public_view() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let as_bob = f.hooks.after_show(record(), &bob()).await;
    let as_public = f.hooks.after_show(record(), &Identity::Public).await;
    assert_eq!(as_bob, as_public);
}

#[tokio::test]
async fn show_provisions_unknown_dataset() {
    let f = setup().await;

    let shown = f.hooks.after_show(record(), &Identity::Public).await;

    assert_eq!(shown["id"], "d1");
    assert!(shown.get("bbox-north-lat").is_none());
    assert_eq!(f.store.templates().list_by_dataset("d1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn drift_is_registered_in_full_template() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();
    let before = f.store.elements().get_elements("d1").await.unwrap().len();

    let mut drifted = record();
    drifted["sensor-depth"] = json!("10m");

    let as_alice = f.hooks.after_show(drifted.clone(), &alice()).await;
    assert_eq!(as_alice["sensor-depth"], "10m");
    let as_public = f.hooks.after_show(drifted.clone(), &Identity::Public).await;
    assert!(as_public.get("sensor-depth").is_none());

    let after = f.store.elements().get_elements("d1").await.unwrap();
    assert_eq!(after.len(), before + 1);
    let added = after.iter().find(|e| e.name == "sensor-depth").unwrap();
    assert!(!added.required);
}

#[tokio::test]
async fn failures_show_restricted_record() {
    let f = setup().await;
    // Unknown dataset without an owner cannot be provisioned.
    let orphan = json!({"id": "d9", "type": "dataset", "title": "Secret", "bbox-north-lat": "1"});

    let shown = f.hooks.after_show(orphan, &alice()).await;

    let expected: BTreeSet<String> = [
        PUBLIC_VISIBILITY_KEY,
        "resources",
        "xml_location_url",
        "relationships_as_object",
        "relationships_as_subject",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect();
    assert_eq!(keys(&shown), expected);
    assert_eq!(shown[PUBLIC_VISIBILITY_KEY], json!([]));
}

#[tokio::test]
async fn other_record_types_pass_through() {
    let f = setup().await;
    let harvest = json!({"id": "h1", "type": "harvest", "secret": 1});
    assert_eq!(f.hooks.after_show(harvest.clone(), &Identity::Public).await, harvest);
}

#[tokio::test]
async fn search_results_are_filtered_and_marked() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();
    let broken = json!({"type": "dataset", "title": "no id"});

    let results = f
        .hooks
        .after_search(vec![record(), broken], &Identity::Public)
        .await;
    assert_eq!(results.len(), 2);

    let first = &results[0];
    assert_eq!(first["id"], "d1");
    assert!(first.get("bbox-north-lat").is_none());
    assert_eq!(first["resources"], json!([{"format": "VITALITY"}]));
    assert_eq!(first["notes_translated"], json!({"fr": "-", "en": "-"}));
    assert_eq!(first["xml_location_url"], "-");
    assert!(first[PUBLIC_VISIBILITY_KEY].as_array().unwrap().len() > 1);

    let second = &results[1];
    assert!(second.get("title").is_none());
    assert_eq!(second["resources"], json!([{"format": "VITALITY"}]));
    assert_eq!(second[PUBLIC_VISIBILITY_KEY], json!([]));
}

#[tokio::test]
async fn search_keeps_member_view() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let results = f.hooks.after_search(vec![record()], &alice()).await;
    assert_eq!(results[0]["bbox-north-lat"], "49.0");
}

#[tokio::test]
async fn posted_public_fields_replace_whitelist() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let update = json!({"id": "d1", PUBLIC_VISIBILITY_KEY: "[\"bbox-north-lat\"]"});
    f.hooks.after_update(&update).await.unwrap();

    let public = f.hooks.resolver().get_public_fields("d1").await.unwrap();
    assert!(public.contains(&"bbox-north-lat".to_string()));
    assert!(public.contains(&"id".to_string()));
    assert!(!public.contains(&"eov".to_string()));

    let shown = f.hooks.after_show(record(), &Identity::Public).await;
    assert_eq!(shown["bbox-north-lat"], "49.0");
    assert!(shown.get("eov").is_none());
}

#[tokio::test]
async fn malformed_public_fields_are_rejected() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let update = json!({"id": "d1", PUBLIC_VISIBILITY_KEY: "bbox-north-lat"});
    let err = f.hooks.after_update(&update).await.unwrap_err();
    assert!(matches!(err, VitalityError::Validation { .. }));

    // Without the key nothing changes.
    f.hooks.after_update(&json!({"id": "d1"})).await.unwrap();
    let public = f.hooks.resolver().get_public_fields("d1").await.unwrap();
    assert!(public.contains(&"eov".to_string()));
}

#[tokio::test]
async fn dataset_updates_are_synced() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    let update = json!({
        "id": "d1",
        "type": "dataset",
        "title_translated": "{\"en\": \"Ocean temperature\", \"fr\": \"Temperature des oceans\"}",
        "notes_translated": {"en": "Updated", "fr": "Mis a jour"},
    });
    f.hooks.on_dataset_updated(&update).await.unwrap();

    let dataset = f.store.datasets().get_by_id("d1").await.unwrap();
    assert_eq!(dataset.name.as_deref(), Some("Ocean temperature"));
    assert_eq!(dataset.descriptions["en"], "Updated");
    assert_eq!(dataset.descriptions["fr"], "Mis a jour");

    f.hooks.on_dataset_deleted("d1").await.unwrap();
    let err = f.store.datasets().get_by_id("d1").await.unwrap_err();
    assert!(matches!(err, VitalityError::NotFound { .. }));
}

#[tokio::test]
async fn user_lifecycle() {
    let f = setup().await;

    let roles = f.store.roles().get_user_roles("root").await.unwrap();
    assert!(roles.iter().any(|r| r.id == ADMIN_ROLE_ID));

    f.hooks
        .on_user_updated(UserEvent {
            id: "u2".into(),
            username: Some("robert".into()),
            email: Some("robert@example.org".into()),
            sysadmin: false,
        })
        .await
        .unwrap();
    let user = f.store.users().get_by_id("u2").await.unwrap();
    assert_eq!(user.username.as_deref(), Some("robert"));
    assert_eq!(user.email.as_deref(), Some("robert@example.org"));

    f.hooks.on_user_deleted("u2").await.unwrap();
    let err = f.store.users().get_by_id("u2").await.unwrap_err();
    assert!(matches!(err, VitalityError::NotFound { .. }));
}

#[tokio::test]
async fn organization_lifecycle() {
    let f = setup().await;

    let mut result = f
        .db
        .query("SELECT VALUE meta::id(in) FROM serves WHERE out = organization:o1")
        .await
        .unwrap();
    let served_by: Vec<String> = result.take(0).unwrap();
    assert_eq!(served_by, vec!["root".to_string()]);

    let alice_roles = f.store.roles().get_user_roles("u1").await.unwrap();
    assert!(
        alice_roles
            .iter()
            .any(|r| r.name.as_deref() == Some(MEMBER_ROLE_NAME))
    );

    f.hooks
        .on_organization_updated("o1", "Ocean Networks Canada")
        .await
        .unwrap();
    let org = f.store.organizations().get_by_id("o1").await.unwrap();
    assert_eq!(org.name.as_deref(), Some("Ocean Networks Canada"));

    f.hooks.on_organization_deleted("o1").await.unwrap();
    let err = f.store.organizations().get_by_id("o1").await.unwrap_err();
    assert!(matches!(err, VitalityError::NotFound { .. }));
}

#[tokio::test]
async fn membership_changes_visibility() {
    let f = setup().await;
    f.hooks.before_index(&record()).await.unwrap();

    f.hooks.on_member_added("o1", "bob").await.unwrap();
    let as_bob = f.hooks.after_show(record(), &bob()).await;
    assert_eq!(as_bob["bbox-north-lat"], "49.0");

    f.hooks.on_member_removed("o1", "u2").await.unwrap();
    let as_bob = f.hooks.after_show(record(), &bob()).await;
    assert!(as_bob.get("bbox-north-lat").is_none());

    // Unknown users and organizations are ignored.
    f.hooks.on_member_added("o1", "nobody").await.unwrap();
    f.hooks.on_member_added("o404", "bob").await.unwrap();
}
