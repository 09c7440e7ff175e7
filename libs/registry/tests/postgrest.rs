//! HTTP-level tests for the PostgREST registry client.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use swarm_registry::{
    BotStatus, BuddyRegistration, HttpRegistry, NewBookEntry, Registry, RegistryError, SpellLevel,
    Visibility,
};

fn registration(id: &str) -> BuddyRegistration {
    BuddyRegistration {
        buddy_id: id.to_string(),
        human_name: "bob".to_string(),
        buddy_name: "buddy".to_string(),
        role: "buddy".to_string(),
        status: BotStatus::Inactive,
        channels: vec![],
        telegram_token: None,
        metadata: json!({"created_via": "swarm_manager"}),
    }
}

#[tokio::test]
async fn register_bot_posts_to_buddies_table() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/swarm_buddies"))
        .and(header("apikey", "secret"))
        .and(body_partial_json(json!({
            "buddy_id": "bob-buddy",
            "status": "inactive"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    registry.register_bot(&registration("bob-buddy")).await.unwrap();
}

#[tokio::test]
async fn update_status_patches_by_buddy_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/swarm_buddies"))
        .and(query_param("buddy_id", "eq.alpha"))
        .and(body_partial_json(json!({
            "status": "running",
            "port": 18001
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    registry
        .update_status("alpha", BotStatus::Running, Some(18001))
        .await
        .unwrap();
}

#[tokio::test]
async fn spellbook_filters_by_level_and_active() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/swarm_spellbook"))
        .and(query_param("spell_level", "in.(buddy,magician)"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"spell": "summon", "spell_level": "magician"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    let rows = registry.spellbook(SpellLevel::Magician).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["spell"], "summon");
}

#[tokio::test]
async fn mybuddybook_filters_by_visibility() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/swarm_mybuddybook"))
        .and(query_param("visibility", "in.(all)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    let rows = registry.mybuddybook(Visibility::All).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn append_returns_created_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/swarm_mybuddybook"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({"title": "greetings"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 7, "title": "greetings"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    let entry = NewBookEntry {
        title: "greetings".to_string(),
        category: "social".to_string(),
        content: "say hi".to_string(),
        author_buddy_id: Some("alpha".to_string()),
        visibility: Visibility::All,
        tags: vec!["intro".to_string()],
    };
    let row = registry.append_mybuddybook(&entry).await.unwrap();
    assert_eq!(row["id"], 7);
}

#[tokio::test]
async fn non_success_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/swarm_spellbook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let registry = HttpRegistry::new(server.uri(), "secret");
    let err = registry.spellbook(SpellLevel::Buddy).await.unwrap_err();
    match err {
        RegistryError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}
