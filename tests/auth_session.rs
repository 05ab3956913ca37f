use receipt_client_core::{
    application::{
        ApplicationError, endpoints,
        ports::{
            http::{HttpMethod, HttpResponse},
            storage::KeyValueStore,
        },
    },
    domain::session::ProfilePatch,
    infrastructure::storage::SharedOrigin,
};
use serde_json::json;
use std::sync::Arc;

mod support;

use support::{MutableClock, ScriptedTransport, Tab, data, error_response, profile, settle, tokens};

fn two_tabs() -> (SharedOrigin, Tab, Tab, Arc<ScriptedTransport>) {
    let origin = SharedOrigin::new();
    let transport = Arc::new(ScriptedTransport::new());
    let clock = Arc::new(MutableClock::new());
    let first = Tab::open(&origin, Arc::clone(&transport), Arc::clone(&clock));
    let second = Tab::open(&origin, Arc::clone(&transport), clock);
    (origin, first, second, transport)
}

async fn sign_in(first: &Tab) {
    first
        .services
        .session
        .login(profile(), tokens("a1", "r1", 3600))
        .unwrap();
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn magic_link_login_signs_in_every_tab() {
    let (origin, first, second, transport) = two_tabs();
    transport.respond(
        HttpMethod::Post,
        endpoints::MAGIC_LINK_VERIFY,
        data(json!({
            "user": { "id": 42, "email": "ada@example.com", "first_name": "Ada" },
            "tokens": {
                "access": "a1",
                "refresh": "r1",
                "access_expires_at": "2024-01-01T01:00:00Z",
            },
            "is_new_user": true,
        })),
    );

    let login = first.services.auth.verify_magic_link(" tok-123 ").await.unwrap();
    settle().await;

    assert!(login.is_new_user);
    assert_eq!(login.user.id, "42");
    let request = &transport.requests_to(endpoints::MAGIC_LINK_VERIFY)[0];
    assert_eq!(request.body, Some(json!({ "token": "tok-123" })));
    assert_eq!(request.authorization, None);

    assert!(first.services.session.is_authenticated());
    assert_eq!(first.short_lived.get("access_token").as_deref(), Some("a1"));
    assert_eq!(origin.peek("refresh_token").as_deref(), Some("r1"));
    assert_eq!(second.services.session.access_token().as_deref(), Some("a1"));
    assert_eq!(
        second.services.session.user().unwrap().first_name.as_deref(),
        Some("Ada")
    );
}

#[tokio::test(start_paused = true)]
async fn blank_inputs_are_rejected_locally() {
    let (_origin, first, _second, transport) = two_tabs();
    let auth = &first.services.auth;

    assert!(matches!(
        auth.verify_magic_link("   ").await,
        Err(ApplicationError::Validation(_))
    ));
    assert!(matches!(
        auth.request_magic_link("not-an-email").await,
        Err(ApplicationError::Validation(_))
    ));
    sign_in(&first).await;
    assert!(matches!(
        auth.update_profile(ProfilePatch::new()).await,
        Err(ApplicationError::Validation(_))
    ));

    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetched_profile_is_cached_locally() {
    let (_origin, first, _second, transport) = two_tabs();
    sign_in(&first).await;
    let mut fresh = profile();
    fresh.first_name = Some("Augusta Ada".into());
    transport.respond(
        HttpMethod::Get,
        endpoints::PROFILE,
        data(serde_json::to_value(&fresh).unwrap()),
    );

    let fetched = first.services.auth.fetch_profile().await.unwrap();

    assert_eq!(fetched, fresh);
    assert_eq!(first.services.session.user(), Some(fresh));
    assert_eq!(transport.requests_to(endpoints::PROFILE)[0].bearer(), Some("a1"));
}

#[tokio::test(start_paused = true)]
async fn profile_updates_reach_the_other_tab() {
    let (_origin, first, second, transport) = two_tabs();
    sign_in(&first).await;
    transport.respond(
        HttpMethod::Put,
        endpoints::PROFILE,
        data(json!({ "first_name": "Augusta" })),
    );

    let updated = first
        .services
        .auth
        .update_profile(ProfilePatch::new().with("first_name", "Augusta"))
        .await
        .unwrap();
    settle().await;

    assert_eq!(updated.first_name.as_deref(), Some("Augusta"));
    assert_eq!(updated.email, "ada@example.com");
    assert_eq!(
        transport.requests_to(endpoints::PROFILE)[0].body,
        Some(json!({ "first_name": "Augusta" }))
    );
    let mirrored = second.services.session.user().unwrap();
    assert_eq!(mirrored.first_name.as_deref(), Some("Augusta"));
}

#[tokio::test(start_paused = true)]
async fn email_change_stays_pending_until_verified() {
    let (_origin, first, second, transport) = two_tabs();
    sign_in(&first).await;
    transport.respond(
        HttpMethod::Post,
        endpoints::EMAIL_UPDATE,
        data(json!({ "pending_email": "ada@lovelace.dev", "requires_relogin": false })),
    );
    transport.respond(
        HttpMethod::Post,
        endpoints::EMAIL_VERIFY,
        data(json!({
            "email": "ada@lovelace.dev",
            "is_email_verified": true,
            "tokens": { "access": "a3", "refresh": "r3", "expires_at": "2024-01-01T01:00:00Z" },
        })),
    );
    let auth = &first.services.auth;

    let pending = auth.update_email("ada@lovelace.dev").await.unwrap();
    assert_eq!(pending.pending_email.as_deref(), Some("ada@lovelace.dev"));
    let session = first.services.session.snapshot();
    assert_eq!(session.pending_email.as_deref(), Some("ada@lovelace.dev"));
    assert_eq!(session.user.unwrap().email, "ada@example.com");

    auth.verify_email("verify-1").await.unwrap();
    settle().await;

    let session = first.services.session.snapshot();
    assert!(session.pending_email.is_none());
    assert_eq!(session.access_token.as_deref(), Some("a3"));
    let user = session.user.unwrap();
    assert_eq!(user.email, "ada@lovelace.dev");
    assert!(user.is_email_verified);
    assert_eq!(
        transport.requests_to(endpoints::EMAIL_VERIFY)[0].authorization,
        None
    );

    let mirrored = second.services.session.snapshot();
    assert_eq!(mirrored.access_token.as_deref(), Some("a3"));
    assert_eq!(mirrored.refresh_token.as_deref(), Some("r3"));
    assert_eq!(mirrored.user.unwrap().email, "ada@lovelace.dev");
}

#[tokio::test(start_paused = true)]
async fn logout_revokes_and_clears_every_tab() {
    let (origin, first, second, transport) = two_tabs();
    sign_in(&first).await;
    transport.respond(HttpMethod::Post, endpoints::LOGOUT, HttpResponse::new(204, ""));

    first.services.auth.logout().await.unwrap();
    settle().await;

    let request = &transport.requests_to(endpoints::LOGOUT)[0];
    assert_eq!(request.body, Some(json!({ "refresh": "r1" })));
    assert_eq!(request.bearer(), Some("a1"));
    assert!(!first.services.session.is_authenticated());
    assert!(!second.services.session.is_authenticated());
    assert!(origin.peek("refresh_token").is_none());
}

#[tokio::test(start_paused = true)]
async fn logout_clears_locally_even_when_the_server_fails() {
    let (_origin, first, second, transport) = two_tabs();
    sign_in(&first).await;
    transport.respond(
        HttpMethod::Post,
        endpoints::LOGOUT,
        error_response(503, "unavailable", "Service unavailable"),
    );

    first.services.auth.logout().await.unwrap();
    settle().await;

    assert_eq!(transport.count(endpoints::LOGOUT), 1);
    assert!(!first.services.session.is_authenticated());
    assert!(first.short_lived.get("access_token").is_none());
    assert!(!second.services.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn shutdown_detaches_from_other_tabs() {
    let (_origin, first, second, _transport) = two_tabs();
    sign_in(&first).await;
    assert!(second.services.session.is_authenticated());

    let Tab { services, .. } = second;
    let session = Arc::clone(&services.session);
    services.shutdown();
    first.services.session.logout().unwrap();
    settle().await;

    assert!(session.is_authenticated());
}
