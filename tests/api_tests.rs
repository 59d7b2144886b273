#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the REST client against a scripted HTTP server.
//!
//! Checks request shapes (paths, JSON bodies, bearer header), decoding of
//! acknowledgements and the mapping of backend rejections to errors.

mod common;

use werewolf_client::interaction::SubmissionRequest;
use werewolf_client::protocol::{NightActionKind, NightActionRequest, Phase};
use werewolf_client::{
    project, ActionSubmitter, ApiClient, InteractionPanel, MemoryStorage, PanelState, Session,
    WerewolfError,
};

use common::{game_state, MockHttpServer};

fn json(value: serde_json::Value) -> String {
    value.to_string()
}

// ════════════════════════════════════════════════════════════════════
// Actions
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn cast_vote_posts_voter_and_target() {
    let server = MockHttpServer::start(vec![(
        200,
        json(serde_json::json!({ "success": true, "votes_count": 3 })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let ack = api.cast_vote("p1", "p2").await.unwrap();
    assert!(ack.success);
    assert_eq!(ack.votes_count, Some(3));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].target, "/game/vote");
    assert_eq!(
        requests[0].json(),
        serde_json::json!({ "voter_id": "p1", "target_id": "p2" })
    );
}

#[tokio::test]
async fn rejected_vote_carries_backend_detail() {
    let server = MockHttpServer::start(vec![(
        400,
        json(serde_json::json!({ "detail": "already voted" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let err = api.cast_vote("p1", "p2").await.unwrap_err();
    match &err {
        WerewolfError::Api { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "already voted");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(err.user_message(), "already voted");
}

#[tokio::test]
async fn error_without_detail_gets_generic_message() {
    let server = MockHttpServer::start(vec![(500, "Internal Server Error".to_string())]).await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let err = api.reset_game().await.unwrap_err();
    assert!(
        matches!(&err, WerewolfError::Api { status: 500, message } if message == "request failed with status 500"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn night_action_posts_kind_and_targets() {
    let server = MockHttpServer::start(vec![(200, json(serde_json::json!({ "success": true })))]).await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let request = NightActionRequest {
        actor_id: "p5".into(),
        action: NightActionKind::Pair,
        target_ids: vec!["p1".into(), "p2".into()],
    };
    let ack = api.submit_night_action(&request).await.unwrap();
    assert!(ack.success);

    let requests = server.requests();
    assert_eq!(requests[0].target, "/game/night-action");
    assert_eq!(
        requests[0].json(),
        serde_json::json!({ "actor_id": "p5", "action": "pair", "target_ids": ["p1", "p2"] })
    );
}

#[tokio::test]
async fn phase_change_uses_phase_in_path() {
    let server = MockHttpServer::start(vec![(
        200,
        json(serde_json::json!({ "success": true, "phase": "voting" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let ack = api.change_phase(Phase::Voting).await.unwrap();
    assert_eq!(ack.phase, Phase::Voting);
    assert_eq!(server.requests()[0].target, "/game/phase/voting");
}

#[tokio::test]
async fn start_game_reports_player_count() {
    let server = MockHttpServer::start(vec![(
        200,
        json(serde_json::json!({ "success": true, "message": "Partie lancée", "players": 6 })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let ack = api.start_game().await.unwrap();
    assert_eq!(ack.players, 6);
    assert_eq!(server.requests()[0].target, "/game/start");
}

#[tokio::test]
async fn unscripted_request_gets_not_found_detail() {
    let server = MockHttpServer::start(vec![(
        200,
        json(serde_json::json!({ "success": true, "phase": "night" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    api.change_phase(Phase::Night).await.unwrap();
    let err = api.start_game().await.unwrap_err();
    assert!(
        matches!(&err, WerewolfError::Api { status: 404, message } if message == "Not Found"),
        "{err:?}"
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].target, "/game/start");
}

// ════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn game_state_and_stats_decode() {
    let state = game_state(Phase::Night, 1);
    let server = MockHttpServer::start(vec![
        (200, serde_json::to_string(&state).unwrap()),
        (
            200,
            json(serde_json::json!({
                "phase": "night",
                "day": 1,
                "alive": 4,
                "dead": 0,
                "roles_alive": { "Loup-Garou": 1, "Voyante": 1 },
                "votes_count": 0
            })),
        ),
        (200, json(serde_json::json!({ "players": [] }))),
    ])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    assert_eq!(api.game_state().await.unwrap(), state);
    let stats = api.game_stats().await.unwrap();
    assert_eq!(stats.alive, 4);
    assert_eq!(stats.roles_alive.get("Voyante"), Some(&1));
    assert!(api.players().await.unwrap().is_empty());

    let targets: Vec<String> = server.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(targets, ["/game/state", "/game/stats", "/game/players"]);
}

// ════════════════════════════════════════════════════════════════════
// Auth
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn login_stores_session_and_authorizes_me() {
    let server = MockHttpServer::start(vec![
        (
            200,
            json(serde_json::json!({
                "access_token": "jwt-abc",
                "token_type": "bearer",
                "user": { "id": "42", "username": "alice", "discriminator": "0", "avatar": null }
            })),
        ),
        (
            200,
            json(serde_json::json!({
                "id": "42",
                "username": "alice",
                "display_name": "Alice",
                "avatar_url": "",
                "role": null,
                "is_alive": true
            })),
        ),
    ])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();
    let session = Session::new(MemoryStorage::default());

    let auth = api.login("discord-code", &session).await.unwrap();
    assert_eq!(auth.user.username, "alice");
    assert_eq!(session.player_id().unwrap().as_deref(), Some("42"));

    let me = api.current_user(&session).await.unwrap();
    assert_eq!(me.display_name, "Alice");

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].target, "/auth/callback?code=discord-code");
    assert_eq!(
        requests[1].headers.get("authorization").map(String::as_str),
        Some("Bearer jwt-abc")
    );
}

#[tokio::test]
async fn failed_code_exchange_is_auth_error() {
    let server = MockHttpServer::start(vec![(
        400,
        json(serde_json::json!({ "detail": "Erreur Discord OAuth: Invalid code" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();
    let session = Session::new(MemoryStorage::default());

    let err = api.login("stale", &session).await.unwrap_err();
    assert!(matches!(&err, WerewolfError::Auth(m) if m.contains("Invalid code")));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn expired_token_is_auth_error() {
    let server = MockHttpServer::start(vec![(
        401,
        json(serde_json::json!({ "detail": "Token invalide" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();
    let session = Session::new(MemoryStorage::default());
    session
        .save(&serde_json::from_value(serde_json::json!({
            "access_token": "old",
            "user": { "id": "42", "username": "alice" }
        }))
        .unwrap())
        .unwrap();

    let err = api.current_user(&session).await.unwrap_err();
    assert!(matches!(err, WerewolfError::Auth(ref m) if m == "Token invalide"));
}

#[tokio::test]
async fn login_url_is_returned_verbatim() {
    let server = MockHttpServer::start(vec![(
        200,
        json(serde_json::json!({ "auth_url": "https://discord.com/api/oauth2/authorize?client_id=1" })),
    )])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();
    assert_eq!(
        api.login_url().await.unwrap(),
        "https://discord.com/api/oauth2/authorize?client_id=1"
    );
}

// ════════════════════════════════════════════════════════════════════
// Panels over the real client
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn panel_recovers_from_already_voted() {
    let server = MockHttpServer::start(vec![
        (400, json(serde_json::json!({ "detail": "already voted" }))),
        (200, json(serde_json::json!({ "success": true }))),
    ])
    .await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let state = game_state(Phase::Voting, 1);
    let mut panel = InteractionPanel::from_view(&project(Some(&state), "p1")).unwrap();
    assert!(panel.select("p2"));

    assert!(panel.confirm(&api).await.is_err());
    assert_eq!(panel.state(), &PanelState::Selected(vec!["p2".into()]));
    assert_eq!(panel.last_error(), Some("already voted"));

    assert!(panel.confirm(&api).await.unwrap());
    assert!(matches!(panel.state(), PanelState::Confirmed(_)));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn seer_ticket_executes_against_backend() {
    let server = MockHttpServer::start(vec![(200, json(serde_json::json!({ "success": true })))]).await;
    let api = ApiClient::new(&server.base_url).unwrap();

    let state = game_state(Phase::Night, 1);
    let mut panel = InteractionPanel::from_view(&project(Some(&state), "p2")).unwrap();
    panel.select("p1");
    let ticket = panel.begin_confirm().unwrap();
    assert!(matches!(
        &ticket.request,
        SubmissionRequest::Night(r) if r.action == NightActionKind::Investigate
    ));

    let result = ticket.request.execute(&api).await;
    panel.complete(&ticket, result);
    assert!(matches!(panel.state(), PanelState::Confirmed(_)));
    assert_eq!(
        server.requests()[0].json(),
        serde_json::json!({ "actor_id": "p2", "action": "investigate", "target_ids": ["p1"] })
    );
}
