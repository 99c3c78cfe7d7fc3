//! Supabase adapter tests against a fake GoTrue/PostgREST server

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use kejmiltube::{
    backend::{AuthBackend, ContentBackend, HttpIpLookup, SupabaseBackend, SupabaseConfig},
    content::ContentRepository,
    engagement::EngagementReconciler,
    models::{NewVideo, Profile, ProfileUpdate, VideoFilter},
    session::{persist::LocalStore, Registration, SessionState, SessionStore},
    TubeError,
};
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tempfile::tempdir;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    query: String,
    authorization: Option<String>,
    apikey: Option<String>,
    prefer: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeState {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeState {
    fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }
}

const ANON_KEY: &str = "anon-key";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn session_body(user_id: &str, email: &str, username: &str) -> Value {
    json!({
        "access_token": "token-1",
        "refresh_token": "refresh-1",
        "token_type": "bearer",
        "user": {
            "id": user_id,
            "email": email,
            "user_metadata": { "username": username }
        }
    })
}

fn profile_row(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "avatar_url": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

fn respond(request: &Recorded) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/ip") => "203.0.113.9\n".into_response(),
        ("POST", "/auth/v1/token") => {
            if request.body["password"] == "Valid123" {
                Json(session_body("u1", "jan@example.com", "jan")).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_grant",
                        "error_description": "Invalid login credentials"
                    })),
                )
                    .into_response()
            }
        }
        ("POST", "/auth/v1/signup") => {
            let email = request.body["email"].as_str().unwrap_or_default();
            let username = request.body["data"]["username"].as_str().unwrap_or_default();
            if email == "taken@example.com" {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "code": 422, "msg": "User already registered" })),
                )
                    .into_response()
            } else if email.starts_with("newcomer") {
                Json(session_body("u3", email, username)).into_response()
            } else if email.starts_with("pending") {
                Json(json!({ "id": "u2", "email": email, "user_metadata": { "username": username } }))
                    .into_response()
            } else {
                Json(session_body("u1", email, username)).into_response()
            }
        }
        ("POST", "/auth/v1/logout") => StatusCode::NO_CONTENT.into_response(),
        ("GET", "/auth/v1/user") => {
            if request.authorization.as_deref() == Some("Bearer token-1") {
                Json(json!({
                    "id": "u1",
                    "email": "jan@example.com",
                    "user_metadata": { "username": "jan" }
                }))
                .into_response()
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))).into_response()
            }
        }
        ("GET", "/rest/v1/profiles") => {
            if request.query.contains("id=eq.u1") {
                Json(json!([profile_row("u1", "jan")])).into_response()
            } else if request.query.contains("username=eq.fresh_face&") {
                Json(json!([profile_row("u9", "fresh_face")])).into_response()
            } else {
                Json(json!([])).into_response()
            }
        }
        ("POST", "/rest/v1/profiles") => {
            let mut row = profile_row("", "");
            row["id"] = request.body["id"].clone();
            row["username"] = request.body["username"].clone();
            Json(json!([row])).into_response()
        }
        ("PATCH", "/rest/v1/profiles") => {
            if request.body["username"] == "taken" {
                (
                    StatusCode::CONFLICT,
                    Json(json!({
                        "code": "23505",
                        "message": "duplicate key value violates unique constraint \"profiles_username_key\""
                    })),
                )
                    .into_response()
            } else {
                let username = request.body["username"].as_str().unwrap_or("jan");
                Json(json!([profile_row("u1", username)])).into_response()
            }
        }
        ("GET", "/rest/v1/videos") => Json(json!([
            {
                "id": "v-old",
                "title": "Older upload",
                "description": null,
                "category": "Music",
                "video_url": "https://youtu.be/old",
                "thumbnail_url": null,
                "user_id": "u1",
                "uploaded_by": "jan",
                "views": 12,
                "created_at": "2026-01-01T00:00:00Z"
            },
            {
                "id": "v-new",
                "title": "Newer upload",
                "description": "fresh",
                "category": "Music",
                "video_url": "https://youtu.be/new",
                "thumbnail_url": null,
                "user_id": "u1",
                "uploaded_by": "jan",
                "views": 3,
                "created_at": "2026-02-01T00:00:00Z"
            }
        ]))
        .into_response(),
        ("POST", "/rest/v1/videos") => {
            let mut row = request.body[0].clone();
            row["id"] = json!("v-created");
            row["views"] = json!(0);
            row["created_at"] = json!("2026-03-01T00:00:00Z");
            (StatusCode::CREATED, Json(json!([row]))).into_response()
        }
        ("PATCH", "/rest/v1/comments") => StatusCode::NO_CONTENT.into_response(),
        ("POST", "/rest/v1/rpc/increment_video_views_safe") => StatusCode::NO_CONTENT.into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "no route" }))).into_response(),
    }
}

async fn handle(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        authorization: header(&headers, "authorization"),
        apikey: header(&headers, "apikey"),
        prefer: header(&headers, "prefer"),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    };
    state.requests.lock().unwrap().push(request.clone());
    respond(&request)
}

async fn spawn_fake() -> (SocketAddr, FakeState) {
    let state = FakeState::default();
    let app = Router::new().fallback(handle).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn supabase(addr: SocketAddr) -> SupabaseBackend {
    SupabaseBackend::new(SupabaseConfig {
        url: format!("http://{}/", addr),
        anon_key: ANON_KEY.to_string(),
        user_agent: "kejmiltube-tests".to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn session_over(backend: Arc<SupabaseBackend>) -> SessionStore {
    SessionStore::new(backend.clone(), backend)
}

#[tokio::test]
async fn test_login_resolves_profile_with_user_token() {
    let (addr, fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));

    let profile = session.try_login("jan@example.com", "Valid123").await.unwrap();
    assert_eq!(profile.username, "jan");
    assert_eq!(profile.email, "jan@example.com");
    assert!(session.current().is_authenticated());

    let token = fake.requests_to("POST", "/auth/v1/token");
    assert_eq!(token.len(), 1);
    assert_eq!(token[0].query, "grant_type=password");
    assert_eq!(token[0].apikey.as_deref(), Some(ANON_KEY));

    let profiles = fake.requests_to("GET", "/rest/v1/profiles");
    assert_eq!(profiles[0].authorization.as_deref(), Some("Bearer token-1"));
    assert!(profiles[0].query.contains("id=eq.u1"));
}

#[tokio::test]
async fn test_bad_credentials_are_authentication_errors() {
    let (addr, _fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));
    session.initialize().await;

    let err = session.try_login("jan@example.com", "Wrong123").await.unwrap_err();
    match err {
        TubeError::Authentication(message) => assert_eq!(message, "Invalid login credentials"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.current(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_sign_up_outcomes() {
    let (addr, fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));

    let pending = session
        .try_register("pending@example.com", "Valid123", "newbie")
        .await
        .unwrap();
    assert_eq!(
        pending,
        Registration::PendingConfirmation {
            email: "pending@example.com".to_string()
        }
    );
    assert!(!session.current().is_authenticated());

    let taken = session
        .try_register("taken@example.com", "Valid123", "someone")
        .await
        .unwrap_err();
    assert!(taken.is_conflict());

    let signup = fake.requests_to("POST", "/auth/v1/signup");
    assert_eq!(signup[0].body["data"]["username"], "newbie");
}

#[tokio::test]
async fn test_confirmed_registration_signs_in() {
    let (addr, fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));

    let registered = session
        .try_register("fresh@example.com", "Valid123", "fresh_face")
        .await
        .unwrap();

    match registered {
        Registration::SignedIn(profile) => {
            assert_eq!(profile.id, "u1");
            // Profile rows carry no email; it comes from the auth user
            assert_eq!(profile.email, "fresh@example.com");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(session.current().is_authenticated());
    assert!(fake.requests_to("POST", "/rest/v1/profiles").is_empty());
}

#[tokio::test]
async fn test_new_profile_takes_first_free_username() {
    let (addr, fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));

    let registered = session
        .try_register("newcomer@example.com", "Valid123", "fresh_face")
        .await
        .unwrap();

    match registered {
        Registration::SignedIn(profile) => {
            assert_eq!(profile.id, "u3");
            assert_eq!(profile.username, "fresh_face_2");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    let lookups = fake.requests_to("GET", "/rest/v1/profiles");
    assert!(lookups.iter().any(|r| r.query.contains("username=eq.fresh_face&")));
    let created = fake.requests_to("POST", "/rest/v1/profiles");
    assert_eq!(created[0].body["username"], "fresh_face_2");
}

#[tokio::test]
async fn test_username_conflict_maps_to_conflict() {
    let (addr, fake) = spawn_fake().await;
    let session = session_over(Arc::new(supabase(addr)));
    session.try_login("jan@example.com", "Valid123").await.unwrap();

    let err = session
        .try_update_profile(&ProfileUpdate::username("taken"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(session.current_profile().unwrap().username, "jan");

    let renamed = session
        .try_update_profile(&ProfileUpdate::username("jan_two"))
        .await
        .unwrap();
    assert_eq!(renamed.username, "jan_two");
    assert_eq!(renamed.email, "jan@example.com");

    let patches = fake.requests_to("PATCH", "/rest/v1/profiles");
    assert_eq!(patches.len(), 2);
    assert!(patches[0].query.contains("id=eq.u1"));
    assert_eq!(patches[0].prefer.as_deref(), Some("return=representation"));
    assert_eq!(patches[1].body, json!({ "username": "jan_two" }));
}

#[tokio::test]
async fn test_video_listing_and_upload() {
    let (addr, fake) = spawn_fake().await;
    let backend = Arc::new(supabase(addr));
    let repo = ContentRepository::new(backend.clone());

    let videos = repo.list_videos(&VideoFilter::owner("u1")).await.unwrap();
    let ids: Vec<_> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v-new", "v-old"]);

    let listing = fake.requests_to("GET", "/rest/v1/videos");
    assert!(listing[0].query.contains("order=created_at.desc"));
    assert!(listing[0].query.contains("user_id=eq.u1"));
    assert_eq!(listing[0].authorization.as_deref(), Some("Bearer anon-key"));

    let owner = Profile::new("u1", "jan@example.com", "jan");
    let created = repo
        .create_video(
            NewVideo {
                title: "  <b>Rust</b> in ten minutes ".to_string(),
                description: None,
                category: "Education".to_string(),
                video_url: "https://www.youtube.com/watch?v=abc123".to_string(),
                thumbnail_url: None,
            },
            &owner,
        )
        .await
        .unwrap();
    assert_eq!(created.id, "v-created");
    assert_eq!(created.title, "Rust in ten minutes");

    let inserts = fake.requests_to("POST", "/rest/v1/videos");
    let row = &inserts[0].body[0];
    assert_eq!(row["thumbnail_url"], "https://img.youtube.com/vi/abc123/maxresdefault.jpg");
    assert_eq!(row["user_id"], "u1");
    assert_eq!(row["uploaded_by"], "jan");
    assert!(row.get("description").is_none());
    assert_eq!(inserts[0].prefer.as_deref(), Some("return=representation"));
}

#[tokio::test]
async fn test_view_increment_sends_ip_hint() {
    let (addr, fake) = spawn_fake().await;
    let backend = Arc::new(supabase(addr));
    let ip_lookup = Arc::new(HttpIpLookup::new(format!("http://{}/ip", addr), "kejmiltube-tests", 5).unwrap());
    let engagement = Arc::new(EngagementReconciler::new(backend.clone(), backend, ip_lookup, true));

    engagement.increment_view("v-new").await.unwrap();

    let calls = fake.requests_to("POST", "/rest/v1/rpc/increment_video_views_safe");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, json!({ "video_id": "v-new", "user_ip": "203.0.113.9" }));
}

#[tokio::test]
async fn test_view_increment_without_ip() {
    let (addr, fake) = spawn_fake().await;
    let backend = Arc::new(supabase(addr));
    let ip_lookup = Arc::new(HttpIpLookup::new(format!("http://{}/missing", addr), "kejmiltube-tests", 5).unwrap());
    let engagement = EngagementReconciler::new(backend.clone(), backend, ip_lookup, true);

    engagement.record_view("v-new").await;

    let calls = fake.requests_to("POST", "/rest/v1/rpc/increment_video_views_safe");
    assert_eq!(calls[0].body, json!({ "video_id": "v-new", "user_ip": null }));
}

#[tokio::test]
async fn test_tokens_persist_and_logout_clears_them() {
    let (addr, fake) = spawn_fake().await;
    let dir = tempdir().unwrap();

    let backend = supabase(addr).with_token_store(LocalStore::new(dir.path()));
    backend.sign_in("jan@example.com", "Valid123").await.unwrap();
    assert!(dir.path().join("kejmiltube_auth.json").exists());

    // A new process picks the session back up
    let restored = Arc::new(supabase(addr).with_token_store(LocalStore::new(dir.path())));
    assert!(restored.restore_session().await.unwrap());
    let session = session_over(restored.clone());
    session.initialize().await;
    assert_eq!(session.current_profile().unwrap().username, "jan");

    session.logout().await;
    session.logout().await;
    assert_eq!(session.current(), SessionState::Anonymous);
    assert!(!dir.path().join("kejmiltube_auth.json").exists());
    assert!(restored.current_user().await.unwrap().is_none());

    let logouts = fake.requests_to("POST", "/auth/v1/logout");
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].authorization.as_deref(), Some("Bearer token-1"));
}

#[tokio::test]
async fn test_comment_counters_patch() {
    let (addr, fake) = spawn_fake().await;
    let backend = supabase(addr);

    backend.update_comment_counters("c1", 3, 1).await.unwrap();

    let patches = fake.requests_to("PATCH", "/rest/v1/comments");
    assert!(patches[0].query.contains("id=eq.c1"));
    assert_eq!(patches[0].body, json!({ "likes": 3, "dislikes": 1 }));
}
