use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use mingle_api::auth::OtpDelivery;
use mingle_api::{AppStateInner, router};
use mingle_db::Database;

/// Keeps the last code per email so tests can complete sign-up.
#[derive(Default)]
struct Outbox(Mutex<Vec<(String, String)>>);

impl Outbox {
    fn code_for(&self, email: &str) -> String {
        let sent = self.0.lock().unwrap();
        sent.iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
            .expect("no code sent")
    }
}

impl OtpDelivery for Outbox {
    fn deliver(&self, email: &str, code: &str) {
        self.0.lock().unwrap().push((email.to_string(), code.to_string()));
    }
}

struct TestApp {
    app: Router,
    outbox: Arc<Outbox>,
}

impl TestApp {
    fn new() -> Self {
        let outbox = Arc::new(Outbox::default());
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            token_ttl: chrono::Duration::days(1),
            otp_ttl: chrono::Duration::minutes(10),
            otp_delivery: outbox.clone(),
        });
        Self {
            app: router(state),
            outbox,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Sign up `name` and return (token, user id).
    async fn sign_up(&self, name: &str) -> (String, String) {
        let email = format!("{name}@example.com");
        let (status, _) = self
            .call(Method::POST, "/auth/otp", None, Some(json!({ "email": email })))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let code = self.outbox.code_for(&email);
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/verify",
                None,
                Some(json!({ "email": email, "code": code, "password": "hunter2hunter2", "username": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn befriend(&self, a: &(String, String), b: &(String, String)) {
        let (status, request) = self
            .call(
                Method::POST,
                "/friends/requests",
                Some(&a.0),
                Some(json!({ "receiver_id": b.1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/friends/requests/{}/accept", request["id"].as_str().unwrap());
        let (status, _) = self.call(Method::POST, &uri, Some(&b.0), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.call(Method::GET, "/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_up_login_and_restore() {
    let app = TestApp::new();
    let (token, id) = app.sign_up("ana").await;

    let (status, me) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id.as_str());
    assert_eq!(me["email"], "ana@example.com");
    assert!(me["anonymous_name"].as_str().unwrap().starts_with("Stranger-"));

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ANA@example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_online"], true);

    // Registered emails cannot ask for another sign-up code.
    let (status, _) = app
        .call(Method::POST, "/auth/otp", None, Some(json!({ "email": "ana@example.com" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_codes_are_counted() {
    let app = TestApp::new();
    app.call(Method::POST, "/auth/otp", None, Some(json!({ "email": "bo@example.com" })))
        .await;
    let good = app.outbox.code_for("bo@example.com");
    let bad = if good == "000000" { "000001" } else { "000000" };

    let verify = |code: &str| {
        json!({ "email": "bo@example.com", "code": code, "password": "hunter2hunter2", "username": "bo_b" })
    };
    for _ in 0..5 {
        let (status, body) = app.call(Method::POST, "/auth/verify", None, Some(verify(bad))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid code");
    }

    // Out of attempts: even the right code is refused now.
    let (status, body) = app.call(Method::POST, "/auth/verify", None, Some(verify(good.as_str()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "too many attempts, request a new code");
}

#[tokio::test]
async fn a_wrong_code_can_be_followed_by_the_right_one() {
    let app = TestApp::new();
    app.call(Method::POST, "/auth/otp", None, Some(json!({ "email": "di@example.com" })))
        .await;
    let good = app.outbox.code_for("di@example.com");
    let bad = if good == "000000" { "000001" } else { "000000" };

    let verify = |code: &str| {
        json!({ "email": "di@example.com", "code": code, "password": "hunter2hunter2", "username": "di_x" })
    };
    let (status, _) = app.call(Method::POST, "/auth/verify", None, Some(verify(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.call(Method::POST, "/auth/verify", None, Some(verify(good.as_str()))).await;
    assert_eq!(status, StatusCode::CREATED);

    // The password stored on acceptance is the one that signs in.
    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "di@example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn matching_with_nobody_online_is_a_soft_404() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("ana").await;

    let (status, body) = app
        .call(Method::POST, "/chat/match", Some(&token), Some(json!({ "interests": ["music"] })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no candidates available");

    let (_, history) = app.call(Method::GET, "/chat/history", Some(&token), None).await;
    assert_eq!(history, json!([]));

    // Interests were still saved, in vocabulary spelling.
    let (_, me) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(me["interests"], json!(["Music"]));
}

#[tokio::test]
async fn unknown_interests_are_rejected() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("ana").await;
    let (status, _) = app
        .call(Method::POST, "/chat/match", Some(&token), Some(json!({ "interests": ["Knitting"] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stranger_chat_lifecycle() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;

    let (status, session) = app
        .call(Method::POST, "/chat/match", Some(&ana.0), Some(json!({ "interests": [] })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["user1_id"], ana.1.as_str());
    assert_eq!(session["user2_id"], ben.1.as_str());
    assert_eq!(session["status"], "active");

    let sid = session["id"].as_str().unwrap();
    let messages = format!("/chat/sessions/{sid}/messages");

    let (status, _) = app
        .call(Method::POST, &messages, Some(&ben.0), Some(json!({ "content": "hi there" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, poll) = app.call(Method::GET, &messages, Some(&ana.0), None).await;
    assert_eq!(poll["status"], "active");
    let list = poll["messages"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["message_type"], "system");
    assert_eq!(list[0]["content"], "Chat started.");
    assert_eq!(list[1]["content"], "hi there");

    let (status, detail) = app
        .call(Method::GET, &format!("/chat/sessions/{sid}"), Some(&ana.0), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["stranger"]["id"], ben.1.as_str());
    assert_eq!(detail["is_friend"], false);

    let end = format!("/chat/sessions/{sid}/end");
    let (status, ended) = app.call(Method::POST, &end, Some(&ben.0), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["status"], "ended");
    assert!(ended["ended_at"].is_string());

    // Ending again changes nothing.
    let (status, _) = app.call(Method::POST, &end, Some(&ana.0), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, poll) = app.call(Method::GET, &messages, Some(&ana.0), None).await;
    assert_eq!(poll["status"], "ended");
    let list = poll["messages"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[2]["content"], "Chat ended");

    let (status, _) = app
        .call(Method::POST, &messages, Some(&ana.0), Some(json!({ "content": "still there?" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, history) = app.call(Method::GET, "/chat/history", Some(&ana.0), None).await;
    assert_eq!(history[0]["last_message"]["content"], "hi there");
}

#[tokio::test]
async fn outsiders_cannot_read_a_chat() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let _ben = app.sign_up("ben").await;
    let (_, session) = app
        .call(Method::POST, "/chat/match", Some(&ana.0), Some(json!({})))
        .await;
    let cy = app.sign_up("cyd").await;

    let uri = format!("/chat/sessions/{}/messages", session["id"].as_str().unwrap());
    let (status, _) = app.call(Method::GET, &uri, Some(&cy.0), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn friend_requests_and_direct_messages() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;

    // Not friends yet.
    let (status, _) = app
        .call(Method::POST, &format!("/dm/{}", ben.1), Some(&ana.0), Some(json!({ "content": "hey" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, request) = app
        .call(Method::POST, "/friends/requests", Some(&ana.0), Some(json!({ "receiver_id": ben.1 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");

    let (status, _) = app
        .call(Method::POST, "/friends/requests", Some(&ben.0), Some(json!({ "receiver_id": ana.1 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, pending) = app.call(Method::GET, "/friends/requests", Some(&ben.0), None).await;
    assert_eq!(pending["received"].as_array().unwrap().len(), 1);

    let rid = request["id"].as_str().unwrap();
    let (status, _) = app
        .call(Method::POST, &format!("/friends/requests/{rid}/accept"), Some(&ana.0), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, friendship) = app
        .call(Method::POST, &format!("/friends/requests/{rid}/accept"), Some(&ben.0), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (low, high) = if ana.1 < ben.1 { (&ana.1, &ben.1) } else { (&ben.1, &ana.1) };
    assert_eq!(friendship["user1_id"], low.as_str());
    assert_eq!(friendship["user2_id"], high.as_str());

    let (status, body) = app
        .call(Method::POST, &format!("/friends/requests/{rid}/reject"), Some(&ben.0), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "request is already accepted");

    let (_, ana_friends) = app.call(Method::GET, "/friends", Some(&ana.0), None).await;
    assert_eq!(ana_friends[0]["friend"]["id"], ben.1.as_str());

    let (status, _) = app
        .call(Method::POST, &format!("/dm/{}", ben.1), Some(&ana.0), Some(json!({ "content": "hey" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, count) = app
        .call(Method::GET, "/notifications/unread-count", Some(&ben.0), None)
        .await;
    // Friend request plus the message.
    assert_eq!(count["count"], 2);

    let (_, convo) = app.call(Method::GET, &format!("/dm/{}", ben.1), Some(&ana.0), None).await;
    assert_eq!(convo[0]["is_read"], false);

    // The receiver's poll marks what it returns as read.
    let (_, convo) = app.call(Method::GET, &format!("/dm/{}", ana.1), Some(&ben.0), None).await;
    assert_eq!(convo[0]["content"], "hey");
    assert_eq!(convo[0]["is_read"], true);

    let (status, _) = app.call(Method::POST, "/notifications/read", Some(&ben.0), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, count) = app
        .call(Method::GET, "/notifications/unread-count", Some(&ben.0), None)
        .await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn chatting_with_a_friend_reuses_the_open_session() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;
    let cy = app.sign_up("cyd").await;
    app.befriend(&ana, &ben).await;
    let (status, _) = app.call(Method::POST, "/auth/logout", Some(&ana.0), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let uri = format!("/friends/{}/chat", ben.1);
    let (status, first) = app.call(Method::POST, &uri, Some(&ana.0), None).await;
    assert_eq!(status, StatusCode::OK);

    // Opening a friend chat leaves presence alone.
    let (_, me) = app.call(Method::GET, "/auth/me", Some(&ana.0), None).await;
    assert_eq!(me["is_online"], false);
    let (_, again) = app
        .call(Method::POST, &format!("/friends/{}/chat", ana.1), Some(&ben.0), None)
        .await;
    assert_eq!(first["id"], again["id"]);

    let (status, _) = app
        .call(Method::POST, &format!("/friends/{}/chat", cy.1), Some(&ana.0), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn posts_likes_and_comments() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;

    let (status, post) = app
        .call(
            Method::POST,
            "/posts",
            Some(&ana.0),
            Some(json!({ "content": "  hello rust  ", "tags": ["rust", "rust", "axum"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["content"], "hello rust");
    assert_eq!(post["tags"], json!(["rust", "axum"]));

    let pid = post["id"].as_str().unwrap();
    let like = format!("/posts/{pid}/like");
    let (_, on) = app.call(Method::POST, &like, Some(&ben.0), None).await;
    assert_eq!(on["active"], true);
    let (_, detail) = app.call(Method::GET, &format!("/posts/{pid}"), Some(&ben.0), None).await;
    assert_eq!(detail["like_count"], 1);
    assert_eq!(detail["liked"], true);
    let (_, off) = app.call(Method::POST, &like, Some(&ben.0), None).await;
    assert_eq!(off["active"], false);
    let (_, detail) = app.call(Method::GET, &format!("/posts/{pid}"), Some(&ben.0), None).await;
    assert_eq!(detail["like_count"], 0);

    let comments = format!("/posts/{pid}/comments");
    let (status, _) = app
        .call(Method::POST, &comments, Some(&ben.0), Some(json!({ "content": "nice" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, list) = app.call(Method::GET, &comments, Some(&ana.0), None).await;
    assert_eq!(list[0]["author"]["username"], "ben");

    let (_, trending) = app.call(Method::GET, "/posts/trending-tags", Some(&ben.0), None).await;
    assert_eq!(trending[0]["count"], 1);

    let (_, feed) = app.call(Method::GET, "/posts?tag=axum", Some(&ben.0), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);

    let (_, found) = app.call(Method::GET, "/search?q=HELLO", Some(&ben.0), None).await;
    assert_eq!(found["posts"].as_array().unwrap().len(), 1);

    let (status, _) = app.call(Method::DELETE, &format!("/posts/{pid}"), Some(&ben.0), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(Method::DELETE, &format!("/posts/{pid}"), Some(&ana.0), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, &format!("/posts/{pid}"), Some(&ana.0), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn community_filters() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;

    let (status, open) = app
        .call(Method::POST, "/communities", Some(&ana.0), Some(json!({ "name": "Rustaceans" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(open["role"], "admin");
    assert_eq!(open["member_count"], 1);

    app.call(
        Method::POST,
        "/communities",
        Some(&ana.0),
        Some(json!({ "name": "Hidden", "is_private": true })),
    )
    .await;

    let (status, _) = app
        .call(Method::POST, "/communities", Some(&ben.0), Some(json!({ "name": "rustaceans" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, public) = app.call(Method::GET, "/communities?filter=public", Some(&ben.0), None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);

    let (_, mine) = app.call(Method::GET, "/communities?filter=my", Some(&ben.0), None).await;
    assert_eq!(mine, json!([]));

    let cid = open["id"].as_str().unwrap();
    let (_, joined) = app
        .call(Method::POST, &format!("/communities/{cid}/membership"), Some(&ben.0), None)
        .await;
    assert_eq!(joined["active"], true);
    let (_, mine) = app.call(Method::GET, "/communities?filter=my", Some(&ben.0), None).await;
    assert_eq!(mine[0]["role"], "member");

    let (status, _) = app
        .call(Method::POST, &format!("/communities/{cid}/membership"), Some(&ana.0), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn following_notifies() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;

    let (_, on) = app
        .call(Method::POST, &format!("/profiles/{}/follow", ben.1), Some(&ana.0), None)
        .await;
    assert_eq!(on["active"], true);

    let (_, view) = app.call(Method::GET, &format!("/profiles/{}", ben.1), Some(&ana.0), None).await;
    assert_eq!(view["follower_count"], 1);
    assert_eq!(view["is_following"], true);
    assert!(view["profile"].get("email").is_none());

    let (_, notes) = app.call(Method::GET, "/notifications", Some(&ben.0), None).await;
    assert_eq!(notes[0]["kind"], "follow");
    assert_eq!(notes[0]["message"], "ana started following you!");

    let (status, _) = app
        .call(Method::POST, &format!("/profiles/{}/follow", ana.1), Some(&ana.0), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn private_profiles_hide_their_posts_everywhere() {
    let app = TestApp::new();
    let ana = app.sign_up("ana").await;
    let ben = app.sign_up("ben").await;
    let cyd = app.sign_up("cyd").await;
    app.befriend(&ana, &ben).await;

    let (_, post) = app
        .call(Method::POST, "/posts", Some(&ana.0), Some(json!({ "content": "diary entry", "tags": ["life"] })))
        .await;
    let pid = post["id"].as_str().unwrap();
    let (status, _) = app
        .call(Method::PATCH, "/profiles/me", Some(&ana.0), Some(json!({ "is_public": false })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let detail = format!("/posts/{pid}");
    let (status, _) = app.call(Method::GET, &detail, Some(&cyd.0), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, feed) = app.call(Method::GET, "/posts", Some(&cyd.0), None).await;
    assert_eq!(feed, json!([]));
    let (_, found) = app.call(Method::GET, "/search?q=diary", Some(&cyd.0), None).await;
    assert_eq!(found["posts"], json!([]));
    let (status, _) = app
        .call(Method::GET, &format!("/profiles/{}/posts", ana.1), Some(&cyd.0), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::POST, &format!("/posts/{pid}/like"), Some(&cyd.0), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call(Method::GET, &format!("/posts/{pid}/comments"), Some(&cyd.0), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Friends still see everything.
    let (status, _) = app.call(Method::GET, &detail, Some(&ben.0), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, feed) = app.call(Method::GET, "/posts", Some(&ben.0), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
    let (_, found) = app.call(Method::GET, "/search?q=diary", Some(&ben.0), None).await;
    assert_eq!(found["posts"].as_array().unwrap().len(), 1);
}
