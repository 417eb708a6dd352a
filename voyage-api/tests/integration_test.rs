// HTTP-level tests: the full router driven with tower::ServiceExt::oneshot,
// backed by the in-memory store and the mock identity provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use voyage_api::middleware::auth::{decode_token, issue_session};
use voyage_api::{app, AppState, AuthConfig};
use voyage_core::identity::MockIdentityProvider;
use voyage_core::repository::UserRepository;
use voyage_core::{RepoResult, Role, User, UserPatch, WriteOutcome};
use voyage_store::{DocumentStore, MemoryStore, Repositories, TableNames};

// ============================================================================
// Harness
// ============================================================================

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    repos: Repositories,
    auth: AuthConfig,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestResponse {
    fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

fn auth_config(refresh_window: u64) -> AuthConfig {
    AuthConfig {
        secret: "integration-test-secret-0123456789abcdef".to_string(),
        expiration: 3600,
        refresh_window,
        cookie_name: "voyage.session-token".to_string(),
    }
}

struct Options {
    refresh_window: u64,
    self_verification: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            refresh_window: 3600,
            self_verification: true,
        }
    }
}

fn build(options: Options) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let repos = Repositories::new(store.clone(), &TableNames::default());
    let auth = auth_config(options.refresh_window);
    let provider = MockIdentityProvider::new("google")
        .with_profile("code-1", "Gina@Example.com", "Gina")
        .with_profile("code-2", "Gina@Example.com", "Gina Again")
        .with_profile("code-3", "gina@example.com", "Lower Gina");

    let state = AppState::new(repos.clone(), auth.clone(), Duration::from_secs(30))
        .with_identity(Arc::new(provider))
        .with_vendor_self_verification(options.self_verification);

    TestApp {
        router: app(state),
        store,
        repos,
        auth,
    }
}

impl TestApp {
    async fn call(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Account inserted straight into the store, with a signed token for it.
    async fn account(&self, email: &str, role: Role, verified: bool) -> (User, String) {
        let mut user = User::new(email, email.split('@').next().unwrap(), role);
        user.vendor_verified = verified;
        self.repos.users.create(&user).await.unwrap();
        let (_, token) = issue_session(&self.auth, &user).unwrap();
        (user, token)
    }

    async fn create_plan(&self, token: &str, name: &str, price: Value) -> Value {
        let resp = self
            .call(send(
                Method::POST,
                "/api/plans",
                Some(token),
                json!({ "name": name, "route": ["Delhi", "Agra"], "price": price }),
            ))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        resp.body["plan"].clone()
    }
}

fn send(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn signup_body(email: &str, name: &str) -> Value {
    json!({ "email": email, "password": "secret-pass", "name": name })
}

// ============================================================================
// Signup / Signin
// ============================================================================

#[tokio::test]
async fn test_signup_returns_user_without_password() {
    let t = build(Options::default());
    let resp = t
        .call(send(Method::POST, "/api/auth/signup", None, signup_body("new@example.com", "New")))
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["user"]["email"], "new@example.com");
    assert_eq!(resp.body["user"]["role"], "user");
    assert!(resp.body["user"].get("password").is_none());
    assert_eq!(resp.body["redirectUrl"], "/");
}

#[tokio::test]
async fn test_vendor_signup_starts_unverified() {
    let t = build(Options::default());
    let resp = t
        .call(send(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({
                "email": "agency@example.com",
                "password": "secret-pass",
                "name": "Agency",
                "accountType": "vendor",
                "organizationName": "Trails Co",
            }),
        ))
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["vendor"]["role"], "vendor");
    assert_eq!(resp.body["vendor"]["vendorVerified"], false);
    assert_eq!(resp.body["vendor"]["vendorInfo"]["organizationName"], "Trails Co");
    assert!(resp.body["vendor"].get("password").is_none());
    assert_eq!(resp.body["redirectUrl"], "/vendor/dashboard");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts_and_keeps_original() {
    let t = build(Options::default());
    let first = t
        .call(send(Method::POST, "/api/auth/signup", None, signup_body("dup@example.com", "Original")))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = t
        .call(send(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "dup@example.com", "password": "another-pass", "name": "Impostor" }),
        ))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let stored = t.repos.users.find_by_email("dup@example.com").await.unwrap().unwrap();
    assert_eq!(stored.name, "Original");
    assert_eq!(stored.user_id.to_string(), first.body["user"]["userId"]);

    // The original password still works; the second one never landed.
    let ok = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "dup@example.com", "password": "secret-pass" }),
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    let bad = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "dup@example.com", "password": "another-pass" }),
        ))
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_keeps_email_case_as_given() {
    let t = build(Options::default());
    let mixed = t
        .call(send(Method::POST, "/api/auth/signup", None, signup_body("Jane.Doe@Example.com", "Jane")))
        .await;
    assert_eq!(mixed.status, StatusCode::CREATED);
    assert_eq!(mixed.body["user"]["email"], "Jane.Doe@Example.com");

    let lower = t
        .call(send(Method::POST, "/api/auth/signup", None, signup_body("jane.doe@example.com", "Other")))
        .await;
    assert_eq!(lower.status, StatusCode::CREATED);

    let stored = t.repos.users.find_by_email("Jane.Doe@Example.com").await.unwrap().unwrap();
    assert_eq!(stored.email, "Jane.Doe@Example.com");
    assert_eq!(stored.name, "Jane");

    let wrong_case = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "JANE.DOE@EXAMPLE.COM", "password": "secret-pass" }),
        ))
        .await;
    assert_eq!(wrong_case.status, StatusCode::UNAUTHORIZED);
}

struct CountingUsers {
    inner: Arc<dyn UserRepository>,
    calls: AtomicUsize,
}

#[async_trait]
impl UserRepository for CountingUsers {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email).await
    }
    async fn create(&self, user: &User) -> RepoResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create(user).await
    }
    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        expected_role: Option<Role>,
    ) -> RepoResult<WriteOutcome<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(id, patch, expected_role).await
    }
    async fn list_pending_vendors(&self) -> RepoResult<Vec<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_pending_vendors().await
    }
}

#[tokio::test]
async fn test_signup_validation_happens_before_store() {
    let repos = Repositories::new(Arc::new(MemoryStore::new()), &TableNames::default());
    let counting = Arc::new(CountingUsers {
        inner: repos.users.clone(),
        calls: AtomicUsize::new(0),
    });
    let mut state = AppState::new(repos, auth_config(3600), Duration::from_secs(30));
    state.users = counting.clone();
    let router = app(state);

    let bad_bodies = [
        json!({ "email": "short@example.com", "password": "12345", "name": "S" }),
        json!({ "email": "not-an-email", "password": "secret-pass", "name": "S" }),
        json!({ "email": "a@b", "password": "secret-pass", "name": "S" }),
        json!({ "email": "x@example.com", "name": "S" }),
        json!({ "email": "x@example.com", "password": "secret-pass", "name": "   " }),
        json!({ "email": "x@example.com", "password": "secret-pass", "name": "S", "accountType": "admin" }),
    ];
    for body in bad_bodies {
        let resp = router
            .clone()
            .oneshot(send(Method::POST, "/api/auth/signup", None, body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", body);
    }

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = router.clone().oneshot(malformed).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_signups_have_one_winner() {
    let t = build(Options::default());

    let mut handles = Vec::new();
    for i in 0..8 {
        let router = t.router.clone();
        handles.push(tokio::spawn(async move {
            router
                .oneshot(send(
                    Method::POST,
                    "/api/auth/signup",
                    None,
                    signup_body("race@example.com", &format!("Racer {}", i)),
                ))
                .await
                .unwrap()
                .status()
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_signin_sets_session_and_rejects_bad_credentials() {
    let t = build(Options::default());
    t.call(send(Method::POST, "/api/auth/signup", None, signup_body("me@example.com", "Me")))
        .await;

    let ok = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "ME@example.com", "password": "secret-pass" }),
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(ok.cookies().iter().any(|c| c.starts_with("voyage.session-token=")));
    let token = ok.body["token"].as_str().unwrap();
    let claims = decode_token(&t.auth, token).unwrap();
    assert_eq!(claims.email, "me@example.com");
    assert_eq!(claims.role, Role::User);

    let unknown = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "ghost@example.com", "password": "secret-pass" }),
        ))
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["error"], "Invalid email or password");

    let missing = t
        .call(send(Method::POST, "/api/auth/signin", None, json!({ "email": "me@example.com" })))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_endpoint_reads_store() {
    let t = build(Options::default());
    let anonymous = t.call(get("/api/auth/session", None)).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert!(anonymous.body["user"].is_null());

    let (user, token) = t.account("s@example.com", Role::User, false).await;
    let resp = t.call(get("/api/auth/session", Some(&token))).await;
    assert_eq!(resp.body["user"]["id"], user.user_id.to_string());
    assert_eq!(resp.body["user"]["role"], "user");

    // Cookie works the same as the bearer header.
    let via_cookie = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, format!("voyage.session-token={}", token))
        .body(Body::empty())
        .unwrap();
    let resp = t.call(via_cookie).await;
    assert_eq!(resp.body["user"]["email"], "s@example.com");

    let out = t.call(send(Method::POST, "/api/auth/signout", Some(&token), json!({}))).await;
    assert!(out.cookies().iter().any(|c| c.contains("Max-Age=0")));
}

// ============================================================================
// Plans
// ============================================================================

#[tokio::test]
async fn test_plan_writes_require_verified_vendor() {
    let t = build(Options::default());
    let body = json!({ "name": "Tour", "route": "Goa", "price": 10 });

    let anonymous = t.call(send(Method::POST, "/api/plans", None, body.clone())).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let (_, user_token) = t.account("u@example.com", Role::User, false).await;
    let as_user = t.call(send(Method::POST, "/api/plans", Some(&user_token), body.clone())).await;
    assert_eq!(as_user.status, StatusCode::FORBIDDEN);

    let (_, pending_token) = t.account("p@example.com", Role::Vendor, false).await;
    let unverified = t
        .call(send(Method::POST, "/api/plans", Some(&pending_token), body.clone()))
        .await;
    assert_eq!(unverified.status, StatusCode::FORBIDDEN);

    let (_, vendor_token) = t.account("v@example.com", Role::Vendor, true).await;
    let missing = t
        .call(send(Method::POST, "/api/plans", Some(&vendor_token), json!({ "name": "Tour" })))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let created = t
        .call(send(
            Method::POST,
            "/api/plans",
            Some(&vendor_token),
            json!({ "name": "Tour", "route": "Goa", "price": "0" }),
        ))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["plan"]["route"], json!(["Goa"]));
    assert_eq!(created.body["plan"]["price"], 0.0);
    assert_eq!(created.body["plan"]["isActive"], true);
}

#[tokio::test]
async fn test_empty_update_leaves_plan_unchanged() {
    let t = build(Options::default());
    let (vendor, token) = t.account("v@example.com", Role::Vendor, true).await;
    let plan = t.create_plan(&token, "Tour", json!(100)).await;
    let uri = format!("/api/plans/{}", plan["planId"].as_str().unwrap());

    let resp = t.call(send(Method::PUT, &uri, Some(&token), json!({}))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["plan"], plan);

    // Identity fields in the body are ignored, not applied.
    let resp = t
        .call(send(
            Method::PUT,
            &uri,
            Some(&token),
            json!({ "vendorId": Uuid::new_v4(), "planId": Uuid::new_v4(), "role": "admin" }),
        ))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["plan"]["vendorId"], vendor.user_id.to_string());
    assert_eq!(resp.body["plan"]["updatedAt"], plan["updatedAt"]);

    let resp = t.call(send(Method::PUT, &uri, Some(&token), json!({ "price": 150 }))).await;
    assert_eq!(resp.body["plan"]["price"], 150.0);
    assert_eq!(resp.body["plan"]["createdAt"], plan["createdAt"]);
}

#[tokio::test]
async fn test_only_owner_or_admin_modifies_plan() {
    let t = build(Options::default());
    let (_, owner) = t.account("owner@example.com", Role::Vendor, true).await;
    let (_, rival) = t.account("rival@example.com", Role::Vendor, true).await;
    let (_, admin) = t.account("admin@example.com", Role::Admin, false).await;
    let plan = t.create_plan(&owner, "Tour", json!(100)).await;
    let uri = format!("/api/plans/{}", plan["planId"].as_str().unwrap());

    let resp = t.call(send(Method::PUT, &uri, Some(&rival), json!({ "price": 1 }))).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = t.call(send(Method::PUT, &uri, Some(&admin), json!({ "name": "Renamed" }))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["plan"]["name"], "Renamed");

    let missing = format!("/api/plans/{}", Uuid::new_v4());
    let resp = t.call(send(Method::PUT, &missing, Some(&owner), json!({ "price": 1 }))).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_delete_hides_plan_from_listing() {
    let t = build(Options::default());
    let (vendor, token) = t.account("v@example.com", Role::Vendor, true).await;
    let keep = t.create_plan(&token, "Kerala Backwaters", json!(38000)).await;
    let gone = t.create_plan(&token, "Golden Triangle", json!(45000)).await;

    // Populate the listing cache first.
    let before = t.call(get("/api/plans", None)).await;
    assert_eq!(before.body["count"], 2);

    let uri = format!("/api/plans/{}", gone["planId"].as_str().unwrap());
    let resp = t.call(send(Method::DELETE, &uri, Some(&token), json!({}))).await;
    assert_eq!(resp.status, StatusCode::OK);

    let after = t.call(get("/api/plans", None)).await;
    assert_eq!(after.body["count"], 1);
    assert_eq!(after.body["plans"][0]["planId"], keep["planId"]);

    let direct = t.call(get(&uri, None)).await;
    assert_eq!(direct.status, StatusCode::OK);
    assert_eq!(direct.body["plan"]["isActive"], false);

    // The owner still sees it in their own listing; the public does not.
    let vendor_uri = format!("/api/plans?vendorId={}", vendor.user_id);
    assert_eq!(t.call(get(&vendor_uri, Some(&token))).await.body["count"], 2);
    assert_eq!(t.call(get(&vendor_uri, None)).await.body["count"], 1);

    // Hard delete is admin-only.
    let hard = format!("{}?permanent=true", uri);
    let resp = t.call(send(Method::DELETE, &hard, Some(&token), json!({}))).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    let (_, admin) = t.account("admin@example.com", Role::Admin, false).await;
    let resp = t.call(send(Method::DELETE, &hard, Some(&admin), json!({}))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(t.call(get(&uri, None)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_search() {
    let t = build(Options::default());
    let (_, token) = t.account("v@example.com", Role::Vendor, true).await;
    t.create_plan(&token, "Golden Triangle", json!(45000)).await;
    t.create_plan(&token, "Himalayan Adventure", json!(65000)).await;

    let resp = t.call(get("/api/plans?q=himalayan", None)).await;
    assert_eq!(resp.body["count"], 1);
    assert_eq!(resp.body["plans"][0]["name"], "Himalayan Adventure");

    // Both routes pass through Agra.
    let resp = t.call(get("/api/plans?q=AGRA", None)).await;
    assert_eq!(resp.body["count"], 2);

    let resp = t.call(get("/api/plans/not-a-uuid", None)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
async fn test_booking_is_pending_and_unpriced() {
    let t = build(Options::default());
    let (_, vendor) = t.account("v@example.com", Role::Vendor, true).await;
    let plan = t.create_plan(&vendor, "Golden Triangle", json!(45000)).await;
    let (traveller, token) = t.account("t@example.com", Role::User, false).await;

    let resp = t
        .call(send(
            Method::POST,
            "/api/bookings",
            Some(&token),
            json!({ "planId": plan["planId"], "numPeople": "3" }),
        ))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["booking"]["paymentStatus"], "pending");
    assert_eq!(resp.body["booking"]["totalAmount"], 0.0);
    assert_eq!(resp.body["booking"]["numPeople"], 3);
    assert_eq!(resp.body["booking"]["userId"], traveller.user_id.to_string());

    let mine = t.call(get("/api/bookings", Some(&token))).await;
    assert_eq!(mine.body["bookings"].as_array().unwrap().len(), 1);

    let (_, other) = t.account("o@example.com", Role::User, false).await;
    let theirs = t.call(get("/api/bookings", Some(&other))).await;
    assert!(theirs.body["bookings"].as_array().unwrap().is_empty());

    let booking_uri = format!("/api/bookings/{}", resp.body["booking"]["bookingId"].as_str().unwrap());
    assert_eq!(t.call(get(&booking_uri, Some(&other))).await.status, StatusCode::FORBIDDEN);
    assert_eq!(t.call(get(&booking_uri, Some(&token))).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_booking_validation() {
    let t = build(Options::default());
    let (_, vendor) = t.account("v@example.com", Role::Vendor, true).await;
    let plan = t.create_plan(&vendor, "Tour", json!(100)).await;
    let (_, token) = t.account("t@example.com", Role::User, false).await;

    let anonymous = t
        .call(send(Method::POST, "/api/bookings", None, json!({ "planId": plan["planId"], "numPeople": 1 })))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let missing = t
        .call(send(Method::POST, "/api/bookings", Some(&token), json!({ "planId": plan["planId"] })))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let zero = t
        .call(send(Method::POST, "/api/bookings", Some(&token), json!({ "planId": plan["planId"], "numPeople": 0 })))
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let unknown = t
        .call(send(Method::POST, "/api/bookings", Some(&token), json!({ "planId": Uuid::new_v4(), "numPeople": 1 })))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let uri = format!("/api/plans/{}", plan["planId"].as_str().unwrap());
    t.call(send(Method::DELETE, &uri, Some(&vendor), json!({}))).await;
    let inactive = t
        .call(send(Method::POST, "/api/bookings", Some(&token), json!({ "planId": plan["planId"], "numPeople": 1 })))
        .await;
    assert_eq!(inactive.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_settles_booking() {
    let t = build(Options::default());
    let (_, vendor) = t.account("v@example.com", Role::Vendor, true).await;
    let plan = t.create_plan(&vendor, "Tour", json!(100)).await;
    let (_, token) = t.account("t@example.com", Role::User, false).await;
    let (_, admin) = t.account("admin@example.com", Role::Admin, false).await;

    let booking = t
        .call(send(Method::POST, "/api/bookings", Some(&token), json!({ "planId": plan["planId"], "numPeople": 2 })))
        .await
        .body["booking"]
        .clone();
    let uri = format!("/api/bookings/{}/status", booking["bookingId"].as_str().unwrap());

    let by_user = t
        .call(send(Method::PUT, &uri, Some(&token), json!({ "paymentStatus": "completed" })))
        .await;
    assert_eq!(by_user.status, StatusCode::FORBIDDEN);

    let bogus = t
        .call(send(Method::PUT, &uri, Some(&admin), json!({ "paymentStatus": "refunded" })))
        .await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);

    let settled = t
        .call(send(Method::PUT, &uri, Some(&admin), json!({ "paymentStatus": "completed" })))
        .await;
    assert_eq!(settled.status, StatusCode::OK);
    assert_eq!(settled.body["booking"]["paymentStatus"], "completed");
}

// ============================================================================
// Vendor verification
// ============================================================================

#[tokio::test]
async fn test_vendor_verify_permissions() {
    let t = build(Options::default());
    let (vendor, vendor_token) = t.account("v@example.com", Role::Vendor, false).await;
    let (user, user_token) = t.account("u@example.com", Role::User, false).await;
    let (_, admin_token) = t.account("admin@example.com", Role::Admin, false).await;
    let body = json!({ "userId": vendor.user_id });

    let anonymous = t.call(send(Method::POST, "/api/vendor/verify", None, body.clone())).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let stranger = t
        .call(send(Method::POST, "/api/vendor/verify", Some(&user_token), body.clone()))
        .await;
    assert_eq!(stranger.status, StatusCode::FORBIDDEN);

    let not_vendor = t
        .call(send(
            Method::POST,
            "/api/vendor/verify",
            Some(&admin_token),
            json!({ "userId": user.user_id }),
        ))
        .await;
    assert_eq!(not_vendor.status, StatusCode::BAD_REQUEST);

    let missing = t
        .call(send(
            Method::POST,
            "/api/vendor/verify",
            Some(&admin_token),
            json!({ "userId": Uuid::new_v4() }),
        ))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    // Self-service verification hands back a token that can create plans at once.
    let own = t
        .call(send(Method::POST, "/api/vendor/verify", Some(&vendor_token), body))
        .await;
    assert_eq!(own.status, StatusCode::OK);
    let fresh = own.headers["x-session-token"].to_str().unwrap().to_string();
    assert!(decode_token(&t.auth, &fresh).unwrap().vendor_verified);
    t.create_plan(&fresh, "Tour", json!(10)).await;
}

#[tokio::test]
async fn test_self_verification_can_be_disabled() {
    let t = build(Options {
        self_verification: false,
        ..Default::default()
    });
    let (vendor, vendor_token) = t.account("v@example.com", Role::Vendor, false).await;
    let (_, admin_token) = t.account("admin@example.com", Role::Admin, false).await;

    let own = t
        .call(send(
            Method::POST,
            "/api/vendor/verify",
            Some(&vendor_token),
            json!({ "userId": vendor.user_id }),
        ))
        .await;
    assert_eq!(own.status, StatusCode::FORBIDDEN);

    let pending = t.call(get("/api/admin/vendors/pending", Some(&admin_token))).await;
    assert_eq!(pending.body["count"], 1);

    let uri = format!("/api/admin/vendors/{}/approve", vendor.user_id);
    let approved = t.call(send(Method::POST, &uri, Some(&admin_token), json!({}))).await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.body["vendor"]["vendorVerified"], true);

    let pending = t.call(get("/api/admin/vendors/pending", Some(&admin_token))).await;
    assert_eq!(pending.body["count"], 0);
}

#[tokio::test]
async fn test_user_registers_as_vendor_once() {
    let t = build(Options::default());
    let (_, token) = t.account("u@example.com", Role::User, false).await;

    let missing = t.call(send(Method::POST, "/api/vendor/register", Some(&token), json!({}))).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let body = json!({ "organizationName": "Trails Co", "phoneNumber": "555-0100" });
    let resp = t.call(send(Method::POST, "/api/vendor/register", Some(&token), body.clone())).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["vendor"]["role"], "vendor");
    assert_eq!(resp.body["vendor"]["vendorVerified"], false);

    let again = t.call(send(Method::POST, "/api/vendor/register", Some(&token), body)).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn test_gate_redirects_and_api_errors() {
    let t = build(Options::default());
    let (_, user_token) = t.account("u@example.com", Role::User, false).await;
    let (_, vendor_token) = t.account("v@example.com", Role::Vendor, true).await;

    let resp = t.call(get("/vendor/dashboard", None)).await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.location(), "/auth/signin?callbackUrl=%2Fvendor%2Fdashboard");

    let resp = t.call(get("/vendor/dashboard", Some(&user_token))).await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.location(), "/");

    let resp = t.call(get("/admin", Some(&vendor_token))).await;
    assert_eq!(resp.location(), "/vendor/dashboard");

    let resp = t.call(get("/api/admin/vendors/pending", None)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    let resp = t.call(get("/api/admin/vendors/pending", Some(&vendor_token))).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Public pages pass straight through to the (absent) web bundle.
    for path in ["/", "/vendor", "/trips", "/market/plans", "/favicon.ico"] {
        let resp = t.call(get(path, None)).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{}", path);
    }
    // Allowed protected page, same story.
    let resp = t.call(get("/vendor/dashboard", Some(&vendor_token))).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Claims refresh
// ============================================================================

#[tokio::test]
async fn test_claims_refresh_picks_up_role_change() {
    let t = build(Options {
        refresh_window: 0,
        ..Default::default()
    });
    let (user, token) = t.account("grow@example.com", Role::User, false).await;

    let promote = UserPatch {
        role: Some(Role::Vendor),
        vendor_verified: Some(true),
        ..Default::default()
    };
    t.repos.users.update(user.user_id, &promote, None).await.unwrap();

    let resp = t.call(get("/vendor/dashboard", Some(&token))).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    let reissued = resp.headers["x-session-token"].to_str().unwrap();
    let claims = decode_token(&t.auth, reissued).unwrap();
    assert_eq!(claims.role, Role::Vendor);
    assert!(claims.vendor_verified);
}

#[tokio::test]
async fn test_role_change_waits_for_refresh_window() {
    let t = build(Options::default());
    let (user, token) = t.account("grow@example.com", Role::User, false).await;

    let promote = UserPatch {
        role: Some(Role::Vendor),
        ..Default::default()
    };
    t.repos.users.update(user.user_id, &promote, None).await.unwrap();

    // Token is younger than the window, so the old snapshot still applies.
    let resp = t.call(get("/vendor/dashboard", Some(&token))).await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert!(resp.headers.get("x-session-token").is_none());

    // An explicit refresh picks it up.
    let resp = t.call(send(Method::POST, "/api/auth/refresh", Some(&token), json!({}))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["user"]["role"], "vendor");
}

#[tokio::test]
async fn test_deleted_user_loses_session_on_refresh() {
    let t = build(Options {
        refresh_window: 0,
        ..Default::default()
    });
    let (user, token) = t.account("bye@example.com", Role::User, false).await;
    assert_eq!(t.call(get("/api/bookings", Some(&token))).await.status, StatusCode::OK);

    t.store.delete("Users", &user.user_id.to_string()).await.unwrap();

    assert_eq!(t.call(get("/api/bookings", Some(&token))).await.status, StatusCode::UNAUTHORIZED);
    let session = t.call(get("/api/auth/session", Some(&token))).await;
    assert!(session.body["user"].is_null());
}

// ============================================================================
// OAuth
// ============================================================================

async fn oauth_round_trip(t: &TestApp, code: &str, callback: &str) -> TestResponse {
    let start = t
        .call(get(&format!("/api/auth/signin/google?callbackUrl={}", callback), None))
        .await;
    assert_eq!(start.status, StatusCode::TEMPORARY_REDIRECT);

    let location = url::Url::parse(start.location()).unwrap();
    let state = location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let nonce_cookie = start
        .cookies()
        .into_iter()
        .find(|c| c.starts_with("voyage.session-token.oauth-nonce="))
        .unwrap();
    let nonce_pair = nonce_cookie.split(';').next().unwrap().to_string();

    let req = Request::builder()
        .uri(format!("/api/auth/callback/google?code={}&state={}", code, state))
        .header(header::COOKIE, nonce_pair)
        .body(Body::empty())
        .unwrap();
    t.call(req).await
}

#[tokio::test]
async fn test_oauth_first_login_provisions_one_user() {
    let t = build(Options::default());

    let first = oauth_round_trip(&t, "code-1", "/trips").await;
    assert_eq!(first.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(first.location(), "/trips");
    assert!(first.cookies().iter().any(|c| c.starts_with("voyage.session-token=")));

    let user = t.repos.users.find_by_email("Gina@Example.com").await.unwrap().unwrap();
    assert_eq!(user.role, Role::User);
    assert!(user.password.is_none());

    // Second login with a different code for the same email reuses the account.
    let second = oauth_round_trip(&t, "code-2", "https://evil.example/").await;
    assert_eq!(second.location(), "/");
    let again = t.repos.users.find_by_email("Gina@Example.com").await.unwrap().unwrap();
    assert_eq!(again.user_id, user.user_id);
    assert_eq!(again.name, "Gina");

    // OAuth-only accounts cannot use the password form.
    let resp = t
        .call(send(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "Gina@Example.com", "password": "whatever" }),
        ))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "This account uses OAuth. Please sign in with Google.");

    // An address differing only in case is a different account.
    let third = oauth_round_trip(&t, "code-3", "/").await;
    assert_eq!(third.status, StatusCode::TEMPORARY_REDIRECT);
    let lower = t.repos.users.find_by_email("gina@example.com").await.unwrap().unwrap();
    assert_ne!(lower.user_id, user.user_id);
    assert_eq!(lower.email, "gina@example.com");
}

#[tokio::test]
async fn test_oauth_rejects_forged_state_and_unknown_provider() {
    let t = build(Options::default());

    let no_cookie = t
        .call(get("/api/auth/callback/google?code=code-1&state=forged", None))
        .await;
    assert_eq!(no_cookie.status, StatusCode::BAD_REQUEST);

    let bad_code = oauth_round_trip(&t, "unknown-code", "/").await;
    assert_eq!(bad_code.status, StatusCode::UNAUTHORIZED);

    let unknown = t.call(get("/api/auth/signin/github", None)).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert!(t.repos.users.find_by_email("Gina@Example.com").await.unwrap().is_none());
}
