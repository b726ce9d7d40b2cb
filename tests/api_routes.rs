use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use merilearn_api::app::{app, AppState};
use merilearn_api::auth::{generate_jwt, Claims, Role};
use merilearn_api::config::AppConfig;
use merilearn_api::groups::{CourseId, StudentId};
use merilearn_api::testing::{seed_course, TestContext};

struct Harness {
    ctx: TestContext,
    router: Router,
    secret: String,
}

impl Harness {
    fn new() -> Self {
        let ctx = TestContext::new();
        let config = AppConfig::development();
        let secret = config.security.jwt_secret.clone();
        let router = app(AppState::new(config, ctx.service.clone()));
        Self { ctx, router, secret }
    }

    fn token(&self, user: i64, role: Role) -> String {
        let claims = Claims::new(StudentId(user), format!("user{}@example.com", user), role, 1);
        generate_jwt(&claims, &self.secret).unwrap()
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[tokio::test]
async fn root_and_health_are_public() {
    let h = Harness::new();

    let (status, body) = h.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["default_group_size"], 4);

    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn peer_group_routes_require_a_token() {
    let h = Harness::new();

    let (status, body) = h.call(Method::GET, "/api/peer-groups", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = h.call(Method::GET, "/api/peer-groups/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.call(Method::POST, "/api/root/peer-groups", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let h = Harness::new();
    let claims = Claims::new(StudentId(1), "x@example.com".to_string(), Role::Admin, 1);
    let forged = generate_jwt(&claims, "some-other-secret").unwrap();

    let (status, _) = h.call(Method::DELETE, "/api/root/peer-groups", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_refuse_students() {
    let h = Harness::new();
    let student = h.token(1, Role::Student);

    let (status, body) = h.call(Method::POST, "/api/root/peer-groups", Some(&student), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let instructor = h.token(2, Role::Instructor);
    let (status, _) = h.call(Method::DELETE, "/api/root/peer-groups", Some(&instructor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_forms_groups_and_students_see_them() {
    let h = Harness::new();
    seed_course(&h.ctx.store, CourseId(1), 1..10).await;
    let admin = h.token(900, Role::Admin);

    let (status, body) = h
        .call(Method::POST, "/api/root/peer-groups", Some(&admin), Some(json!({"course_id": 1, "group_size": 4})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let groups = body["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(body["data"]["courses"][0]["ungrouped"], 1);

    let member = groups[0]["member_ids"][1].as_i64().unwrap();
    let group_id = groups[0]["id"].as_i64().unwrap();
    let student = h.token(member, Role::Student);

    let (status, body) = h.call(Method::GET, "/api/peer-groups/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], group_id);
    assert_eq!(body["data"]["members"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["leader"]["id"], groups[0]["leader_id"]);
    assert!(body["data"]["leader"]["email"].as_str().unwrap().ends_with("@example.com"));

    let (status, body) = h.call(Method::GET, "/api/peer-groups?course_id=1", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = h
        .call(Method::GET, &format!("/api/peer-groups/{}", group_id), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], groups[0]["name"]);
}

#[tokio::test]
async fn empty_body_forms_with_defaults() {
    let h = Harness::new();
    seed_course(&h.ctx.store, CourseId(1), 1..4).await;
    let admin = h.token(900, Role::Admin);

    let (status, body) = h.call(Method::POST, "/api/root/peer-groups", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["group_size"], 4);
    assert!(body["data"]["groups"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["courses"][0]["status"], "insufficient_pool");
}

#[tokio::test]
async fn invalid_group_size_is_a_bad_request() {
    let h = Harness::new();
    let admin = h.token(900, Role::Admin);

    let (status, body) = h
        .call(Method::POST, "/api/root/peer-groups", Some(&admin), Some(json!({"group_size": 1})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = h
        .call(Method::POST, "/api/root/peer-groups", Some(&admin), Some(json!({"size": 4})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn student_without_group_gets_not_found() {
    let h = Harness::new();
    let student = h.token(77, Role::Student);

    let (status, body) = h.call(Method::GET, "/api/peer-groups/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = h.call(Method::DELETE, "/api/peer-groups/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.call(Method::GET, "/api/peer-groups/12345", Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn leaving_removes_only_the_caller() {
    let h = Harness::new();
    seed_course(&h.ctx.store, CourseId(1), 1..5).await;
    let result = h.ctx.service.form_groups(None, Some(4)).await.unwrap();
    let group = &result.groups[0];
    let leaver = h.token(group.member_ids[3].0, Role::Student);

    let (status, body) = h.call(Method::DELETE, "/api/peer-groups/me", Some(&leaver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remaining_members"], 3);
    assert_eq!(body["data"]["group_id"], group.id.0);

    let stayer = h.token(group.member_ids[0].0, Role::Student);
    let (status, body) = h.call(Method::GET, "/api/peer-groups/me", Some(&stayer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["members"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn admin_deletes_one_group_then_all() {
    let h = Harness::new();
    seed_course(&h.ctx.store, CourseId(1), 1..13).await;
    let result = h.ctx.service.form_groups(None, Some(4)).await.unwrap();
    let admin = h.token(900, Role::Admin);
    let first = result.groups[0].id.0;

    let (status, body) = h
        .call(Method::DELETE, &format!("/api/root/peer-groups/{}", first), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], first);

    let (status, _) = h
        .call(Method::DELETE, &format!("/api/root/peer-groups/{}", first), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.call(Method::DELETE, "/api/root/peer-groups", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 2);
    assert_eq!(h.ctx.store.group_count().await, 0);
}

#[tokio::test]
async fn listing_reports_the_page_it_served() {
    let h = Harness::new();
    seed_course(&h.ctx.store, CourseId(1), 1..13).await;
    let admin = h.token(900, Role::Admin);
    let (status, _) = h.call(Method::POST, "/api/root/peer-groups", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = h.call(Method::GET, "/api/peer-groups?limit=2&offset=1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["page"], json!({"count": 2, "limit": 2, "offset": 1}));

    let (_, body) = h.call(Method::GET, "/api/peer-groups?limit=-3", Some(&admin), None).await;
    assert_eq!(body["page"]["limit"], 0);
    assert!(body["data"].as_array().unwrap().is_empty());
}
