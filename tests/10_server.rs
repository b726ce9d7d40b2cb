mod common;

use anyhow::Result;
use merilearn_api::auth::{generate_jwt, Claims, Role};
use merilearn_api::groups::StudentId;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn token(user: i64, role: Role) -> String {
    let claims = Claims::new(StudentId(user), format!("user{}@example.com", user), role, 1);
    generate_jwt(&claims, common::TEST_JWT_SECRET).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::ensure_server().await?;
    let body = reqwest::get(format!("{}/", server.base_url)).await?.json::<Value>().await?;

    assert_eq!(body["data"]["name"], "MeriLearn Peer Groups API");
    assert!(body["data"]["endpoints"]["peer_groups"].is_string());
    Ok(())
}

#[tokio::test]
async fn grouping_run_over_http() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/peer-groups", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Seeded students alternate between courses 2 and 1: five each.
    let res = client
        .post(format!("{}/api/root/peer-groups", server.base_url))
        .bearer_auth(token(1000, Role::Admin))
        .json(&json!({ "group_size": 4 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["groups"].as_array().map(Vec::len), Some(2));
    let eligible: u64 = body["data"]["courses"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|c| c["eligible"].as_u64())
        .sum();
    assert_eq!(eligible, u64::from(common::SEED_STUDENTS));

    let member = body["data"]["groups"][0]["member_ids"][0].as_i64().unwrap();
    let res = client
        .get(format!("{}/api/peer-groups/me", server.base_url))
        .bearer_auth(token(member, Role::Student))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let mine = res.json::<Value>().await?;
    assert_eq!(mine["data"]["members"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn server_exits_when_the_schema_cannot_be_ensured() -> Result<()> {
    // Nothing listens on this port, so schema setup fails.
    let db_port = portpicker::pick_unused_port().expect("free port");
    let api_port = portpicker::pick_unused_port().expect("free port");

    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_merilearn-api"))
        .env("MERILEARN_API_PORT", api_port.to_string())
        .env("MERILEARN_STORE", "postgres")
        .env("DATABASE_URL", format!("postgres://merilearn@127.0.0.1:{}/merilearn", db_port))
        .env("DATABASE_CONNECTION_TIMEOUT", "1")
        .env("APP_ENV", "development")
        .env("JWT_SECRET", common::TEST_JWT_SECRET)
        .env_remove("SMTP_HOST")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if std::time::Instant::now() > deadline {
            let _ = child.kill();
            break None;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    };

    let status = status.expect("server kept running without its schema");
    assert!(!status.success());
    Ok(())
}
