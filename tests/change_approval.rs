//! Role-gated change approval through the admin API.

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

async fn submit(addr: std::net::SocketAddr, actor: &str, change: Value) -> reqwest::Response {
    common::client()
        .post(format!("http://{}/admin/changes", addr))
        .bearer_auth(common::ADMIN_KEY)
        .header("x-actor-id", actor)
        .json(&change)
        .send()
        .await
        .unwrap()
}

fn campaign_insert(id: &str) -> Value {
    json!({
        "table": "campaigns",
        "action": "insert",
        "new_data": { "id": id, "title": "Clean water" }
    })
}

#[tokio::test]
async fn test_routing_by_role() {
    let app = common::test_app(common::test_config());
    let (addr, shutdown) = common::spawn_server(app.state.clone()).await;

    // super_admin: applied, nothing queued
    let res = submit(addr, "root", campaign_insert("c1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "applied");
    assert!(app.state.tables.get("campaigns", "c1").is_some());
    assert!(app.state.changes.pending().await.unwrap().is_empty());

    // admin: queued, table untouched
    let res = submit(addr, "ops", campaign_insert("c2")).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["requested_by"], "ops");
    assert!(app.state.tables.get("campaigns", "c2").is_none());
    assert_eq!(app.state.changes.pending().await.unwrap().len(), 1);

    // user and unknown actors: refused, nothing recorded
    for actor in ["guest", "nobody"] {
        let res = submit(addr, actor, campaign_insert("c3")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
    assert!(app.state.tables.get("campaigns", "c3").is_none());
    assert_eq!(app.state.changes.pending().await.unwrap().len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_actor_header() {
    let app = common::test_app(common::test_config());
    let (addr, shutdown) = common::spawn_server(app.state.clone()).await;

    let res = common::client()
        .post(format!("http://{}/admin/changes", addr))
        .bearer_auth(common::ADMIN_KEY)
        .json(&campaign_insert("c1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    shutdown.trigger();
}

#[tokio::test]
async fn test_review_flow() {
    let app = common::test_app(common::test_config());
    let (addr, shutdown) = common::spawn_server(app.state.clone()).await;
    let client = common::client();

    let res = submit(addr, "ops", campaign_insert("c9")).await;
    let queued: Value = res.json().await.unwrap();
    let id = queued["id"].as_str().unwrap().to_string();

    let res = client
        .get(format!("http://{}/admin/changes", addr))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap();
    let listed: Vec<Value> = res.json().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    // An admin cannot approve their own queue.
    let res = client
        .post(format!("http://{}/admin/changes/{}/approve", addr, id))
        .bearer_auth(common::ADMIN_KEY)
        .header("x-actor-id", "ops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(app.state.tables.get("campaigns", "c9").is_none());

    let res = client
        .post(format!("http://{}/admin/changes/{}/approve?note=looks%20good", addr, id))
        .bearer_auth(common::ADMIN_KEY)
        .header("x-actor-id", "root")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let decided: Value = res.json().await.unwrap();
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["decision"]["reviewer"], "root");
    assert_eq!(decided["decision"]["note"], "looks good");
    assert!(app.state.tables.get("campaigns", "c9").is_some());

    let res = client
        .post(format!("http://{}/admin/changes/{}/reject", addr, id))
        .bearer_auth(common::ADMIN_KEY)
        .header("x-actor-id", "root")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!(
            "http://{}/admin/changes/{}/approve",
            addr,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::ADMIN_KEY)
        .header("x-actor-id", "root")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_approvals_apply_once() {
    let app = common::test_app(common::test_config());
    let (addr, shutdown) = common::spawn_server(app.state.clone()).await;

    let res = submit(addr, "ops", campaign_insert("c5")).await;
    let queued: Value = res.json().await.unwrap();
    let id = queued["id"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let url = format!("http://{}/admin/changes/{}/approve", addr, id);
        handles.push(tokio::spawn(async move {
            common::client()
                .post(url)
                .bearer_auth(common::ADMIN_KEY)
                .header("x-actor-id", "root")
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 5);
    assert_eq!(app.state.tables.row_count("campaigns"), 1);

    shutdown.trigger();
}
