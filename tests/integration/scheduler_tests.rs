//! Scheduled execution against mock render and audit services

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url_scout::audit::HttpAuditor;
use url_scout::config::{AuditConfig, RenderConfig};
use url_scout::render::RemoteRenderer;
use url_scout::scheduler::{Pipeline, SchedulerSettings};
use url_scout::service::ScoutService;
use url_scout::storage::SqliteStore;
use url_scout::{NewTask, Scheduler};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    render: MockServer,
    audit: MockServer,
    service: ScoutService,
    scheduler: Scheduler,
}

/// Wires a service and scheduler to fresh render and audit mocks
///
/// The render mock reports the same anchors for every page.
async fn harness(audit_response: ResponseTemplate) -> Harness {
    let render = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "discovered_urls": {
                "dom": ["/pricing", "/privacy", "/static/app.js"],
                "js_runtime": ["/static/vendor.js"]
            }
        })))
        .mount(&render)
        .await;

    let audit = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audit"))
        .respond_with(audit_response)
        .mount(&audit)
        .await;

    let renderer = RemoteRenderer::new(&RenderConfig {
        service_url: render.uri(),
        request_timeout_secs: 5,
        ..RenderConfig::default()
    })
    .unwrap();
    let auditor = HttpAuditor::new(&AuditConfig {
        endpoint: format!("{}/audit", audit.uri()),
        timeout_secs: 5,
    })
    .unwrap();

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let pipeline = Pipeline::new(store.clone(), Arc::new(renderer), Arc::new(auditor), 4);
    let settings = SchedulerSettings {
        poll_interval: Duration::from_millis(20),
        error_backoff: Duration::from_millis(50),
        ..SchedulerSettings::default()
    };
    let scheduler = Scheduler::new(store.clone(), pipeline.clone(), settings);
    let service = ScoutService::new(store, pipeline).with_scheduler(scheduler.clone());

    Harness {
        render,
        audit,
        service,
        scheduler,
    }
}

fn privacy_task(name: &str) -> NewTask {
    let mut task = NewTask::new(name, "https://shop.test/", "key_page", 3600);
    task.depth = 2;
    task.strategy_type = "keyword".to_string();
    task.strategy_contents = "privacy".to_string();
    task
}

async fn audit_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_created_task_runs_and_records_counts() {
    let h = harness(
        ResponseTemplate::new(200).set_body_json(json!({"success_count": 3, "fail_count": 0})),
    )
    .await;

    let created = h.service.create_task(&privacy_task("shop")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.scheduler.wait_idle())
        .await
        .unwrap();

    let status = h.service.task_status(created.id).await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.success_counts, 3);
    assert_eq!(status.fail_counts, 0);
    assert!(status.last_execution_time.is_some());
    assert!(status.next_execution_time.unwrap() > status.last_execution_time.unwrap());

    let bodies = audit_bodies(&h.audit).await;
    assert_eq!(bodies.len(), 1);
    let mut urls: Vec<&str> = bodies[0]["urls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u.as_str().unwrap())
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://shop.test/",
            "https://shop.test/pricing",
            "https://shop.test/privacy"
        ]
    );
    assert_eq!(bodies[0]["depth"], 2);
    assert_eq!(bodies[0]["strategy_type"], "keyword");

    let stored = h.service.urls_for_source_type("key_page").await.unwrap();
    // Anchored scripts are stored but never audited; runtime-loaded ones
    // are not even stored
    assert!(stored.iter().any(|u| u.url.ends_with("/static/app.js")));
    assert!(!stored.iter().any(|u| u.url.ends_with("/static/vendor.js")));
    assert_eq!(h.render.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_audit_outage_counts_whole_batch_failed() {
    let h = harness(ResponseTemplate::new(502)).await;

    let created = h.service.create_task(&privacy_task("shop")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.scheduler.wait_idle())
        .await
        .unwrap();

    let task = h.service.get_task(created.id).await.unwrap();
    assert_eq!(task.success_counts, 0);
    assert_eq!(task.fail_counts, 3);
    assert!(task.next_execution_time.is_some());
}

#[tokio::test]
async fn test_poll_loop_runs_started_task_until_shutdown() {
    let h = harness(
        ResponseTemplate::new(200).set_body_json(json!({"success_count": 1, "fail_count": 2})),
    )
    .await;

    let created = h.service.create_task(&privacy_task("shop")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.scheduler.wait_idle())
        .await
        .unwrap();
    h.service.stop_task(created.id).await.unwrap();

    let poll_loop = tokio::spawn({
        let scheduler = h.scheduler.clone();
        async move { scheduler.run().await }
    });

    // Stopped and not yet due: the loop leaves it alone
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.service.get_task(created.id).await.unwrap().success_counts, 1);

    h.service.start_task(created.id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let task = h.service.get_task(created.id).await.unwrap();
            if task.success_counts == 2 {
                break task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    h.scheduler.shutdown(Duration::from_secs(1)).await;
    tokio::time::timeout(Duration::from_secs(1), poll_loop)
        .await
        .unwrap()
        .unwrap();

    let task = h.service.get_task(created.id).await.unwrap();
    assert_eq!(task.fail_counts, 4);
    assert!(h.scheduler.is_shutting_down());
    assert!(h.service.create_task(&privacy_task("late")).await.is_ok());
    assert_eq!(h.scheduler.running_count(), 0);
}
