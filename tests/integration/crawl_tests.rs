//! End-to-end crawl tests against mock sites and a mock render service

use serde_json::json;
use std::sync::Arc;
use url_scout::audit::HttpAuditor;
use url_scout::config::{AuditConfig, RenderConfig, RenderMode};
use url_scout::discovery::PageDiscovery;
use url_scout::render::{RemoteRenderer, StaticRenderer};
use url_scout::scheduler::Pipeline;
use url_scout::service::{CrawlRequest, ScoutService};
use url_scout::storage::{open_store, CrawlRunStatus, SqliteStore, UrlStore};
use url_scout::{traverse, DiscoveryType, TraversalLimits};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

/// Serves a three-level site: `/` links `/about` and `/contact`, `/about`
/// links `/team`, `/team` links `/hidden`
async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/about">About</a> <a href="/contact#form">Contact</a>
               <a href="https://elsewhere.test/">Partner</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(r#"<a href="/team">Team</a> <a href="/">Home</a>"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("<p>Write to us</p>"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/team"))
        .respond_with(html(r#"<a href="/hidden">Hidden</a>"#))
        .mount(server)
        .await;
}

fn static_renderer() -> Arc<dyn PageDiscovery> {
    let config = RenderConfig {
        mode: RenderMode::Static,
        request_timeout_secs: 5,
        ..RenderConfig::default()
    };
    Arc::new(StaticRenderer::new(&config).unwrap())
}

fn service_with(store: Arc<SqliteStore>, renderer: Arc<dyn PageDiscovery>) -> ScoutService {
    // No audit happens in these tests; the endpoint is never called
    let auditor = HttpAuditor::new(&AuditConfig {
        endpoint: "http://127.0.0.1:9/audit".to_string(),
        timeout_secs: 1,
    })
    .unwrap();
    let pipeline = Pipeline::new(store.clone(), renderer, Arc::new(auditor), 4);
    ScoutService::new(store, pipeline)
}

#[tokio::test]
async fn test_static_crawl_persists_site() {
    let site = MockServer::start().await;
    mount_site(&site).await;
    let base = format!("{}/", site.uri());

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(&dir.path().join("scout.db")).unwrap());
    let service = service_with(store.clone(), static_renderer());

    let mut request = CrawlRequest::new(base.clone(), TraversalLimits::new(2, 50));
    request.persist = true;
    request.source_type = Some("site_map".to_string());
    request.tags = Some("nightly".to_string());
    request.classify = true;

    let response = service.submit_crawl(&request).await.unwrap();

    let found: Vec<&str> = response.urls.iter().map(|u| u.url.as_str()).collect();
    assert_eq!(found[0], base);
    for expected in ["about", "contact", "team"] {
        let url = format!("{}{}", base, expected);
        assert!(found.contains(&url.as_str()), "{} not found", url);
    }
    // Beyond max depth, and off-origin
    assert!(!found.iter().any(|u| u.ends_with("/hidden")));
    assert!(!found.iter().any(|u| u.contains("elsewhere.test")));
    assert!(response.urls.iter().all(|u| u.depth <= 2));

    let team = response
        .urls
        .iter()
        .find(|u| u.url.ends_with("/team"))
        .unwrap();
    assert_eq!(team.depth, 2);
    assert_eq!(
        team.discovered_from.as_deref(),
        Some(format!("{}about", base).as_str())
    );

    assert_eq!(response.persisted, response.urls.len());
    let stored = store.urls_for_source_type("site_map").await.unwrap();
    assert_eq!(stored.len(), response.urls.len());
    assert!(stored.iter().all(|u| u.tags.as_deref() == Some("nightly")));

    let classification = response.classification.unwrap();
    assert_eq!(classification.total(), response.urls.len());
    assert!(classification.get("normal").contains(&base));

    let run = store.get_crawl_run(response.run_id.unwrap()).await.unwrap();
    assert_eq!(run.status, CrawlRunStatus::Completed);
    assert_eq!(run.total_urls, response.urls.len());
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_recrawl_keeps_first_seen() {
    let site = MockServer::start().await;
    mount_site(&site).await;
    let base = format!("{}/", site.uri());

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let service = service_with(store.clone(), static_renderer());

    let mut request = CrawlRequest::new(base.clone(), TraversalLimits::single_page());
    request.persist = true;
    request.source_type = Some("site_map".to_string());

    service.submit_crawl(&request).await.unwrap();
    let origin = site.uri();
    let about = format!("{}about", base);
    let first = store.get_url(&origin, &about).await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    request.tags = Some("second-pass".to_string());
    service.submit_crawl(&request).await.unwrap();

    let second = store.get_url(&origin, &about).await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.first_seen_at, first.first_seen_at);
    assert!(second.last_seen_at > first.last_seen_at);
    // Labels are kept from the first sighting
    assert_eq!(second.tags, None);
    assert_eq!(store.urls_for_source_type("site_map").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_remote_render_merges_channels() {
    let render = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_partial_json(json!({"url": "https://shop.test/"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "discovered_urls": {
                "interaction": ["/cart", "/about"],
                "dom": ["/about", "https://elsewhere.test/partner"],
                "spa_navigation": ["/app/dashboard"],
                "websocket": ["/ignored"]
            }
        })))
        .mount(&render)
        .await;
    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_partial_json(json!({"url": "https://shop.test/about"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "discovered_urls": {"dom": ["/about/team?utm_source=nav"]}
        })))
        .mount(&render)
        .await;

    let renderer = RemoteRenderer::new(&RenderConfig {
        service_url: render.uri(),
        request_timeout_secs: 5,
        ..RenderConfig::default()
    })
    .unwrap();

    let found = traverse(&renderer, "https://shop.test/", TraversalLimits::new(2, 10))
        .await
        .unwrap();

    assert_eq!(found["https://shop.test/about"].discovery_type, DiscoveryType::Dom);
    assert_eq!(
        found["https://shop.test/cart"].discovery_type,
        DiscoveryType::Interaction
    );
    assert_eq!(
        found["https://shop.test/app/dashboard"].discovery_type,
        DiscoveryType::Spa
    );
    assert_eq!(found["https://shop.test/about/team"].depth, 2);
    assert!(!found.contains_key("https://shop.test/ignored"));
    assert!(found.keys().all(|u| u.starts_with("https://shop.test/")));
}

#[tokio::test]
async fn test_render_service_down_keeps_root() {
    let render = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&render)
        .await;

    let renderer = RemoteRenderer::new(&RenderConfig {
        service_url: render.uri(),
        request_timeout_secs: 5,
        ..RenderConfig::default()
    })
    .unwrap();

    let found = traverse(&renderer, "https://shop.test/", TraversalLimits::new(3, 10))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found["https://shop.test/"].depth, 0);
}
