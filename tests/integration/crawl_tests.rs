//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full run cycle end-to-end: CSV in, HTTP fetches, CSV and checkpoint out.

use crate::common::product_page;
use harvest::config::{parse_config, resolve_run_config, Config, FetchConfig, RunOverrides};
use harvest::crawler::{load_summary, FetchError, Fetcher, HttpFetcher, RunController, RunOptions, RunStatus};
use harvest::state::ItemState;
use harvest::storage::{JsonCheckpointStore, RunLock};
use harvest::{CrawlTarget, HarvestError};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// Mounts four product pages; `/p/2` always answers 500
async fn mount_shop(server: &MockServer) {
    for (id, name, price) in [(0, "Kettle", "12,900"), (1, "Pan", "8,500"), (3, "Pot", "21,000")] {
        Mock::given(method("GET"))
            .and(path(format!("/p/{}", id)))
            .respond_with(html(product_page(name, price)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/p/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

/// Writes the input CSV and a config pointing every path into `dir`
fn write_fixture(dir: &TempDir, base_url: &str) -> Config {
    let input = dir.path().join("urls.csv");
    let mut csv = String::from("prod_id,url\n");
    for id in 0..4 {
        csv.push_str(&format!("P{},{}/p/{}\n", id, base_url, id));
    }
    std::fs::write(&input, csv).unwrap();

    let toml = format!(
        r#"
[run]
batch-size = 2
max-attempts = 2

[input]
path = '{input}'
carry-columns = ["prod_id"]

[output]
path = '{output}'
checkpoint-path = '{checkpoint}'

[fetch]
timeout-secs = 5

[[field]]
name = "name"
kind = "text"
selectors = ["h1.name"]
required = true

[[field]]
name = "price"
kind = "number"
selectors = [".price strong"]
required = true
numeric = true
"#,
        input = input.display(),
        output = dir.path().join("products.csv").display(),
        checkpoint = dir.path().join("checkpoint.json").display(),
    );
    parse_config(&toml).unwrap()
}

fn controller(config: Config, options: RunOptions) -> RunController {
    controller_with(config, options, &RunOverrides::default())
}

fn controller_with(config: Config, options: RunOptions, overrides: &RunOverrides) -> RunController {
    let run = resolve_run_config(&config, overrides).unwrap();
    RunController::new(config, run)
        .unwrap()
        .with_config_hash("test-hash")
        .with_options(options)
}

fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_http_fetcher_classifies_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html(product_page("Kettle", "100")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/captcha"))
        .respond_with(html("<h1>Access Denied</h1>".to_string()))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    let fetch = |route: &str| {
        let target = CrawlTarget::new(0, format!("{}{}", server.uri(), route));
        let fetcher = &fetcher;
        async move { fetcher.fetch(&target).await }
    };

    let page = fetch("/ok").await.unwrap();
    assert_eq!(page.status, 200);
    assert!(page.body.contains("Kettle"));
    assert!(page.content_type.unwrap().contains("text/html"));

    assert!(matches!(
        fetch("/forbidden").await,
        Err(FetchError::Blocked { .. })
    ));
    assert_eq!(
        fetch("/missing").await.unwrap_err(),
        FetchError::Http { status: 404 }
    );
    assert!(matches!(
        fetch("/captcha").await,
        Err(FetchError::Blocked { .. })
    ));
}

#[tokio::test]
async fn test_full_run_writes_output_and_checkpoint() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    let outcome = controller(config, RunOptions::default()).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::CompleteWithSkipped);
    assert_eq!(outcome.exit_code(), 2);
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.counts.done, 3);
    assert_eq!(summary.counts.skipped, 1);
    assert_eq!(summary.output_rows, 3);

    // 3 good pages once, the failing page twice
    assert_eq!(request_count(&server).await, 5);

    let (header, rows) = read_output(&dir.path().join("products.csv"));
    assert_eq!(
        header,
        vec!["index", "url", "prod_id", "name", "price", "status", "extracted_at"]
    );
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "0");
    assert_eq!(rows[0][2], "P0");
    assert_eq!(rows[0][3], "Kettle");
    assert_eq!(rows[0][4], "12900");
    assert_eq!(rows[0][5], "valid");
    assert_eq!(rows[2][0], "3");

    let saved = JsonCheckpointStore::new(dir.path().join("checkpoint.json"))
        .peek()
        .unwrap()
        .unwrap();
    assert_eq!(saved.state(2), ItemState::Skipped);
    assert_eq!(saved.config_hash.as_deref(), Some("test-hash"));
    assert_eq!(saved.output_offset, 3);

    // The run lock is released
    assert!(!RunLock::lock_path(&dir.path().join("checkpoint.json")).exists());
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    controller(config.clone(), RunOptions::default())
        .run()
        .await
        .unwrap();
    let requests = request_count(&server).await;

    let outcome = controller(config, RunOptions::default()).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::CompleteWithSkipped);
    assert_eq!(request_count(&server).await, requests);
    let (_, rows) = read_output(&dir.path().join("products.csv"));
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_fresh_run_starts_over() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    controller(config.clone(), RunOptions::default())
        .run()
        .await
        .unwrap();
    let requests = request_count(&server).await;

    let options = RunOptions {
        fresh: true,
        ..RunOptions::default()
    };
    controller(config, options).run().await.unwrap();

    assert_eq!(request_count(&server).await, requests * 2);
    let (_, rows) = read_output(&dir.path().join("products.csv"));
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_active_lock_rejects_run() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    let held = RunLock::acquire(&dir.path().join("checkpoint.json")).unwrap();
    let result = controller(config.clone(), RunOptions::default()).run().await;
    assert!(matches!(result, Err(HarvestError::RunLocked { .. })));
    assert_eq!(request_count(&server).await, 0);

    // A lock left behind by a crashed run can be broken explicitly
    std::mem::forget(held);
    let options = RunOptions {
        break_lock: true,
        ..RunOptions::default()
    };
    assert!(controller(config, options).run().await.is_ok());
}

#[tokio::test]
async fn test_unwritable_output_aborts_with_checkpoint_report() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_fixture(&dir, &server.uri());
    config.output.path = dir.path().join("missing").join("products.csv");

    let result = controller(config, RunOptions::default()).run().await;

    match result {
        Err(HarvestError::Aborted {
            source,
            last_checkpoint,
        }) => {
            assert!(matches!(*source, HarvestError::Output(_)));
            assert!(last_checkpoint.starts_with("none"));
        }
        other => panic!("expected an aborted run, got {:?}", other.map(|o| o.status)),
    }

    // Only the first window was attempted
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_resume_with_different_input_is_rejected() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    controller(config.clone(), RunOptions::default())
        .run()
        .await
        .unwrap();
    let requests = request_count(&server).await;

    let saved = JsonCheckpointStore::new(dir.path().join("checkpoint.json"))
        .peek()
        .unwrap()
        .unwrap();
    let fingerprint = saved.input.unwrap();
    assert!(fingerprint.path.ends_with("urls.csv"));
    assert_eq!(fingerprint.sha256.len(), 64);

    let other = dir.path().join("other.csv");
    std::fs::write(
        &other,
        format!("prod_id,url\nQ0,{0}/p/3\nQ1,{0}/p/0\n", server.uri()),
    )
    .unwrap();
    let overrides = RunOverrides {
        input_path: Some(other.clone()),
        ..RunOverrides::default()
    };

    let result = controller_with(config.clone(), RunOptions::default(), &overrides)
        .run()
        .await;
    assert!(matches!(result, Err(HarvestError::InputMismatch { .. })));
    assert_eq!(request_count(&server).await, requests);
    assert!(!RunLock::lock_path(&dir.path().join("checkpoint.json")).exists());

    // Starting fresh adopts the new input
    let options = RunOptions {
        fresh: true,
        ..RunOptions::default()
    };
    let outcome = controller_with(config, options, &overrides)
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(request_count(&server).await, requests + 2);

    let (_, rows) = read_output(&dir.path().join("products.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], "Q0");
    assert_eq!(rows[0][3], "Pot");
}

#[tokio::test]
async fn test_moved_input_with_same_content_resumes() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    controller(config.clone(), RunOptions::default())
        .run()
        .await
        .unwrap();
    let requests = request_count(&server).await;

    let moved = dir.path().join("moved.csv");
    std::fs::copy(dir.path().join("urls.csv"), &moved).unwrap();
    let overrides = RunOverrides {
        input_path: Some(moved),
        ..RunOverrides::default()
    };

    let outcome = controller_with(config, RunOptions::default(), &overrides)
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::CompleteWithSkipped);
    assert_eq!(request_count(&server).await, requests);
}

#[tokio::test]
async fn test_stats_reads_saved_checkpoint() {
    let server = MockServer::start().await;
    mount_shop(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(&dir, &server.uri());

    assert!(load_summary(&dir.path().join("checkpoint.json"))
        .unwrap()
        .is_none());

    controller(config, RunOptions::default()).run().await.unwrap();

    let summary = load_summary(&dir.path().join("checkpoint.json"))
        .unwrap()
        .unwrap();
    assert_eq!((summary.start, summary.end), (0, 3));
    assert_eq!(summary.counts.done, 3);
    assert_eq!(summary.counts.skipped, 1);
}
