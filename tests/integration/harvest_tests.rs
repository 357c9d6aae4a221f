//! Integration tests for the harvest engine
//!
//! These tests use wiremock to stand in for the catalog API and write the
//! harvested files into temporary directories.

use challenge_harvester::config::{
    CatalogConfig, Config, HarvesterConfig, OutputConfig, ProbeFailurePolicy, RangeConfig,
    SubResourceLayout,
};
use challenge_harvester::harvester::{
    collect_pages, discover, fetch_sub_resources, harvest, run_harvest, HarvestContext,
};
use challenge_harvester::output::RoundStats;
use challenge_harvester::state::SubResourceTask;
use challenge_harvester::HarvestError;
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = "/v5/challenges";

/// Creates a test configuration pointed at the mock server
fn create_test_config(server: &MockServer, dir: &Path, since: &str, to: &str) -> Config {
    let mut catalog = CatalogConfig::new(server.uri());
    catalog.auth_token_env = None;
    catalog.request_timeout_secs = 5;

    Config {
        range: RangeConfig {
            since: since.to_string(),
            to: to.to_string(),
        },
        catalog,
        harvester: HarvesterConfig {
            with_sub_resources: true,
            batch_size: 10,
            batch_delay_ms: 50,
            max_rounds: 5,
            ..HarvesterConfig::default()
        },
        output: OutputConfig {
            directory: dir.to_path_buf(),
            ..OutputConfig::default()
        },
    }
}

fn page_body(year: i32, page: u32, counts: &[i64]) -> Value {
    Value::Array(
        counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                json!({
                    "id": format!("c-{}-{}-{}", year, page, i),
                    "legacyId": 30000 + (page as i64) * 100 + i as i64,
                    "numOfRegistrants": count,
                    "name": "Some challenge"
                })
            })
            .collect(),
    )
}

fn registrants(handles: &[&str]) -> Value {
    let list: Vec<Value> = handles.iter().map(|h| json!({ "handle": h })).collect();
    json!({ "result": { "content": { "registrants": list } } })
}

async fn mount_probe(server: &MockServer, pages: u32, total: u64) {
    Mock::given(method("HEAD"))
        .and(path(LISTING))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total", total.to_string().as_str())
                .insert_header("X-Total-Pages", pages.to_string().as_str()),
        )
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn requests_matching(server: &MockServer, f: impl Fn(&Url) -> bool) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| f(&r.url))
        .count()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).expect("output file missing")).unwrap()
}

#[tokio::test]
async fn test_page_retried_until_success() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_probe(&server, 3, 250).await;

    // Page 2 fails twice before the fallback mock serves it
    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    for page in 1..=3 {
        mount_page(&server, page, page_body(2021, page, &[0, 0])).await;
    }

    let config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();

    let plans = discover(&ctx, ctx.windows().unwrap()).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].total_pages, 3);

    let output = collect_pages(&ctx, &plans).await.unwrap();

    assert_eq!(output.stats.planned, 3);
    assert_eq!(output.stats.fetched, 3);
    assert_eq!(output.items_fetched, 6);
    assert!(output.stats.permanently_failed.is_empty());
    assert_eq!(
        output.stats.rounds,
        vec![
            RoundStats {
                round: 0,
                attempted: 3,
                failed: 1
            },
            RoundStats {
                round: 1,
                attempted: 1,
                failed: 1
            },
            RoundStats {
                round: 2,
                attempted: 1,
                failed: 0
            },
        ]
    );

    for page in 1..=3 {
        let file = dir.path().join(format!("2021_{}_challenge_lst.json", page));
        assert_eq!(read_json(&file), page_body(2021, page, &[0, 0]));
    }
    let page_files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(page_files, 3);
}

#[tokio::test]
async fn test_permanently_failing_page_is_bounded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_probe(&server, 2, 150).await;
    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, 2, page_body(2021, 2, &[0])).await;

    let mut config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    config.harvester.max_rounds = 3;
    let ctx = HarvestContext::new(config).unwrap();

    let report = harvest(&ctx).await.unwrap();

    assert_eq!(report.pages.fetched, 1);
    assert_eq!(report.pages.rounds.len(), 3);
    assert_eq!(report.pages.permanently_failed.len(), 1);
    assert_eq!(report.pages.permanently_failed[0].task, "year 2021 | page 1");
    assert_eq!(report.pages.permanently_failed[0].reason, "HTTP 503");
    assert!(!report.is_complete());
    assert!(!dir.path().join("2021_1_challenge_lst.json").exists());

    let page_one_requests = requests_matching(&server, |url| {
        url.query_pairs().any(|(k, v)| k == "page" && v == "1")
    })
    .await;
    assert_eq!(page_one_requests, 3);
}

#[tokio::test]
async fn test_failed_probe_skips_window() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("HEAD"))
        .and(path(LISTING))
        .and(query_param("endDateStart", "2020-11-01T00:00:00.000000Z"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_probe(&server, 1, 40).await;
    mount_page(&server, 1, page_body(2021, 1, &[0])).await;

    let config = create_test_config(&server, dir.path(), "2020-11-01", "2021-02-01");
    let ctx = HarvestContext::new(config).unwrap();

    let report = harvest(&ctx).await.unwrap();

    assert_eq!(report.windows.len(), 2);
    assert_eq!(report.windows[0].year, 2020);
    assert_eq!(report.windows[0].total_pages, 0);
    assert_eq!(report.windows[0].probe_error.as_deref(), Some("HTTP 500"));
    assert_eq!(report.windows[1].total_pages, 1);
    assert_eq!(report.pages.planned, 1);
    assert_eq!(report.pages.fetched, 1);
    assert_eq!(report.failed_probes(), 1);
    assert!(!report.is_complete());
    assert!(dir.path().join("2021_1_challenge_lst.json").exists());
    assert!(!dir.path().join("2020_1_challenge_lst.json").exists());
}

#[tokio::test]
async fn test_failed_probe_aborts_when_configured() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("HEAD"))
        .and(path(LISTING))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Total", "10"))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), "2021-01-01", "2021-12-31");
    config.harvester.on_probe_failure = ProbeFailurePolicy::Abort;
    let ctx = HarvestContext::new(config).unwrap();

    let result = harvest(&ctx).await;

    assert!(matches!(
        result,
        Err(HarvestError::ProbeFailed { year: 2021, .. })
    ));
    let page_requests = requests_matching(&server, |_| true).await;
    assert_eq!(page_requests, 1);
}

#[tokio::test]
async fn test_sub_resource_tasks_follow_counts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_probe(&server, 1, 4).await;
    let body = json!([
        {"id": "a", "legacyId": 1001, "numOfRegistrants": 3},
        {"id": "b", "legacyId": 1002, "numOfRegistrants": 0},
        {"id": "c", "numOfRegistrants": 2},
        {"id": "d", "legacyId": 1004}
    ]);
    mount_page(&server, 1, body).await;

    let config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();

    let plans = discover(&ctx, ctx.windows().unwrap()).await.unwrap();
    let output = collect_pages(&ctx, &plans).await.unwrap();

    let mut parents: Vec<&str> = output
        .sub_tasks
        .iter()
        .map(|t| t.parent_id.as_str())
        .collect();
    parents.sort();
    assert_eq!(parents, vec!["a", "c"]);
    assert_eq!(output.missing_legacy_id, vec![("c".to_string(), 2)]);

    let task_c = output.sub_tasks.iter().find(|t| t.parent_id == "c").unwrap();
    assert_eq!(task_c.url.path(), "/v4/challenges/c");
}

fn sub_task(server: &MockServer, legacy_id: i64) -> SubResourceTask {
    SubResourceTask {
        year: 2021,
        page: 1,
        parent_id: format!("p{}", legacy_id),
        legacy_id: Some(legacy_id),
        url: Url::parse(&format!("{}/v4/challenges/{}", server.uri(), legacy_id)).unwrap(),
    }
}

#[tokio::test]
async fn test_sub_resource_batches_then_single_retry_wave() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Task 15 sits in the second batch and fails on its first attempt only
    Mock::given(method("GET"))
        .and(path("/v4/challenges/15"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/challenges/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(registrants(&["tourist", "petr"])))
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();
    let tasks: Vec<SubResourceTask> = (1..=25).map(|id| sub_task(&server, id)).collect();

    let started = Instant::now();
    let stats = fetch_sub_resources(&ctx, tasks).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(stats.planned, 25);
    assert_eq!(stats.fetched, 25);
    assert_eq!(
        stats.rounds,
        vec![
            RoundStats {
                round: 0,
                attempted: 25,
                failed: 1
            },
            RoundStats {
                round: 1,
                attempted: 1,
                failed: 0
            },
        ]
    );
    // Two inter-batch pauses plus the pause before the retry wave
    assert!(elapsed >= Duration::from_millis(150), "{:?}", elapsed);

    let retried = read_json(&dir.path().join("2021_1_p15_registrants.json"));
    assert_eq!(retried, json!([{"handle": "tourist"}, {"handle": "petr"}]));
    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 25);
}

#[tokio::test]
async fn test_malformed_sub_resource_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v4/challenges/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"content": null}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/challenges/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(registrants(&["a"])))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    config.output.sub_resource_layout = SubResourceLayout::ByParent;
    let ctx = HarvestContext::new(config).unwrap();

    let stats = fetch_sub_resources(&ctx, vec![sub_task(&server, 7), sub_task(&server, 8)])
        .await
        .unwrap();

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.malformed.len(), 1);
    assert_eq!(stats.malformed[0].task, "challenge p7/7");
    assert_eq!(stats.rounds.len(), 1);
    assert!(dir.path().join("p8_registrants.json").exists());
    assert!(!dir.path().join("p7_registrants.json").exists());

    let requests = requests_matching(&server, |url| url.path() == "/v4/challenges/7").await;
    assert_eq!(requests, 1);
}

#[tokio::test]
async fn test_sub_resource_retries_are_bounded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v4/challenges/9"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    config.harvester.max_rounds = 2;
    config.harvester.batch_delay_ms = 10;
    let ctx = HarvestContext::new(config).unwrap();

    let stats = fetch_sub_resources(&ctx, vec![sub_task(&server, 9)])
        .await
        .unwrap();

    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.rounds.len(), 2);
    assert_eq!(stats.permanently_failed.len(), 1);
    assert_eq!(stats.permanently_failed[0].reason, "HTTP 429");
}

#[tokio::test]
async fn test_unwritable_output_aborts_stage() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output_dir = dir.path().join("out");

    mount_probe(&server, 1, 1).await;
    mount_page(&server, 1, page_body(2021, 1, &[0])).await;

    let config = create_test_config(&server, &output_dir, "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();
    std::fs::remove_dir_all(&output_dir).unwrap();

    let result = harvest(&ctx).await;

    assert!(matches!(result, Err(HarvestError::Write { .. })));
}

#[tokio::test]
async fn test_full_harvest_with_token_and_summary() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    std::env::set_var("HARVEST_IT_TOKEN", "it-secret");

    // Every mock requires the credential; an unauthenticated request gets a 404
    let auth = || header("authorization", "Bearer it-secret");
    Mock::given(method("HEAD"))
        .and(path(LISTING))
        .and(auth())
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total", "3")
                .insert_header("X-Total-Pages", "2"),
        )
        .mount(&server)
        .await;
    for (page, counts) in [(1, vec![2, 0]), (2, vec![1])] {
        Mock::given(method("GET"))
            .and(path(LISTING))
            .and(query_param("page", page.to_string().as_str()))
            .and(auth())
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2021, page, &counts)))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/challenges/\d+$"))
        .and(auth())
        .respond_with(ResponseTemplate::new(200).set_body_json(registrants(&["x"])))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    config.catalog.auth_token_env = Some("HARVEST_IT_TOKEN".to_string());

    let report = run_harvest(config, Some("hash-1".to_string())).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.pages.fetched, 2);
    assert_eq!(report.items_fetched, 3);
    let sub = report.sub_resources.as_ref().unwrap();
    assert_eq!(sub.planned, 2);
    assert_eq!(sub.fetched, 2);

    assert!(dir.path().join("2021_1_c-2021-1-0_registrants.json").exists());
    assert!(dir.path().join("2021_2_c-2021-2-0_registrants.json").exists());

    let summary = std::fs::read_to_string(dir.path().join("harvest_summary.md")).unwrap();
    assert!(summary.contains("- **Status**: complete"));
    assert!(summary.contains("- **Config Hash**: hash-1"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn test_page_with_undecodable_item_is_still_written() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_probe(&server, 1, 3).await;
    let body = json!([
        {"id": "a", "legacyId": 1001, "numOfRegistrants": 5},
        {"id": "b", "legacyId": 1002, "numOfRegistrants": null},
        {"id": "c", "legacyId": 1003, "numOfRegistrants": 1}
    ]);
    mount_page(&server, 1, body.clone()).await;

    let config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();

    let plans = discover(&ctx, ctx.windows().unwrap()).await.unwrap();
    let output = collect_pages(&ctx, &plans).await.unwrap();

    assert_eq!(output.stats.fetched, 1);
    assert!(output.stats.malformed.is_empty());
    assert_eq!(output.items_fetched, 3);
    assert_eq!(read_json(&dir.path().join("2021_1_challenge_lst.json")), body);

    let mut parents: Vec<&str> = output
        .sub_tasks
        .iter()
        .map(|t| t.parent_id.as_str())
        .collect();
    parents.sort();
    assert_eq!(parents, vec!["a", "c"]);

    assert_eq!(output.stats.invalid_records.len(), 1);
    assert_eq!(output.stats.invalid_records[0].task, "year 2021 | page 1");
    assert!(output.stats.invalid_records[0]
        .reason
        .starts_with("Record 1 in 'page' is invalid"));
}

#[tokio::test]
async fn test_registrant_list_with_unexpected_record_is_kept() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v4/challenges/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"content": {"registrants": [{"handle": "a"}, {"userId": 9}]}}
        })))
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    let ctx = HarvestContext::new(config).unwrap();

    let stats = fetch_sub_resources(&ctx, vec![sub_task(&server, 7)])
        .await
        .unwrap();

    assert_eq!(stats.fetched, 1);
    assert!(stats.malformed.is_empty());
    assert_eq!(stats.invalid_records.len(), 1);
    assert_eq!(stats.invalid_records[0].task, "challenge p7/7");

    let written = read_json(&dir.path().join("2021_1_p7_registrants.json"));
    assert_eq!(written, json!([{"handle": "a"}, {"userId": 9}]));
}

#[tokio::test]
async fn test_zero_max_rounds_still_runs_one_round() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_probe(&server, 2, 2).await;
    mount_page(&server, 1, page_body(2021, 1, &[0])).await;
    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/challenges/9"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), "2021-06-01", "2021-06-01");
    config.harvester.max_rounds = 0;
    let ctx = HarvestContext::new(config).unwrap();

    let plans = discover(&ctx, ctx.windows().unwrap()).await.unwrap();
    let output = collect_pages(&ctx, &plans).await.unwrap();

    assert_eq!(output.stats.planned, 2);
    assert_eq!(output.stats.rounds.len(), 1);
    assert_eq!(output.stats.fetched, 1);
    assert_eq!(output.stats.permanently_failed.len(), 1);
    assert_eq!(output.stats.permanently_failed[0].task, "year 2021 | page 2");
    assert_eq!(output.stats.permanently_failed[0].reason, "HTTP 503");

    let stats = fetch_sub_resources(&ctx, vec![sub_task(&server, 9)])
        .await
        .unwrap();
    assert_eq!(stats.rounds.len(), 1);
    assert_eq!(stats.permanently_failed.len(), 1);
}
