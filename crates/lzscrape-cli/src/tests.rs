use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lzscrape_core::{
    AppConfig, CategoryConfig, CategoryStatus, CountryConfig, CountryStatus, Environment,
    ProductRecord, WarehouseCredentials,
};
use lzscrape_store::{DuplicateGuard, MemoryWarehouse, Warehouse};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use super::*;
use crate::prompt::{AutoConfirm, Confirm};

// ---------------------------------------------------------------------------
// Fixtures shared with the module tests
// ---------------------------------------------------------------------------

pub(crate) fn app_config(root: &Path) -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "info".to_string(),
        key_path: root.join("key.json"),
        countries_path: root.join("countries.yaml"),
        categories_path: root.join("categories.yaml"),
        capture_dir: root.to_path_buf(),
        backup_dir: root.join("backup"),
        request_timeout_secs: 5,
        max_pages: 2,
        target_products_per_category: 50,
        min_products_per_category: 30,
        page_delay_ms: 0,
        category_delay_ms: 0,
        network_max_retries: 0,
        rate_limit_backoff_secs: 0,
        db_max_connections: 1,
        db_acquire_timeout_secs: 1,
    }
}

/// Thailand, Indonesia and Malaysia, each served under `{base}/{key}/catalog/`.
pub(crate) fn country_list(base: &str) -> Vec<CountryConfig> {
    [
        ("thailand", "Thailand", "lazada.co.th", "th", "THB"),
        ("indonesia", "Indonesia", "lazada.co.id", "id", "IDR"),
        ("malaysia", "Malaysia", "lazada.com.my", "ml", "MYR"),
    ]
    .into_iter()
    .map(|(key, name, domain, suffix, currency)| {
        serde_json::from_value(json!({
            "key": key,
            "name": name,
            "domain": domain,
            "capture_file": format!("curl_{suffix}.txt"),
            "url_template": format!(
                "{base}/{key}/catalog/?ajax=true&isFirstRequest={{first_request}}&page={{page}}&q={{query}}"
            ),
            "currency": currency,
            "mapping": {
                "items": "mods.listItems",
                "id": "itemId",
                "title": "name",
                "price": "price",
                "seller": "sellerName"
            }
        }))
        .unwrap()
    })
    .collect()
}

pub(crate) fn category_list(n: usize) -> Vec<CategoryConfig> {
    (0..n)
        .map(|i| CategoryConfig {
            name: format!("Category {i}"),
            query: format!("query {i}"),
        })
        .collect()
}

pub(crate) fn product(country: &str, category: &str, id: &str) -> ProductRecord {
    product_at(
        country,
        category,
        id,
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(),
    )
}

fn product_at(country: &str, category: &str, id: &str, at: DateTime<Utc>) -> ProductRecord {
    ProductRecord {
        item_id: id.to_string(),
        title: format!("Item {id}"),
        price: Decimal::new(1000, 2),
        currency: "THB".to_string(),
        category: category.to_string(),
        country: country.to_string(),
        seller: None,
        brand: None,
        original_price: None,
        discount_percent: None,
        price_display: None,
        rating: None,
        reviews: None,
        location: None,
        image_url: None,
        product_url: None,
        scraped_at: at,
    }
}

// ---------------------------------------------------------------------------
// CLI parsing
// ---------------------------------------------------------------------------

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["lzscrape"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_run_with_countries_and_yes() {
    let cli = Cli::try_parse_from([
        "lzscrape",
        "run",
        "--country",
        "thailand",
        "--country",
        "malaysia",
        "--yes",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run(RunArgs { ref countries, yes: true }))
            if countries == &["thailand".to_string(), "malaysia".to_string()]
    ));
}

#[test]
fn parses_verify_verbose() {
    let cli = Cli::try_parse_from(["lzscrape", "verify", "--verbose"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Verify { verbose: true })));

    let cli = Cli::try_parse_from(["lzscrape", "verify"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Verify { verbose: false })));
}

#[test]
fn exit_code_maps_zero_to_success() {
    assert_eq!(exit_code(0), ExitCode::SUCCESS);
    assert_eq!(exit_code(1), ExitCode::FAILURE);
}

// ---------------------------------------------------------------------------
// End-to-end runs against a mock site and the in-memory warehouse
// ---------------------------------------------------------------------------

const CAPTURE: &str = r"curl 'https://www.lazada.co.th/catalog/?ajax=true&page=1&q=x' \
  -H 'accept: application/json' \
  -H 'referer: https://www.lazada.co.th/' \
  -H 'user-agent: Mozilla/5.0 (Test)' \
  -b 'lzd_sid=sid123; _m_h5_tk=tk456' \
  --compressed";

struct Decline;

impl Confirm for Decline {
    fn confirm(&mut self, _question: &str) -> bool {
        false
    }
}

/// Fifty well-formed items whose ids are derived from the country and query.
fn listing_for(request: &Request) -> ResponseTemplate {
    let query = request
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    let country = request
        .url
        .path_segments()
        .and_then(|mut s| s.next())
        .unwrap_or_default()
        .to_string();
    let items: Vec<Value> = (0..50)
        .map(|i| {
            json!({
                "itemId": format!("{country}-{query}-{i}"),
                "name": format!("{query} item {i}"),
                "price": "129.00",
                "sellerName": "Shop"
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({"mods": {"listItems": items}}))
}

fn write_captures(dir: &Path, countries: &[CountryConfig]) {
    for c in countries {
        std::fs::write(c.capture_path(dir), CAPTURE).unwrap();
    }
}

fn setup(countries: Vec<CountryConfig>, categories: Vec<CategoryConfig>) -> Setup {
    Setup {
        credentials: WarehouseCredentials {
            account_type: Some("service_account".to_string()),
            project_id: Some("lzscrape-test".to_string()),
            client_email: None,
            database_url: "postgres://unused".to_string(),
            dataset: None,
        },
        countries,
        categories,
    }
}

fn backup_file(root: &Path, country: &str, category: &CategoryConfig) -> PathBuf {
    root.join("backup")
        .join(country)
        .join(Utc::now().date_naive().format("%Y-%m-%d").to_string())
        .join(format!("{}.csv", category.slug()))
}

#[tokio::test]
async fn three_countries_with_one_malformed_page_exits_zero() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries = country_list(&server.uri());
    let categories = category_list(22);
    write_captures(dir.path(), &countries);

    Mock::given(method("GET"))
        .and(path_regex("^/thailand/catalog/$"))
        .and(query_param("q", "query 7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mods": {"listItems": [{"itemId": "broken", "name": "No price here"}]}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .mount(&server)
        .await;

    let wh = Arc::new(MemoryWarehouse::new());
    let summary = execute_run(
        &config,
        &setup(countries, categories.clone()),
        wh.clone(),
        &mut AutoConfirm,
    )
    .await
    .unwrap();

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.countries.len(), 3);

    let thailand = &summary.countries[0];
    assert_eq!(thailand.status, CountryStatus::Completed);
    assert_eq!(thailand.succeeded_categories(), 21);
    assert!(matches!(
        thailand.categories[7].status,
        CategoryStatus::Failed { ref reason } if reason.contains("price")
    ));
    for other in &summary.countries[1..] {
        assert_eq!(other.succeeded_categories(), 22, "{}", other.key);
    }

    assert_eq!(summary.total_products(), (66 - 1) * 50);
    assert_eq!(wh.rows().len(), (66 - 1) * 50);
    assert!(backup_file(dir.path(), "malaysia", &categories[21]).exists());
    assert!(!backup_file(dir.path(), "thailand", &categories[7]).exists());
}

#[tokio::test]
async fn missing_credential_file_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    write_captures(dir.path(), &country_list(&server.uri()));

    let err = run_command(&config, &RunArgs::default())
        .await
        .expect_err("run must fail without key.json");
    let message = err.to_string();
    assert!(message.contains("key.json"), "got: {message}");
    assert!(message.contains("operator contact"), "got: {message}");
}

#[tokio::test]
async fn backup_failure_halts_run_without_upload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    std::fs::write(&config.backup_dir, "not a directory").unwrap();
    let countries = country_list(&server.uri());
    write_captures(dir.path(), &countries);

    let wh = Arc::new(MemoryWarehouse::new());
    let summary = execute_run(
        &config,
        &setup(countries, category_list(4)),
        wh.clone(),
        &mut AutoConfirm,
    )
    .await
    .unwrap();

    assert_ne!(summary.exit_code(), 0);
    assert!(summary.halted.is_some());
    assert_eq!(summary.countries.len(), 1);
    let thailand = &summary.countries[0];
    assert!(matches!(
        thailand.categories[0].status,
        CategoryStatus::Failed { .. }
    ));
    assert!(thailand.categories[1..]
        .iter()
        .all(|c| c.status == CategoryStatus::NotAttempted));
    assert_eq!(wh.upload_calls(), 0);
}

#[tokio::test]
async fn expired_session_stops_country_and_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/thailand/catalog/$"))
        .and(query_param("q", "query 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ret": ["FAIL_SYS_USER_VALIDATE::captcha"]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries = country_list(&server.uri());
    write_captures(dir.path(), &countries);

    let wh = Arc::new(MemoryWarehouse::new());
    let summary = execute_run(
        &config,
        &setup(countries, category_list(4)),
        wh.clone(),
        &mut AutoConfirm,
    )
    .await
    .unwrap();

    let thailand = &summary.countries[0];
    assert_eq!(
        thailand.status,
        CountryStatus::AuthExpired {
            category: "Category 1".to_string()
        }
    );
    assert_eq!(thailand.succeeded_categories(), 1);
    assert_eq!(thailand.attempted_categories(), 2);
    assert_eq!(thailand.categories.len(), 4);
    assert_eq!(summary.countries[1].succeeded_categories(), 4);
    assert_eq!(summary.countries[2].succeeded_categories(), 4);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn invalid_capture_skips_only_that_country() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries = country_list(&server.uri());
    write_captures(dir.path(), &countries);
    std::fs::write(
        countries[2].capture_path(dir.path()),
        "curl 'https://www.lazada.com.my/catalog/' -H 'user-agent: x' -H 'referer: y'",
    )
    .unwrap();

    let wh = Arc::new(MemoryWarehouse::new());
    let summary = execute_run(
        &config,
        &setup(countries, category_list(2)),
        wh.clone(),
        &mut AutoConfirm,
    )
    .await
    .unwrap();

    assert!(matches!(
        summary.countries[2].status,
        CountryStatus::InvalidCapture { .. }
    ));
    assert_eq!(summary.countries[0].succeeded_categories(), 2);
    assert_eq!(summary.countries[1].succeeded_categories(), 2);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn declined_same_day_gate_skips_country_and_keeps_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/indonesia/"))
        .respond_with(listing_for)
        .expect(0)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries = country_list(&server.uri());
    write_captures(dir.path(), &countries);

    let wh = Arc::new(MemoryWarehouse::new());
    let earlier = product_at("indonesia", "Category 0", "kept", Utc::now());
    wh.upsert(std::slice::from_ref(&earlier)).await.unwrap();

    let summary = execute_run(
        &config,
        &setup(countries, category_list(2)),
        wh.clone(),
        &mut Decline,
    )
    .await
    .unwrap();

    assert_eq!(summary.countries[1].status, CountryStatus::SkippedByOperator);
    assert_eq!(summary.countries[0].succeeded_categories(), 2);
    assert_eq!(summary.exit_code(), 0);
    let indonesian: Vec<_> = wh
        .rows()
        .into_iter()
        .filter(|r| r.country == "indonesia")
        .collect();
    assert_eq!(indonesian, vec![earlier]);
}

#[tokio::test]
async fn rerun_with_confirmation_overwrites_same_day_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(listing_for)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries: Vec<CountryConfig> = country_list(&server.uri()).into_iter().take(1).collect();
    write_captures(dir.path(), &countries);

    let wh = Arc::new(MemoryWarehouse::new());
    let setup = setup(countries, category_list(2));

    execute_run(&config, &setup, wh.clone(), &mut AutoConfirm)
        .await
        .unwrap();
    let summary = execute_run(&config, &setup, wh.clone(), &mut AutoConfirm)
        .await
        .unwrap();

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(wh.rows().len(), 100);
    let backup = std::fs::read_to_string(backup_file(dir.path(), "thailand", &setup.categories[0]))
        .unwrap();
    // One header plus fifty rows from each run.
    assert_eq!(backup.lines().count(), 101);
}

/// The same fifty listings regardless of query, as happens with overlapping
/// categories like shampoo and conditioner.
fn shared_listing(_request: &Request) -> ResponseTemplate {
    let items: Vec<Value> = (0..50)
        .map(|i| {
            json!({
                "itemId": format!("shared-{i}"),
                "name": "Hair item",
                "price": "99.00"
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({"mods": {"listItems": items}}))
}

#[tokio::test]
async fn overlapping_categories_each_keep_their_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(shared_listing)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries: Vec<CountryConfig> = country_list(&server.uri()).into_iter().take(1).collect();
    write_captures(dir.path(), &countries);

    let wh = Arc::new(MemoryWarehouse::new());
    let setup = setup(countries, category_list(2));
    let summary = execute_run(&config, &setup, wh.clone(), &mut AutoConfirm)
        .await
        .unwrap();
    assert_eq!(summary.countries[0].succeeded_categories(), 2);

    let today = Utc::now().date_naive();
    let counts = wh.category_counts("thailand", today).await.unwrap();
    assert_eq!(counts.get("Category 0"), Some(&50));
    assert_eq!(counts.get("Category 1"), Some(&50));

    let report = VerifyReport::collect(
        wh.as_ref(),
        &setup.countries,
        &setup.categories,
        &config,
        today,
        false,
    )
    .await;
    assert!(report.is_healthy(), "{}", report.render(true));
}

#[tokio::test]
async fn guard_follows_the_scrape_date_past_midnight() {
    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path());
    let countries = country_list("http://unused.invalid");
    let categories = category_list(1);
    let may_1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let may_2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    let after_midnight = Utc.with_ymd_and_hms(2024, 5, 2, 0, 5, 0).unwrap();

    let wh = Arc::new(MemoryWarehouse::new());
    wh.upsert(&[product_at("thailand", "Category 0", "x", after_midnight)])
        .await
        .unwrap();

    let client = CatalogClient::new(
        config.request_timeout_secs,
        RetryPolicy {
            network_max_retries: 0,
            rate_limit_backoff_secs: 0,
        },
    )
    .unwrap();
    let sink = PersistenceSink::new(BackupWriter::new(&config.backup_dir), wh.clone());
    let orchestrator = Orchestrator {
        config: &config,
        countries: &countries,
        categories: &categories,
        client: &client,
        sink: &sink,
    };

    let mut guard = DuplicateGuard::from_existing("thailand", may_1, HashSet::new());
    orchestrator.roll_guard(&mut guard, may_1).await;
    assert_eq!(guard.date(), may_1);

    orchestrator.roll_guard(&mut guard, may_2).await;
    assert_eq!(guard.date(), may_2);
    assert_eq!(guard.country(), "thailand");
    let prepared = guard.prepare(vec![product_at(
        "thailand",
        "Category 0",
        "x",
        after_midnight,
    )]);
    assert_eq!(prepared.replaced, 1);
}
