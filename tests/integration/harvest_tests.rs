//! End-to-end harvest runs against a mock forum
//!
//! These tests stand up a fake phpBB forum with wiremock and check what
//! lands in the archive and state files after one or more runs.

use crate::support::{
    html, mount_index, mount_thread_page, next_link, post, test_config, thread_row,
};
use chrono::{DateTime, TimeZone, Utc};
use forum_harvest::config::{Config, Credentials};
use forum_harvest::crawler::{harvest, Harvester, RunOutcome};
use forum_harvest::storage::{read_json, write_json_atomic};
use forum_harvest::{Archive, PostRecord, SyncMode, SyncState, ThreadRecord};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, day, hour, minute, 0).unwrap()
}

fn read_state(config: &Config) -> SyncState {
    read_json(Path::new(&config.output.state_path))
        .unwrap()
        .expect("state file written")
}

fn read_archive(config: &Config) -> Archive {
    read_json(Path::new(&config.output.archive_path))
        .unwrap()
        .expect("archive file written")
}

fn post_ids(thread: &ThreadRecord) -> Vec<&str> {
    thread.posts.iter().map(|p| p.post_id.as_str()).collect()
}

fn seed_state(config: &Config, watermark: DateTime<Utc>) {
    let state = SyncState {
        last_scrape_timestamp: watermark,
        is_initial_run: false,
    };
    write_json_atomic(Path::new(&config.output.state_path), &state).unwrap();
}

fn seed_archive(config: &Config, threads: Vec<ThreadRecord>) {
    let mut archive = Archive::empty("PortalAnaliz.pl");
    archive.threads = threads;
    write_json_atomic(Path::new(&config.output.archive_path), &archive).unwrap();
}

fn archived_thread_101() -> ThreadRecord {
    ThreadRecord {
        thread_id: "101".to_string(),
        thread_title: "XTB".to_string(),
        thread_url: "https://forum.example/viewtopic.php?t=101".to_string(),
        initial_post_author: "anna".to_string(),
        posts: vec![
            PostRecord::new("1", "anna", at(5, 14, 0), "pierwszy"),
            PostRecord::new("2", "bartek", at(5, 14, 30), "drugi"),
        ],
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/forum/"))
        .respond_with(html("Strona główna"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/ucp.php"))
        .respond_with(html(
            r#"<form id="login" method="post" action="./ucp.php?mode=login">
                <input type="hidden" name="sid" value="abc"></form>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("Wyloguj [ anna ]"))
        .expect(1)
        .mount(server)
        .await;
}

async fn run(config: Config, force_full: bool) -> forum_harvest::output::RunReport {
    Harvester::new(config)
        .unwrap()
        .run(force_full, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_initial_harvest_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    mount_login(&server).await;

    // Index: two pages, an excluded thread and a duplicate listing
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .and(query_param("start", "25"))
        .respond_with(html(&format!(
            "{}{}",
            thread_row("103", "PKN Orlen"),
            thread_row("101", "XTB - dyskusja")
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_index(
        &server,
        &[
            thread_row("101", "XTB - dyskusja"),
            thread_row("102", "KOMUNIKATY ADMINÓW, INFO O NOWYCH ANALIZACH"),
            next_link("./viewforum.php?f=3&start=25"),
        ],
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/forum/viewtopic.php"))
        .and(query_param("t", "102"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&server)
        .await;

    mount_thread_page(
        &server,
        "101",
        Some("15"),
        post("3", "celina", "06.08.2024 09:00", "trzeci"),
    )
    .await;
    mount_thread_page(
        &server,
        "101",
        None,
        format!(
            "{}{}{}",
            post("1", "anna", "05.08.2024 14:00", "pierwszy"),
            post("2", "bartek", "05 sierpnia 2024, 14:30", "drugi <blockquote>cytat</blockquote>"),
            next_link("./viewtopic.php?f=3&t=101&start=15")
        ),
    )
    .await;
    mount_thread_page(
        &server,
        "103",
        None,
        format!(
            "{}{}",
            post("7", "darek", "04.08.2024 10:00", "orlen"),
            post("8", "ewa", "wczoraj", "bez daty")
        ),
    )
    .await;

    let report = harvest(
        config.clone(),
        &Credentials::new("anna", "sekret"),
        false,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.mode, SyncMode::Initial);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.threads_discovered, 3);
    assert_eq!(report.threads_skipped, 1);
    assert!(report.threads_failed.is_empty());
    assert_eq!(report.threads_with_new_posts, 2);
    assert_eq!(report.new_posts, 4);
    assert_eq!(report.posts_appended, 4);
    assert_eq!(report.posts_skipped, 1);
    assert_eq!(report.watermark, at(6, 9, 0));

    let state = read_state(&config);
    assert!(!state.is_initial_run);
    assert_eq!(state.last_scrape_timestamp, at(6, 9, 0));

    let archive = read_archive(&config);
    assert_eq!(archive.source_forum, "PortalAnaliz.pl");
    assert!(archive.scraped_timestamp_utc.is_some());
    let ids: Vec<_> = archive.threads.iter().map(|t| t.thread_id.as_str()).collect();
    assert_eq!(ids, vec!["101", "103"]);

    let xtb = &archive.threads[0];
    assert_eq!(xtb.thread_title, "XTB - dyskusja");
    assert_eq!(xtb.initial_post_author, "anna");
    assert_eq!(post_ids(xtb), vec!["1", "2", "3"]);
    assert_eq!(xtb.posts[1].timestamp, at(5, 14, 30));
    assert_eq!(xtb.posts[1].content, "drugi");
}

#[tokio::test]
async fn test_incremental_run_appends_only_new_posts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    seed_state(&config, at(5, 14, 30));
    seed_archive(&config, vec![archived_thread_101()]);

    mount_index(
        &server,
        &[thread_row("101", "XTB"), thread_row("103", "PKN Orlen")],
    )
    .await;
    mount_thread_page(
        &server,
        "101",
        None,
        format!(
            "{}{}",
            post("2", "bartek", "05.08.2024 14:30", "drugi"),
            post("3", "celina", "05.08.2024 15:00", "trzeci")
        ),
    )
    .await;
    mount_thread_page(
        &server,
        "103",
        None,
        post("7", "darek", "04.08.2024 10:00", "stary"),
    )
    .await;

    let report = run(config.clone(), false).await;

    assert_eq!(report.mode, SyncMode::Incremental);
    assert_eq!(report.threads_with_new_posts, 1);
    assert_eq!(report.new_posts, 1);
    assert_eq!(report.posts_appended, 1);
    assert_eq!(report.previous_watermark, at(5, 14, 30));
    assert_eq!(report.watermark, at(5, 15, 0));

    let archive = read_archive(&config);
    assert_eq!(archive.threads.len(), 1);
    assert_eq!(post_ids(&archive.threads[0]), vec!["1", "2", "3"]);
    assert_eq!(read_state(&config).last_scrape_timestamp, at(5, 15, 0));
}

#[tokio::test]
async fn test_post_at_watermark_changes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    seed_state(&config, at(5, 14, 30));
    seed_archive(&config, vec![archived_thread_101()]);
    let before = std::fs::read_to_string(&config.output.archive_path).unwrap();

    mount_index(&server, &[thread_row("101", "XTB")]).await;
    mount_thread_page(
        &server,
        "101",
        None,
        post("9", "filip", "05.08.2024 14:30", "ta sama minuta"),
    )
    .await;

    let report = run(config.clone(), false).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.new_posts, 0);
    assert!(!report.archive_written);
    assert_eq!(
        std::fs::read_to_string(&config.output.archive_path).unwrap(),
        before
    );
    assert_eq!(read_state(&config).last_scrape_timestamp, at(5, 14, 30));
}

#[tokio::test]
async fn test_failed_thread_is_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    mount_index(
        &server,
        &[thread_row("101", "XTB"), thread_row("103", "PKN Orlen")],
    )
    .await;
    // One retry per request
    Mock::given(method("GET"))
        .and(path("/forum/viewtopic.php"))
        .and(query_param("t", "101"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_thread_page(
        &server,
        "103",
        None,
        post("7", "darek", "04.08.2024 10:00", "orlen"),
    )
    .await;

    let report = run(config.clone(), false).await;

    assert_eq!(report.outcome, RunOutcome::Incomplete);
    assert_eq!(report.threads_failed.len(), 1);
    assert_eq!(report.threads_failed[0].thread_id, "101");
    assert!(report.threads_failed[0].url.contains("t=101"));

    let archive = read_archive(&config);
    let ids: Vec<_> = archive.threads.iter().map(|t| t.thread_id.as_str()).collect();
    assert_eq!(ids, vec!["103"]);

    // The failed thread may hold posts older than 04.08, so the watermark stays
    let state = read_state(&config);
    assert!(!state.is_initial_run);
    assert_eq!(state.last_scrape_timestamp, SyncState::epoch());
}

#[tokio::test]
async fn test_index_failure_holds_watermark_until_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    seed_state(&config, at(1, 0, 0));

    // Second index page fails on the first run (request plus one retry)
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .and(query_param("start", "25"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .and(query_param("start", "25"))
        .respond_with(html(&thread_row("102", "CD Projekt")))
        .expect(1)
        .mount(&server)
        .await;
    mount_index(
        &server,
        &[
            thread_row("101", "XTB"),
            next_link("./viewforum.php?f=3&start=25"),
        ],
    )
    .await;
    mount_thread_page(
        &server,
        "101",
        None,
        post("1", "anna", "10.08.2024 10:00", "nowszy"),
    )
    .await;
    mount_thread_page(
        &server,
        "102",
        None,
        post("5", "bartek", "05.08.2024 12:00", "starszy"),
    )
    .await;

    let first = run(config.clone(), false).await;

    assert_eq!(first.outcome, RunOutcome::Incomplete);
    assert!(first.index_error.is_some());
    assert_eq!(first.threads_discovered, 1);
    assert_eq!(first.watermark, at(1, 0, 0));
    assert_eq!(read_state(&config).last_scrape_timestamp, at(1, 0, 0));

    let second = run(config.clone(), false).await;

    assert_eq!(second.outcome, RunOutcome::Completed);
    assert!(second.index_error.is_none());
    assert_eq!(second.new_posts, 2);
    assert_eq!(second.posts_appended, 1);
    assert_eq!(second.watermark, at(10, 10, 0));

    let archive = read_archive(&config);
    let ids: Vec<_> = archive.threads.iter().map(|t| t.thread_id.as_str()).collect();
    assert_eq!(ids, vec!["101", "102"]);
    assert_eq!(post_ids(&archive.threads[1]), vec!["5"]);
}

#[tokio::test]
async fn test_thread_limit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.forum.max_threads = Some(1);

    mount_index(
        &server,
        &[thread_row("101", "XTB"), thread_row("103", "PKN Orlen")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewtopic.php"))
        .and(query_param("t", "103"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&server)
        .await;
    mount_thread_page(
        &server,
        "101",
        None,
        post("1", "anna", "05.08.2024 14:00", "pierwszy"),
    )
    .await;

    let report = run(config, false).await;
    assert_eq!(report.threads_over_limit, 1);
    assert_eq!(report.threads_with_new_posts, 1);
}

#[tokio::test]
async fn test_forced_full_run_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    seed_state(&config, at(5, 14, 30));
    seed_archive(&config, vec![archived_thread_101()]);

    mount_index(&server, &[thread_row("101", "XTB")]).await;
    mount_thread_page(
        &server,
        "101",
        None,
        format!(
            "{}{}",
            post("1", "anna", "05.08.2024 14:00", "pierwszy"),
            post("2", "bartek", "05.08.2024 14:30", "drugi")
        ),
    )
    .await;

    let report = run(config.clone(), true).await;

    assert_eq!(report.mode, SyncMode::Initial);
    assert_eq!(report.new_posts, 2);
    assert_eq!(report.posts_appended, 0);
    assert_eq!(report.watermark, at(5, 14, 30));
    assert_eq!(post_ids(&read_archive(&config).threads[0]), vec!["1", "2"]);
}

#[tokio::test]
async fn test_cancelled_run_keeps_state() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    Mock::given(method("GET"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Harvester::new(config.clone())
        .unwrap()
        .run(false, &cancel)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(read_state(&config), SyncState::initial());
    assert!(!Path::new(&config.output.archive_path).exists());
}
