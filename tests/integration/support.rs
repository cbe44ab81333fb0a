//! Fake forum pages and test configuration

use forum_harvest::config::Config;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration pointing at the mock server with test-sized delays
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.forum.base_url = format!("{}/forum/", server.uri());
    config.crawler.delay_between_requests_sec = 0.01;
    config.crawler.page_delay_ms = 1;
    config.crawler.request_timeout_secs = 5;
    config.crawler.max_retries = 1;
    config.crawler.retry_backoff_ms = 1;
    config.crawler.login_attempts = 1;
    config.crawler.login_retry_delay_secs = 0;
    config.output.state_path = dir.join("state.json").display().to_string();
    config.output.archive_path = dir.join("scraped_data.json").display().to_string();
    config
}

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=UTF-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

/// An index row linking to a thread
pub fn thread_row(id: &str, title: &str) -> String {
    format!(
        r#"<li class="row"><dl><dt><a href="./viewtopic.php?f=3&amp;t={}" class="topictitle">{}</a></dt></dl></li>"#,
        id, title
    )
}

/// A phpBB post block
pub fn post(id: &str, author: &str, date: &str, content: &str) -> String {
    format!(
        r#"<div id="p{id}" class="post bg2">
            <div class="postbody">
                <p class="author">przez <strong>{author}</strong> &raquo; {date}</p>
                <div class="content">{content}</div>
            </div>
        </div>"#
    )
}

/// Pagination block with an arrow link to `href`
pub fn next_link(href: &str) -> String {
    format!(
        r#"<div class="pagination"><ul><li class="arrow next"><a href="{}">Następna</a></li></ul></div>"#,
        href
    )
}

/// Mounts a thread page; `start` selects a later page of the thread
pub async fn mount_thread_page(server: &MockServer, id: &str, start: Option<&str>, body: String) {
    let mock = Mock::given(method("GET"))
        .and(path("/forum/viewtopic.php"))
        .and(query_param("t", id));
    let mock = match start {
        Some(start) => mock.and(query_param("start", start)),
        None => mock,
    };
    mock.respond_with(html(&body)).mount(server).await;
}

/// Mounts the one-page thread index
pub async fn mount_index(server: &MockServer, rows: &[String]) {
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html(&rows.concat()))
        .mount(server)
        .await;
}
