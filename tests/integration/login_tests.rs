//! Login handshake tests against a mock phpBB forum

use crate::support::{html, test_config, thread_row};
use forum_harvest::config::Credentials;
use forum_harvest::crawler::Harvester;
use forum_harvest::{AuthError, FetchError, HarvestError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_FORM: &str = r#"
    <form action="./ucp.php?mode=login" method="post" id="login">
        <input type="text" name="username"><input type="password" name="password">
        <input type="hidden" name="sid" value="s3ss10n">
        <input type="hidden" name="form_token" value="t0k3n">
    </form>"#;

fn credentials() -> Credentials {
    Credentials::new("anna", "sekret")
}

async fn mount_login_pages(server: &MockServer, login_page: &str) {
    Mock::given(method("GET"))
        .and(path("/forum/"))
        .respond_with(html("Strona główna"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forum/ucp.php"))
        .respond_with(html(login_page))
        .mount(server)
        .await;
}

async fn login(server: &MockServer, attempts: u32) -> Result<(), HarvestError> {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(server, dir.path());
    config.crawler.login_attempts = attempts;

    let harvester = Harvester::new(config).unwrap();
    harvester
        .login(&credentials(), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_login_carries_session_cookie() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .and(body_string_contains("username=anna"))
        .and(body_string_contains("password=sekret"))
        .and(body_string_contains("sid=s3ss10n"))
        .and(body_string_contains("form_token=t0k3n"))
        .and(body_string_contains("redirect=index.php"))
        .respond_with(
            html("Zalogowano. Wyloguj")
                .insert_header("set-cookie", "phpbb_sid=s3ss10n; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .and(header("cookie", "phpbb_sid=s3ss10n"))
        .respond_with(html(&thread_row("101", "XTB")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html("Musisz się zalogować, aby przeglądać to forum."))
        .mount(&server)
        .await;

    login(&server, 1).await.unwrap();
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html(r#"<div class="error">Podano nieprawidłowe hasło.</div>"#))
        .mount(&server)
        .await;

    let err = login(&server, 1).await.unwrap_err();
    match err {
        HarvestError::Auth(AuthError::Rejected(message)) => {
            assert!(message.contains("nieprawidłowe"))
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_form_missing() {
    let server = MockServer::start().await;
    mount_login_pages(&server, "<p>Konserwacja</p>").await;

    let err = login(&server, 1).await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Auth(AuthError::FormNotFound { .. })
    ));
}

#[tokio::test]
async fn test_login_still_required() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html("Musisz się zalogować"))
        .mount(&server)
        .await;

    let err = login(&server, 1).await.unwrap_err();
    assert!(matches!(err, HarvestError::Auth(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn test_login_access_denied() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = login(&server, 1).await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Auth(AuthError::AccessDenied { status: 403 })
    ));
}

#[tokio::test]
async fn test_login_post_server_error_is_fatal() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    // A publicly readable index must not hide the failed submission
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html(&thread_row("101", "XTB")))
        .mount(&server)
        .await;

    let err = login(&server, 1).await.unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Auth(AuthError::Fetch(FetchError::Status { status: 503, .. }))
    ));
}

#[tokio::test]
async fn test_login_post_server_error_is_retried() {
    let server = MockServer::start().await;
    mount_login_pages(&server, LOGIN_FORM).await;

    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("Wyloguj [ anna ]"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html(&thread_row("101", "XTB")))
        .mount(&server)
        .await;

    login(&server, 2).await.unwrap();
}

#[tokio::test]
async fn test_login_retried_after_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forum/"))
        .respond_with(html("Strona główna"))
        .mount(&server)
        .await;
    // First login page has no form, the second one does
    Mock::given(method("GET"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("<p>Przeciążenie</p>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/ucp.php"))
        .respond_with(html(LOGIN_FORM))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forum/ucp.php"))
        .respond_with(html("ok"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/viewforum.php"))
        .respond_with(html(&thread_row("101", "XTB")))
        .mount(&server)
        .await;

    login(&server, 2).await.unwrap();
}
