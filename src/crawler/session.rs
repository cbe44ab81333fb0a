//! Authenticated session
//!
//! Logs into a phpBB-style forum through its HTML login form. The cookies
//! set during the handshake live in the [`ForumClient`]'s cookie store and
//! authenticate every later request of the run.

use crate::config::{Credentials, ForumConfig};
use crate::crawler::fetcher::{require_success, FetchedPage, ForumClient};
use crate::{AuthError, ConfigError};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Markers of a page that still asks for a login
const LOGIN_REQUIRED_MARKERS: &[&str] = &["musisz się zalogować", "you must login"];

/// Absolute URLs derived from the forum configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumEndpoints {
    pub base: Url,
    pub login: Url,
    pub index: Url,
}

impl ForumEndpoints {
    pub fn from_config(forum: &ForumConfig) -> Result<Self, ConfigError> {
        let invalid = |what: &str, e: url::ParseError| {
            ConfigError::InvalidUrl(format!("Invalid {}: {}", what, e))
        };

        let base = Url::parse(&forum.base_url).map_err(|e| invalid("base_url", e))?;
        let login = base
            .join(&forum.login_path)
            .map_err(|e| invalid("login_path", e))?;
        let index = base
            .join(&forum.index_path)
            .map_err(|e| invalid("index_path", e))?;

        Ok(Self { base, login, index })
    }
}

/// The parts of a login form needed to submit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Where the form posts to
    pub action: Url,

    /// Hidden inputs in document order
    pub hidden_fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Builds the url-encoded body for the login POST
    ///
    /// Hidden fields override the fixed fields of the same name. A
    /// `redirect` field is added when the form does not carry one.
    pub fn submission(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("autologin", "on"),
            ("viewonline", "on"),
            ("login", "Zaloguj"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (name, value) in &self.hidden_fields {
            match fields.iter_mut().find(|(k, _)| k == name) {
                Some(existing) => existing.1 = value.clone(),
                None => fields.push((name.clone(), value.clone())),
            }
        }

        if !fields.iter().any(|(k, _)| k == "redirect") {
            fields.push(("redirect".to_string(), "index.php".to_string()));
        }

        fields
    }
}

/// Locates the login form of a page
///
/// `form#login` is preferred; otherwise the first POST form is used. A
/// missing or empty `action` means the form posts back to `page_url`.
pub fn parse_login_form(html: &str, page_url: &Url, base: &Url) -> Option<LoginForm> {
    let document = Html::parse_document(html);

    let form = ["form#login", "form[method=post]", "form[method=POST]"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())?;

    let hidden = Selector::parse("input[type=hidden]").ok()?;
    let hidden_fields = form
        .select(&hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    let action = form
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|action| !action.is_empty())
        .and_then(|action| base.join(action).ok())
        .unwrap_or_else(|| page_url.clone());

    Some(LoginForm {
        action,
        hidden_fields,
    })
}

/// Returns the text of the error box shown after a rejected login
pub fn login_error_message(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.error").ok()?;
    let error = document.select(&selector).next()?;

    let message = error
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(if message.is_empty() {
        "login form reported an error".to_string()
    } else {
        message
    })
}

/// What the thread index looks like after logging in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    /// Thread titles are visible
    Granted,

    /// The page still asks for a login
    LoginRequired,

    /// Non-success status
    Denied(u16),

    /// Neither thread titles nor a login prompt
    Unclear,
}

/// Classifies the index page fetched right after login
pub fn check_access(page: &FetchedPage) -> AccessCheck {
    if !page.is_success() {
        return AccessCheck::Denied(page.status);
    }

    let body = page.body.to_lowercase();
    if body.contains("topictitle") {
        AccessCheck::Granted
    } else if LOGIN_REQUIRED_MARKERS.iter().any(|m| body.contains(m)) {
        AccessCheck::LoginRequired
    } else {
        AccessCheck::Unclear
    }
}

/// Runs the login handshake once
///
/// A non-success answer to the credential POST fails the attempt even when
/// the index page is publicly readable.
pub async fn login(
    client: &ForumClient,
    endpoints: &ForumEndpoints,
    credentials: &Credentials,
    cancel: &CancellationToken,
) -> Result<(), AuthError> {
    debug!(url = %endpoints.base, "Establishing session");
    client.get_cancellable(&endpoints.base, cancel).await?;

    debug!(url = %endpoints.login, "Fetching login page");
    let login_page = client.get_cancellable(&endpoints.login, cancel).await?;

    let form = parse_login_form(&login_page.body, &login_page.url, &endpoints.base).ok_or_else(
        || AuthError::FormNotFound {
            url: login_page.url.to_string(),
        },
    )?;

    let fields = form.submission(credentials);
    debug!(
        url = %form.action,
        hidden = form.hidden_fields.len(),
        fields = fields.len(),
        "Submitting login form"
    );

    let response = client
        .post_form(&form.action, &fields, &endpoints.login)
        .await?;

    if let Some(message) = login_error_message(&response.body) {
        return Err(AuthError::Rejected(message));
    }
    require_success(response)?;

    let index = client.get_any_status(&endpoints.index).await?;
    match check_access(&index) {
        AccessCheck::Granted => {
            info!(user = %credentials.username, "Logged in");
            Ok(())
        }
        AccessCheck::LoginRequired => Err(AuthError::NotAuthenticated),
        AccessCheck::Denied(status) => Err(AuthError::AccessDenied { status }),
        AccessCheck::Unclear => {
            warn!(url = %index.url, "Cannot confirm login status, continuing");
            Ok(())
        }
    }
}

/// Runs the login handshake up to `attempts` times
///
/// Returns the last error when every attempt fails, or as soon as `cancel`
/// fires during a retry delay.
pub async fn login_with_retry(
    client: &ForumClient,
    endpoints: &ForumEndpoints,
    credentials: &Credentials,
    attempts: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), AuthError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match login(client, endpoints, credentials, cancel).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "Login failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(e),
                    _ = tokio::time::sleep(retry_delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
