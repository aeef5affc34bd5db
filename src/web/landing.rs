use std::borrow::Cow;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    availability::MonitorState,
    session::{AuthOutcome, CookieTokenStorage, RedirectQuery, RedirectResult, SessionStore},
    web::{
        AppState, escape_html,
        flash::{self, Notification},
        templates::{PageLayout, render_page},
        upload_ui::{UPLOAD_WIDGET_SCRIPT, UPLOAD_WIDGET_STYLES, UploadWidgetConfig, render_upload_widget},
        uploads::RECEIPT_FIELD,
    },
};

const PAGE_STYLES: &str = r#"
.status-bar { display: flex; flex-direction: column; gap: 0.5rem; }
.status-line { display: flex; justify-content: space-between; align-items: center; gap: 1rem; }
.status-pill { display: inline-flex; padding: 0.25rem 0.75rem; border-radius: 999px; font-size: 0.85rem; font-weight: 600; background: #fef3c7; color: #92400e; }
.status-pill[data-state="awake"] { background: #dcfce7; color: #166534; }
.status-pill[data-state="timed_out"] { background: #fee2e2; color: #b91c1c; }
.status-progress { height: 6px; border-radius: 999px; background: #e2e8f0; overflow: hidden; }
.status-progress span { display: block; height: 100%; width: 0; background: #2563eb; transition: width 0.4s ease; }
.toggle-row { display: flex; align-items: center; margin: 1rem 0; }
.hint { color: #92400e; font-size: 0.9rem; margin: -0.5rem 0 1rem; }
.toasts { display: flex; flex-direction: column; gap: 0.5rem; margin-bottom: 1rem; }
.items-table { width: 100%; border-collapse: collapse; }
.items-table th, .items-table td { padding: 0.6rem 0.8rem; border-bottom: 1px solid #e2e8f0; text-align: left; }
.items-table th { background: #f1f5f9; }
.raw-result { background: #f1f5f9; padding: 1rem; border-radius: 8px; overflow-x: auto; white-space: pre-wrap; }
"#;

const PAGE_SCRIPT: &str = r#"<script>
(function() {
    const root = document.querySelector('[data-workspace]');
    if (!root) {
        return;
    }
    const workspace = root.dataset.workspace;
    const authenticated = root.dataset.authenticated === 'true';
    const submit = document.getElementById('process-receipt');
    const notionToggle = document.getElementById('upload-to-notion');
    const notionHint = document.getElementById('notion-hint');
    const resultPanel = document.getElementById('result-panel');
    const resultBody = document.getElementById('result-body');
    const toasts = document.getElementById('toasts');
    const pill = document.getElementById('backend-state');
    const progress = document.getElementById('backend-progress');
    const retry = document.getElementById('backend-retry');
    const labels = { idle: 'Waiting', probing: 'Waking up the server…', awake: 'Server is awake', timed_out: 'Server unreachable' };

    let hasImage = false;
    let inFlight = false;
    let backendState = 'idle';
    let pollTimer = null;

    function toast(level, message) {
        const el = document.createElement('div');
        el.className = `flash ${level}`;
        el.textContent = message;
        toasts.appendChild(el);
        setTimeout(() => el.remove(), 8000);
    }

    function serverReady() {
        return backendState === 'awake';
    }

    function canSubmit() {
        return hasImage && !inFlight && serverReady();
    }

    function refreshControls() {
        submit.disabled = !canSubmit();
        if (inFlight) {
            submit.textContent = 'Processing…';
        } else {
            submit.textContent = serverReady() ? 'Process Receipt' : 'Waiting for server…';
        }
        if (notionHint) {
            notionHint.hidden = authenticated || !notionToggle.checked;
        }
    }

    function applyStatus(snapshot) {
        backendState = snapshot.state;
        pill.dataset.state = snapshot.state;
        pill.textContent = labels[snapshot.state] || snapshot.state;
        progress.style.width = `${Math.round(snapshot.progress * 100)}%`;
        retry.hidden = snapshot.state !== 'timed_out';
        refreshControls();
        if (snapshot.state === 'probing') {
            schedulePoll();
        } else if (snapshot.state === 'timed_out') {
            toast('error', 'The receipt server did not wake up. Try again in a moment.');
        }
    }

    function schedulePoll() {
        clearTimeout(pollTimer);
        pollTimer = setTimeout(pollStatus, 2000);
    }

    async function pollStatus() {
        try {
            const response = await fetch('/api/backend/status');
            applyStatus(await response.json());
        } catch (err) {
            schedulePoll();
        }
    }

    retry.addEventListener('click', async () => {
        const response = await fetch('/api/backend/probe', { method: 'POST' });
        applyStatus(await response.json());
    });

    document.addEventListener('receipt:image', (event) => {
        hasImage = event.detail.accepted;
        refreshControls();
    });

    notionToggle.addEventListener('change', refreshControls);

    submit.addEventListener('click', async () => {
        if (!canSubmit()) {
            return;
        }
        inFlight = true;
        refreshControls();
        const body = new URLSearchParams({ upload_to_notion: String(notionToggle.checked) });
        try {
            const response = await fetch(`/api/workspaces/${workspace}/receipts`, { method: 'POST', body });
            const payload = await response.json().catch(() => ({ message: 'Failed to process the receipt.' }));
            (payload.notifications || []).forEach(note => toast(note.level, note.message));
            if (payload.result_html) {
                resultBody.innerHTML = payload.result_html;
                resultPanel.hidden = false;
            } else if (!response.ok && payload.message) {
                toast('error', payload.message);
            }
        } catch (err) {
            toast('error', 'Could not reach the receipt service. Please try again later.');
        } finally {
            inFlight = false;
            refreshControls();
        }
    });

    window.addEventListener('pagehide', () => {
        clearTimeout(pollTimer);
        navigator.sendBeacon(`/api/workspaces/${workspace}/close`);
    });

    refreshControls();
    applyStatus(JSON.parse(root.dataset.backend));
})();
</script>"#;

pub async fn landing_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<RedirectQuery>,
) -> Response {
    let mut session = SessionStore::new(CookieTokenStorage::new(jar));
    let outcome = session.capture_from_redirect(RedirectResult::from_query(&query));

    if outcome.came_from_redirect() {
        // Scrub the redirect parameters so a reload cannot replay the outcome.
        let jar = session.into_storage().into_jar();
        let jar = match redirect_notification(&outcome) {
            Some(notification) => flash::push(jar, &notification),
            None => jar,
        };
        return (jar, Redirect::to("/")).into_response();
    }

    let authenticated = session.is_authenticated();
    let (jar, notification) = flash::take(session.into_storage().into_jar());

    state.monitor().start().await;
    let workspace = state.workspaces().open();

    let html = render_receipt_page(&ReceiptPage {
        workspace,
        authenticated,
        notion_auth_url: state.config().notion_auth_url.as_deref(),
        notification: notification.as_ref(),
        backend_json: serde_json::to_string(&state.monitor().snapshot())
            .unwrap_or_else(|_| r#"{"state":"idle","availability":"unknown","progress":0}"#.to_string()),
        backend_awake: state.monitor().state() == MonitorState::Awake,
        max_megabytes: state.config().intake.max_bytes / (1024 * 1024),
        max_dimension: state.config().intake.max_width,
    });

    (jar, Html(html)).into_response()
}

fn redirect_notification(outcome: &AuthOutcome) -> Option<Notification> {
    match outcome {
        AuthOutcome::Authenticated => Some(Notification::success("Successfully connected to Notion.")),
        AuthOutcome::MissingToken => Some(Notification::error(
            "Notion reported success but no token was received. Please try connecting again.",
        )),
        AuthOutcome::Failed { message, details } => {
            let text = match details.as_deref().filter(|details| !details.is_empty()) {
                Some(details) => format!("Authentication failed: {message} ({details})"),
                None => format!("Authentication failed: {message}"),
            };
            Some(Notification::error(text))
        }
        AuthOutcome::Restored | AuthOutcome::Anonymous => None,
    }
}

struct ReceiptPage<'a> {
    workspace: Uuid,
    authenticated: bool,
    notion_auth_url: Option<&'a str>,
    notification: Option<&'a Notification>,
    backend_json: String,
    backend_awake: bool,
    max_megabytes: u64,
    max_dimension: u32,
}

fn render_receipt_page(page: &ReceiptPage<'_>) -> String {
    let endpoint = format!("/api/workspaces/{}/images", page.workspace);
    let note = format!(
        "JPEG, PNG, WebP and similar formats, up to {} MB and {}×{} pixels.",
        page.max_megabytes, page.max_dimension, page.max_dimension
    );
    let widget = render_upload_widget(
        &UploadWidgetConfig::new("receipt-upload", "receipt-file", RECEIPT_FIELD, &endpoint, "Upload receipt image")
            .with_accept("image/*")
            .with_note(&note),
    );

    let flash_html = page
        .notification
        .map(|notification| {
            format!(
                r#"<div class="flash {class}">{message}</div>"#,
                class = notification.level.css_class(),
                message = escape_html(&notification.message),
            )
        })
        .unwrap_or_default();

    let header_actions = if page.authenticated {
        r#"<span class="note">Connected to Notion</span>
                <form method="post" action="/logout"><button type="submit" class="secondary">Disconnect</button></form>"#
            .to_string()
    } else if let Some(url) = page.notion_auth_url {
        format!(
            r#"<a class="button-link" href="{}">Connect Notion</a>"#,
            escape_html(url)
        )
    } else {
        r#"<span class="note">Notion not connected</span>"#.to_string()
    };

    let body = format!(
        r#"        <div id="toasts" class="toasts">{flash_html}</div>
        <section class="panel status-bar" data-workspace="{workspace}" data-authenticated="{authenticated}" data-backend="{backend}">
            <div class="status-line">
                <span>Receipt server</span>
                <span class="status-pill" id="backend-state">{initial_state}</span>
            </div>
            <div class="status-progress"><span id="backend-progress"></span></div>
            <button type="button" id="backend-retry" class="secondary" hidden>Try again</button>
        </section>
        <section class="panel">
            {widget}
            <div class="toggle-row">
                <input type="checkbox" id="upload-to-notion" checked>
                <label for="upload-to-notion">Upload to Notion</label>
            </div>
            <p class="hint" id="notion-hint" hidden>Notion is not connected: the receipt will be processed but nothing will be uploaded.</p>
            <button type="button" id="process-receipt" class="wide" disabled>Process Receipt</button>
        </section>
        <section class="panel" id="result-panel" hidden>
            <h2>Processed Items</h2>
            <div id="result-body"></div>
        </section>"#,
        workspace = page.workspace,
        authenticated = page.authenticated,
        backend = escape_html(&page.backend_json),
        initial_state = if page.backend_awake { "Server is awake" } else { "Checking server…" },
    );

    render_page(PageLayout {
        meta_title: "Receipt OCR",
        page_heading: "Receipt OCR and Notion Uploader",
        header_actions_html: Cow::Owned(header_actions),
        body_html: Cow::Owned(body),
        extra_style_blocks: vec![Cow::Borrowed(UPLOAD_WIDGET_STYLES), Cow::Borrowed(PAGE_STYLES)],
        body_scripts: vec![Cow::Borrowed(UPLOAD_WIDGET_SCRIPT), Cow::Borrowed(PAGE_SCRIPT)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::TOKEN_COOKIE,
        web::{flash::FLASH_COOKIE, testing::client_app},
    };
    use axum::http::header;
    use axum_extra::extract::cookie::Cookie;

    fn no_redirects() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("client")
    }

    fn set_cookies(response: &reqwest::Response) -> Vec<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .collect()
    }

    fn flash_from(cookies: &[Cookie<'static>]) -> Option<Notification> {
        let cookie = cookies.iter().find(|cookie| cookie.name() == FLASH_COOKIE)?;
        flash::take(CookieJar::new().add(cookie.clone())).1
    }

    #[tokio::test]
    async fn success_redirect_stores_token_and_scrubs_query() {
        let (url, _state) = client_app("http://127.0.0.1:9").await;

        let response = no_redirects()
            .get(format!("{url}/?auth=success&token=abc123"))
            .send()
            .await
            .expect("landing");

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let cookies = set_cookies(&response);
        let token = cookies
            .iter()
            .find(|cookie| cookie.name() == TOKEN_COOKIE)
            .expect("token cookie");
        assert_eq!(token.value(), "abc123");

        let notice = flash_from(&cookies).expect("flash");
        assert_eq!(notice.level, flash::NotificationLevel::Success);
    }

    #[tokio::test]
    async fn error_redirect_surfaces_message_without_storing_token() {
        let (url, _state) = client_app("http://127.0.0.1:9").await;

        let response = no_redirects()
            .get(format!("{url}/?auth=error&message=Denied"))
            .send()
            .await
            .expect("landing");

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let cookies = set_cookies(&response);
        assert!(cookies.iter().all(|cookie| cookie.name() != TOKEN_COOKIE));

        let notice = flash_from(&cookies).expect("flash");
        assert_eq!(notice.level, flash::NotificationLevel::Error);
        assert!(notice.message.contains("Denied"));
    }

    #[tokio::test]
    async fn plain_visit_renders_the_page_and_opens_a_workspace() {
        let (url, state) = client_app("http://127.0.0.1:9").await;

        let response = no_redirects().get(format!("{url}/")).send().await.expect("landing");

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.expect("body").contains("Process Receipt"));
        assert_eq!(state.workspaces().len(), 1);
        state.monitor().shutdown().await;
    }

    fn page(authenticated: bool, notification: Option<&Notification>) -> String {
        render_receipt_page(&ReceiptPage {
            workspace: Uuid::nil(),
            authenticated,
            notion_auth_url: Some("https://backend.example.com/notion_login"),
            notification,
            backend_json: r#"{"state":"probing"}"#.to_string(),
            backend_awake: false,
            max_megabytes: 10,
            max_dimension: 4000,
        })
    }

    #[test]
    fn submit_waits_for_an_awake_backend() {
        assert!(PAGE_SCRIPT.contains("return backendState === 'awake';"));
        assert!(PAGE_SCRIPT.contains("return hasImage && !inFlight && serverReady();"));
        assert!(PAGE_SCRIPT.contains("submit.disabled = !canSubmit();"));
        assert!(PAGE_SCRIPT.contains("if (!canSubmit()) {"));

        let html = page(false, None);
        assert!(html.contains(r#"<button type="button" id="process-receipt" class="wide" disabled>"#));
    }

    #[test]
    fn failed_redirect_message_is_surfaced() {
        let outcome = AuthOutcome::Failed {
            message: "Denied".into(),
            details: None,
        };
        let notification = redirect_notification(&outcome).expect("notification");
        assert!(notification.message.contains("Denied"));
        assert_eq!(notification.level, flash::NotificationLevel::Error);
    }

    #[test]
    fn restored_session_has_no_notification() {
        assert!(redirect_notification(&AuthOutcome::Restored).is_none());
        assert!(redirect_notification(&AuthOutcome::Anonymous).is_none());
    }

    #[test]
    fn anonymous_page_offers_connect_link() {
        let html = page(false, None);
        assert!(html.contains("Connect Notion"));
        assert!(html.contains(r#"data-workspace="00000000-0000-0000-0000-000000000000""#));
        assert!(html.contains("/api/workspaces/00000000-0000-0000-0000-000000000000/images"));
        assert!(html.contains(r#"data-backend="{&quot;state&quot;:&quot;probing&quot;}""#));
    }

    #[test]
    fn authenticated_page_offers_disconnect_and_shows_flash() {
        let notice = Notification::success("Successfully connected to Notion.");
        let html = page(true, Some(&notice));
        assert!(html.contains("Disconnect"));
        assert!(html.contains("flash success"));
        assert!(!html.contains("Connect Notion</a>"));
    }
}
