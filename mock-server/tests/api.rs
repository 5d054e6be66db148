use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, Echo, MockState, SESSION_COOKIE};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn authed(method: &str, uri: &str, key: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Splunk {key}"))
        .body(String::new())
        .unwrap()
}

async fn login(state: &MockState) -> String {
    let resp = app_with_state(state.clone())
        .oneshot(form_request(
            "/services/auth/login",
            "username=admin&password=changeme",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    body["sessionKey"].as_str().unwrap().to_string()
}

// --- login ---

#[tokio::test]
async fn login_returns_session_key() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;
    assert!(!key.is_empty());
    assert_eq!(state.session_count().await, 1);
}

#[tokio::test]
async fn login_with_cookie_sets_session_cookie() {
    let resp = app()
        .oneshot(form_request(
            "/services/auth/login",
            "username=admin&password=changeme&cookie=1",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
}

#[tokio::test]
async fn login_wrong_password_returns_401() {
    let resp = app()
        .oneshot(form_request(
            "/services/auth/login",
            "username=admin&password=nope",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["messages"][0]["text"], "Login failed");
}

#[tokio::test]
async fn login_missing_fields_is_rejected() {
    let resp = app()
        .oneshot(form_request("/services/auth/login", "username=admin"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- authentication ---

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/services/server/info")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_session_key_returns_401() {
    let resp = app()
        .oneshot(authed("GET", "/services/apps/local", "not-a-session"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;
    state.expire_sessions().await;

    let resp = app_with_state(state)
        .oneshot(authed("GET", "/services/server/info", &key))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- server info ---

#[tokio::test]
async fn server_info_reports_version() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;

    let resp = app_with_state(state)
        .oneshot(authed("GET", "/services/server/info", &key))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(
        body["entry"][0]["content"]["version"],
        mock_server::SERVER_VERSION
    );
}

// --- echo ---

#[tokio::test]
async fn namespaced_echo_reports_path_and_query() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;

    let resp = app_with_state(state)
        .oneshot(authed(
            "DELETE",
            "/servicesNS/nobody/search/saved/searches/foo?output_mode=json",
            &key,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "DELETE");
    assert_eq!(echo.path, "/servicesNS/nobody/search/saved/searches/foo");
    assert_eq!(
        echo.query,
        vec![("output_mode".to_string(), "json".to_string())]
    );
    assert!(echo.form.is_empty());
}

#[tokio::test]
async fn echo_accepts_session_cookie() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;

    let resp = app_with_state(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/services/saved/searches")
                .header(http::header::COOKIE, format!("{SESSION_COOKIE}={key}"))
                .header(
                    http::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body("name=errors&search=error".to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.path, "/services/saved/searches");
    assert_eq!(
        echo.form,
        vec![
            ("name".to_string(), "errors".to_string()),
            ("search".to_string(), "error".to_string()),
        ]
    );
}

#[tokio::test]
async fn quoted_session_cookie_is_accepted() {
    let state = MockState::with_user("admin", "changeme");
    let key = login(&state).await;

    let resp = app_with_state(state)
        .oneshot(
            Request::builder()
                .uri("/services/server/info")
                .header(http::header::COOKIE, format!("{SESSION_COOKIE}=\"{key}\""))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- full session lifecycle ---

#[tokio::test]
async fn session_lifecycle() {
    use tower::Service;

    let state = MockState::with_user("admin", "changeme");
    let mut app = app_with_state(state.clone()).into_service();

    // login
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "/services/auth/login",
            "username=admin&password=changeme",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    let key = body["sessionKey"].as_str().unwrap().to_string();

    // authenticated request
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(authed("GET", "/services/apps/local", &key))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // session expires server-side
    state.expire_sessions().await;
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(authed("GET", "/services/apps/local", &key))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_bytes(resp).await;
    assert!(!body.is_empty());
}
