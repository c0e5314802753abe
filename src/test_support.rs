//! Helpers for driving the router in tests.

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use tower::ServiceExt;

use crate::auth::cookie::{get_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::state::AppState;

pub const BOUNDARY: &str = "vidtube-test-boundary";

pub fn test_app() -> Router {
    crate::app::build_app(AppState::fake())
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// One part of a multipart body: `(name, Some((filename, content_type)), bytes)`.
pub type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

pub fn multipart_request(method: &str, uri: &str, parts: &[Part<'_>], cookie: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, ct)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {ct}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body)).unwrap()
}

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

pub fn register_request(username: &str, email: &str, password: &str, with_avatar: bool) -> Request<Body> {
    let mut parts: Vec<Part<'_>> = vec![
        ("fullName", None, b"Alice Liddell".as_slice()),
        ("email", None, email.as_bytes()),
        ("username", None, username.as_bytes()),
        ("password", None, password.as_bytes()),
    ];
    if with_avatar {
        parts.push(("avatar", Some(("me.png", "image/png")), PNG));
    }
    multipart_request("POST", "/api/v1/users/register", &parts, None)
}

pub fn set_cookies(res: &Response<Body>) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Token pair captured from `Set-Cookie` headers.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn from_response(res: &Response<Body>) -> Self {
        let mut access = String::new();
        let mut refresh = String::new();
        for cookie in set_cookies(res) {
            let pair = cookie.split(';').next().unwrap_or_default().to_string();
            let mut headers = axum::http::HeaderMap::new();
            headers.insert(header::COOKIE, pair.parse().unwrap());
            if let Some(v) = get_cookie(&headers, ACCESS_COOKIE_NAME) {
                access = v.to_string();
            }
            if let Some(v) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
                refresh = v.to_string();
            }
        }
        Self { access, refresh }
    }

    pub fn cookie_header(&self) -> String {
        format!("{ACCESS_COOKIE_NAME}={}; {REFRESH_COOKIE_NAME}={}", self.access, self.refresh)
    }

    pub fn refresh_cookie(&self) -> String {
        format!("{REFRESH_COOKIE_NAME}={}", self.refresh)
    }
}

pub async fn register_alice(app: &Router) -> Session {
    let res = send(app, register_request("alice", "alice@example.com", "p@ss1234", true)).await;
    assert_eq!(res.status(), axum::http::StatusCode::CREATED);
    Session::from_response(&res)
}
