//! Session cookie helpers.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::CookieConfig;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Header that may carry the access token instead of the cookie.
pub const ACCESS_TOKEN_HEADER: &str = "accesstoken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = value.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            if let Some((key, value)) = part.trim().split_once('=') {
                let value = value.trim();
                if key.trim() == name && !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn build(name: &str, value: &str, max_age: i64, cfg: &CookieConfig) -> String {
    let secure = if cfg.secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly; SameSite=None; Path=/; Max-Age={max_age}{secure}")
}

pub fn set_cookie(name: &str, value: &str, cfg: &CookieConfig) -> String {
    build(name, value, cfg.max_age_secs, cfg)
}

pub fn clear_cookie(name: &str, cfg: &CookieConfig) -> String {
    build(name, "", 0, cfg)
}

/// `Set-Cookie` headers for a fresh token pair.
pub fn session_cookies(access: &str, refresh: &str, cfg: &CookieConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in [
        set_cookie(ACCESS_COOKIE_NAME, access, cfg),
        set_cookie(REFRESH_COOKIE_NAME, refresh, cfg),
    ] {
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, v);
        }
    }
    headers
}

/// `Set-Cookie` headers that delete both session cookies.
pub fn cleared_cookies(cfg: &CookieConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in [
        clear_cookie(ACCESS_COOKIE_NAME, cfg),
        clear_cookie(REFRESH_COOKIE_NAME, cfg),
    ] {
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, v);
        }
    }
    headers
}
