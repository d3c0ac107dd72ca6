//! Session cookie construction and parsing.
//!
//! Both cookies are `HttpOnly` on `/`. Production sets `Secure; SameSite=None`
//! so the separately hosted frontend can send them; otherwise `SameSite=Strict`.
//! Clearing uses the same attributes as setting.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};

use crate::utils::jwt::TokenPair;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn attributes(secure: bool) -> &'static str {
    if secure {
        "Path=/; HttpOnly; Secure; SameSite=None"
    } else {
        "Path=/; HttpOnly; SameSite=Strict"
    }
}

pub fn session_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={value}; {}; Max-Age={max_age_seconds}",
        attributes(secure)
    ))
}

pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{name}=; {}; Max-Age=0", attributes(secure)))
}

/// Append `Set-Cookie` headers for both tokens of a pair.
pub fn append_session_cookies(
    headers: &mut HeaderMap,
    pair: &TokenPair,
    access_max_age: i64,
    refresh_max_age: i64,
    secure: bool,
) -> Result<(), InvalidHeaderValue> {
    headers.append(
        SET_COOKIE,
        session_cookie(ACCESS_COOKIE, &pair.access_token, access_max_age, secure)?,
    );
    headers.append(
        SET_COOKIE,
        session_cookie(REFRESH_COOKIE, &pair.refresh_token, refresh_max_age, secure)?,
    );
    Ok(())
}

/// Append `Set-Cookie` headers expiring both tokens.
pub fn append_cleared_cookies(
    headers: &mut HeaderMap,
    secure: bool,
) -> Result<(), InvalidHeaderValue> {
    headers.append(SET_COOKIE, clear_cookie(ACCESS_COOKIE, secure)?);
    headers.append(SET_COOKIE, clear_cookie(REFRESH_COOKIE, secure)?);
    Ok(())
}

/// Value of a named cookie across all `Cookie` headers. Empty values count
/// as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_cookies_are_strict() {
        let cookie = session_cookie(ACCESS_COOKIE, "abc", 900, false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "token=abc; Path=/; HttpOnly; SameSite=Strict; Max-Age=900"
        );
    }

    #[test]
    fn production_cookies_are_secure_cross_site() {
        let cookie = session_cookie(REFRESH_COOKIE, "xyz", 604_800, true).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("HttpOnly"));

        let cleared = clear_cookie(REFRESH_COOKIE, true).unwrap();
        assert_eq!(
            cleared.to_str().unwrap(),
            "refreshToken=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0"
        );
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; refreshToken="),
        );
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }
}
