//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds the cookies of a single origin. It is the ambient, globally
//! writable resource the consent widget persists its decision in: any script in any
//! tab of the origin may write it, and the network may write it through `Set-Cookie`
//! response headers.
//!
//! This module defines the [`CookieJar`] trait and a reference implementation,
//! [`DefaultCookieJar`], which stores cookies **in memory only** and understands the
//! subset of RFC 6265 needed for script writes (`document.cookie = "..."`).
//!
//! ## Notes & limitations
//! - Attributes `Path`, `Domain`, `Max-Age`, `SameSite`, `Secure` and `HttpOnly` are
//!   parsed. Only `Max-Age <= 0` (deletion) and `HttpOnly` (hidden from scripts) have
//!   an effect; `Expires` is kept as a raw string and not enforced.
//! - The jar is **not** internally synchronized. Share it as a [`CookieJarHandle`].
use http::HeaderMap;
use std::sync::{Arc, RwLock};

/// A handle to a cookie jar trait object.
///
/// Take a **read lock** for [`CookieJar::cookie_string`] and a **write lock** for
/// mutations.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// The cookie surface a page sees.
pub trait CookieJar: Send + Sync {
    /// Returns the script-visible cookie string (`"a=1; b=2"`), like `document.cookie`.
    fn cookie_string(&self) -> String;

    /// Applies a script write such as `"name=value; Path=/; Max-Age=31536000"`.
    ///
    /// Cookies are replaced by name ("last write wins"). Malformed writes are ignored.
    fn set_cookie(&mut self, assignment: &str);

    /// Stores cookies found in `Set-Cookie` response `headers`.
    fn store_response_cookies(&mut self, headers: &HeaderMap);

    /// Removes all cookies from the jar.
    fn clear(&mut self);
}

/// A single cookie record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,
    /// Raw cookie value (not URL-decoded).
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Raw `Expires` attribute, not enforced.
    pub expires: Option<String>,
    /// `Max-Age` in seconds. Zero or negative deletes the cookie on write.
    pub max_age: Option<i64>,
    /// `"Strict"`, `"Lax"` or `"None"`.
    pub same_site: Option<String>,
    pub secure: bool,
    /// Hidden from [`CookieJar::cookie_string`]. Scripts cannot set it.
    pub http_only: bool,
}

impl Cookie {
    /// Parses a `Set-Cookie` style string. Returns `None` when there is no `name=value`
    /// pair or the name is empty.
    pub fn parse(input: &str) -> Option<Cookie> {
        let mut parts = input.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            same_site: None,
            secure: false,
            http_only: false,
        };

        for part in parts {
            let part = part.trim();
            if let Some((k, v)) = part.split_once('=') {
                let v = v.trim();
                match k.trim().to_ascii_lowercase().as_str() {
                    "path" => cookie.path = Some(v.to_string()),
                    "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                    "expires" => cookie.expires = Some(v.to_string()),
                    "max-age" => cookie.max_age = v.parse().ok(),
                    "samesite" => {
                        cookie.same_site = Some(if v.eq_ignore_ascii_case("lax") {
                            "Lax".to_string()
                        } else if v.eq_ignore_ascii_case("strict") {
                            "Strict".to_string()
                        } else if v.eq_ignore_ascii_case("none") {
                            "None".to_string()
                        } else {
                            v.to_string()
                        })
                    }
                    _ => {}
                }
            } else if part.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if part.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            }
        }

        Some(cookie)
    }

    fn is_removal(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }
}

/// Default cookie jar holding the cookies of one origin, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DefaultCookieJar {
    entries: Vec<Cookie>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar from a script-style cookie string (`"a=1; b=2"`).
    pub fn from_cookie_string(cookies: &str) -> Self {
        let mut jar = Self::new();
        for entry in cookies.split(';') {
            jar.set_cookie(entry);
        }
        jar
    }

    /// Wraps the jar into a shareable [`CookieJarHandle`].
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }

    /// Returns the cookie called `name`, including HttpOnly cookies.
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&mut self, cookie: Cookie) {
        if cookie.is_removal() {
            self.entries.retain(|c| c.name != cookie.name);
            return;
        }

        if let Some(existing) = self.entries.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            self.entries.push(cookie);
        }
    }
}

impl CookieJar for DefaultCookieJar {
    fn cookie_string(&self) -> String {
        self.entries
            .iter()
            .filter(|c| !c.http_only)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&mut self, assignment: &str) {
        let Some(cookie) = Cookie::parse(assignment) else {
            log::debug!("ignoring malformed cookie write: {:?}", assignment);
            return;
        };

        // Browsers drop HttpOnly cookies written from script.
        if cookie.http_only {
            log::debug!("ignoring script write of HttpOnly cookie {:?}", cookie.name);
            return;
        }

        self.store(cookie);
    }

    fn store_response_cookies(&mut self, headers: &HeaderMap) {
        for header in headers.get_all(http::header::SET_COOKIE) {
            match header.to_str() {
                Ok(header_str) => {
                    if let Some(cookie) = Cookie::parse(header_str) {
                        self.store(cookie);
                    }
                }
                Err(e) => log::debug!("skipping non-ASCII Set-Cookie header: {}", e),
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn writes_append_and_replace_by_name() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("a=1; Path=/");
        jar.set_cookie("b=2");
        assert_eq!(jar.cookie_string(), "a=1; b=2");

        jar.set_cookie("a=3; Path=/; SameSite=lax");
        assert_eq!(jar.cookie_string(), "a=3; b=2");
        assert_eq!(jar.get("a").unwrap().same_site.as_deref(), Some("Lax"));
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn max_age_zero_removes_cookie() {
        let mut jar = DefaultCookieJar::from_cookie_string("a=1; b=2");
        jar.set_cookie("a=; Max-Age=0");
        assert_eq!(jar.cookie_string(), "b=2");

        // Removing an unknown cookie is a no-op.
        jar.set_cookie("zzz=; max-age=-1");
        assert_eq!(jar.cookie_string(), "b=2");
    }

    #[test]
    fn malformed_writes_are_ignored() {
        let mut jar = DefaultCookieJar::from_cookie_string("a=1");
        jar.set_cookie("no-separator");
        jar.set_cookie("=value-without-name");
        jar.set_cookie("");
        assert_eq!(jar.cookie_string(), "a=1");
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("token=abc==; Secure");
        let cookie = jar.get("token").unwrap();
        assert_eq!(cookie.value, "abc==");
        assert!(cookie.secure);
    }

    #[test]
    fn http_only_is_hidden_and_not_script_writable() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("script=1; HttpOnly");
        assert!(jar.is_empty());

        let mut headers = HeaderMap::new();
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("session=abc; HttpOnly; Path=/"));
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("theme=dark; Domain=.example.com"));
        jar.store_response_cookies(&headers);

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.cookie_string(), "theme=dark");
        assert_eq!(jar.get("theme").unwrap().domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn clear_empties_jar() {
        let mut jar = DefaultCookieJar::from_cookie_string("a=1; b=2");
        jar.clear();
        assert_eq!(jar.cookie_string(), "");
    }

    #[test]
    fn handle_is_shared() {
        let handle = DefaultCookieJar::new().into_handle();
        let other = handle.clone();
        handle.write().unwrap().set_cookie("a=1");
        assert_eq!(other.read().unwrap().cookie_string(), "a=1");
    }
}
