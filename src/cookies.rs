// src/cookies.rs
//! Cookies: the [`CookieJar`] the page writes to, and the consent parser that reads it.

mod cookie_jar;
mod parser;

pub use cookie_jar::Cookie;
pub use cookie_jar::CookieJar;
pub use cookie_jar::CookieJarHandle;
pub use cookie_jar::DefaultCookieJar;

pub use parser::parse_consent_details;
pub use parser::parse_cookies;
pub use parser::ConsentMap;
