//! Session cookies for the cookie token transport. All cookies are
//! HTTP-only, secure, and cross-site (`SameSite=None`), with a max-age
//! matching the token they carry.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_same_site(SameSite::None);
    cookie.set_path("/");
    cookie.set_max_age(max_age);
    cookie
}

pub fn access_cookie(token: String, ttl: Duration) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token, ttl)
}

pub fn refresh_cookie(token: String, ttl: Duration) -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, token, ttl)
}

/// Removal cookie: same attributes, empty value, immediate expiry. The
/// attributes must match the ones used when setting, or browsers keep the
/// original cookie.
fn clear_cookie(name: &'static str) -> Cookie<'static> {
    session_cookie(name, String::new(), Duration::ZERO)
}

pub fn clear_access_cookie() -> Cookie<'static> {
    clear_cookie(ACCESS_COOKIE)
}

pub fn clear_refresh_cookie() -> Cookie<'static> {
    clear_cookie(REFRESH_COOKIE)
}
