use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::time::Duration as CookieDuration;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const FLASH_COOKIE: &str = "receipt_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

impl NotificationLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Info => "info",
            NotificationLevel::Error => "error",
        }
    }
}

/// A user-visible toast/flash message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Stash a notification for the next page render.
pub fn push(jar: CookieJar, notification: &Notification) -> CookieJar {
    let encoded = match serde_json::to_vec(notification) {
        Ok(json) => URL_SAFE_NO_PAD.encode(json),
        Err(err) => {
            warn!(?err, "failed to encode flash notification");
            return jar;
        }
    };

    let mut cookie = Cookie::new(FLASH_COOKIE, encoded);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::minutes(5));
    jar.add(cookie)
}

/// Remove and decode the pending notification, if any.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Notification>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };

    let notification = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Notification>(&bytes).ok());
    if notification.is_none() {
        warn!("discarding unreadable flash cookie");
    }

    let mut removal = Cookie::new(FLASH_COOKIE, "");
    removal.set_path("/");
    (jar.remove(removal), notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_survives_one_round_trip_only() {
        let notice = Notification::error("Authentication failed: Denied");
        let jar = push(CookieJar::new(), &notice);

        let (jar, taken) = take(jar);
        assert_eq!(taken, Some(notice));

        let (_, again) = take(jar);
        assert!(again.is_none());
    }

    #[test]
    fn garbage_cookie_is_dropped() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%%"));
        let (jar, taken) = take(jar);
        assert!(taken.is_none());
        assert!(jar.get(FLASH_COOKIE).is_none());
    }
}
