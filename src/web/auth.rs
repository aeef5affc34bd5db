use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    session::{CookieTokenStorage, SessionStore},
    web::flash::{self, Notification},
};

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let mut session = SessionStore::new(CookieTokenStorage::new(jar));
    let was_authenticated = session.is_authenticated();
    session.clear();
    info!(was_authenticated, "notion session cleared");

    let jar = flash::push(
        session.into_storage().into_jar(),
        &Notification::info("Disconnected from Notion."),
    );
    (jar, Redirect::to("/"))
}
