use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct Preview {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Registry of previews that are currently displayable.
///
/// Entries only live as long as the [`PreviewHandle`] that created them.
#[derive(Clone, Default)]
pub struct PreviewStore {
    entries: Arc<Mutex<HashMap<Uuid, Preview>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, content_type: impl Into<String>, bytes: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.lock().insert(
            id,
            Preview {
                content_type: content_type.into(),
                bytes,
            },
        );
        debug!(%id, "preview registered");

        PreviewHandle {
            id,
            store: self.clone(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Preview> {
        self.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, id: Uuid) {
        if self.lock().remove(&id).is_some() {
            debug!(%id, "preview revoked");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Preview>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Revocable reference to a registered preview. Dropping it releases the preview.
pub struct PreviewHandle {
    id: Uuid,
    store: PreviewStore,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("/api/previews/{}", self.id())
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("id", &self.id).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.store.revoke(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_handle_revokes_preview() {
        let store = PreviewStore::new();
        let handle = store.register("image/png", Bytes::from_static(&[1, 2, 3]));
        let id = handle.id();

        assert!(store.get(id).is_some());
        assert_eq!(handle.url(), format!("/api/previews/{id}"));

        drop(handle);
        assert!(store.get(id).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn replacing_a_handle_releases_the_previous_one() {
        let store = PreviewStore::new();
        let mut current = Some(store.register("image/png", Bytes::from_static(&[1])));
        let first_id = current.as_ref().map(PreviewHandle::id).expect("first");

        current = Some(store.register("image/jpeg", Bytes::from_static(&[2])));

        assert!(store.get(first_id).is_none());
        assert_eq!(store.len(), 1);
        let second = current.expect("second");
        assert_eq!(store.get(second.id()).expect("live").content_type, "image/jpeg");
    }
}
