use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::debug;
use uuid::Uuid;

use crate::intake::{ImageAsset, PreviewHandle, PreviewStore};

/// Per-view state: the selected receipt, its preview and the submit lock.
#[derive(Debug)]
struct Workspace {
    asset: Option<ImageAsset>,
    preview: Option<PreviewHandle>,
    in_flight: bool,
    last_seen: Instant,
}

impl Workspace {
    fn new() -> Self {
        Self {
            asset: None,
            preview: None,
            in_flight: false,
            last_seen: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceError {
    Unknown,
    Busy,
}

#[derive(Clone, Default)]
pub struct WorkspaceRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Workspace>>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(id, Workspace::new());
        debug!(%id, "workspace opened");
        id
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    /// Swap in a new asset. The previous preview is released before the new
    /// one is registered.
    pub fn replace_asset(
        &self,
        id: Uuid,
        asset: ImageAsset,
        previews: &PreviewStore,
    ) -> Result<String, WorkspaceError> {
        let mut guard = self.lock();
        let workspace = guard.get_mut(&id).ok_or(WorkspaceError::Unknown)?;

        workspace.preview = None;
        let handle = previews.register(asset.content_type.clone(), asset.bytes.clone());
        let url = handle.url();

        workspace.preview = Some(handle);
        workspace.asset = Some(asset);
        workspace.last_seen = Instant::now();
        Ok(url)
    }

    /// Mark a submission as outstanding. Only one may be in flight per workspace.
    pub fn begin_submission(&self, id: Uuid) -> Result<SubmissionGuard, WorkspaceError> {
        let mut guard = self.lock();
        let workspace = guard.get_mut(&id).ok_or(WorkspaceError::Unknown)?;
        if workspace.in_flight {
            return Err(WorkspaceError::Busy);
        }

        workspace.in_flight = true;
        workspace.last_seen = Instant::now();
        Ok(SubmissionGuard {
            registry: self.clone(),
            id,
            asset: workspace.asset.clone(),
        })
    }

    /// Tear down a workspace, releasing its asset and preview.
    pub fn close(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            debug!(%id, "workspace closed");
        }
        removed.is_some()
    }

    /// Drop workspaces not touched within `idle`. In-flight ones are kept.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|_, workspace| workspace.in_flight || workspace.last_seen.elapsed() < idle);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn finish_submission(&self, id: Uuid) {
        if let Some(workspace) = self.lock().get_mut(&id) {
            workspace.in_flight = false;
            workspace.last_seen = Instant::now();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Workspace>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of a submission; releases the workspace on drop.
pub struct SubmissionGuard {
    registry: WorkspaceRegistry,
    id: Uuid,
    asset: Option<ImageAsset>,
}

impl SubmissionGuard {
    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.registry.finish_submission(self.id);
    }
}
