use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::SubscriptionId;
use crate::render::texture::{AssetSource, check_texture};

/// Maps a texture key (a reference without a `/`) to an asset path.
pub trait TextureResolver {
    fn resolve_texture_key(&self, key: &str) -> Option<String>;
}

/// Parsed manifest document: `{ "textures": { "<key>": "<path>" } }`.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> StageResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StageError::serde(e.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct ManifestProgress {
    pub loaded: usize,
    pub total: usize,
    /// Whole-number percent, `100` once everything is done.
    pub percentage: u32,
}

/// Snapshot delivered to subscribers after every change.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ManifestState {
    /// Keys whose texture preloaded successfully.
    pub assets: BTreeMap<String, String>,
    pub loading: bool,
    /// Set when the manifest itself could not be read or parsed.
    pub error: Option<String>,
    pub progress: ManifestProgress,
}

type Subscriber = Box<dyn FnMut(&ManifestState)>;

/// Loads texture manifests and tracks their per-key preload progress.
///
/// A failing entry is logged and skipped; it still counts towards progress and never marks
/// the manifest as failed.
pub struct ManifestRegistry {
    source: Arc<dyn AssetSource>,
    manifests: Vec<(String, ManifestState)>,
    subscribers: HashMap<String, Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: u64,
}

impl std::fmt::Debug for ManifestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestRegistry")
            .field("manifests", &self.manifests)
            .finish_non_exhaustive()
    }
}

impl ManifestRegistry {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            manifests: Vec::new(),
            subscribers: HashMap::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self, path: &str) -> Option<&ManifestState> {
        self.manifests
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, s)| s)
    }

    /// Call `f` with every new state of the manifest at `path`.
    pub fn subscribe(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&ManifestState) + 'static,
    ) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers
            .entry(path.into())
            .or_default()
            .push((id, Box::new(f)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut found = false;
        self.subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|(sid, _)| *sid != id);
            found |= subs.len() != before;
            !subs.is_empty()
        });
        found
    }

    fn publish(&mut self, path: &str, state: ManifestState) {
        if let Some(subs) = self.subscribers.get_mut(path) {
            for (_, f) in subs.iter_mut() {
                f(&state);
            }
        }
        match self.manifests.iter_mut().find(|(p, _)| p == path) {
            Some((_, slot)) => *slot = state,
            None => self.manifests.push((path.to_owned(), state)),
        }
    }

    /// Fetch the manifest at `path` and preload every texture it lists.
    ///
    /// Loading the same path twice is a no-op. An unreadable manifest ends in an error state
    /// rather than an `Err`.
    #[tracing::instrument(skip(self))]
    pub fn load(&mut self, path: &str) -> ManifestState {
        if self.state(path).is_none() {
            self.perform_load(path);
        }
        self.state(path).cloned().unwrap_or_default()
    }

    fn perform_load(&mut self, path: &str) {
        self.publish(
            path,
            ManifestState {
                loading: true,
                ..ManifestState::default()
            },
        );

        let manifest = match self.source.fetch(path).and_then(|b| Manifest::from_slice(&b)) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path, error = %e, "failed to load manifest");
                self.publish(
                    path,
                    ManifestState {
                        error: Some(e.to_string()),
                        ..ManifestState::default()
                    },
                );
                return;
            }
        };

        let total = manifest.textures.len();
        if total == 0 {
            self.publish(
                path,
                ManifestState {
                    progress: ManifestProgress {
                        percentage: 100,
                        ..ManifestProgress::default()
                    },
                    ..ManifestState::default()
                },
            );
            return;
        }

        let mut assets = BTreeMap::new();
        self.publish(
            path,
            ManifestState {
                loading: true,
                progress: ManifestProgress {
                    loaded: 0,
                    total,
                    percentage: 0,
                },
                ..ManifestState::default()
            },
        );
        for (loaded, (key, texture)) in manifest.textures.into_iter().enumerate() {
            let loaded = loaded + 1;
            // Decoding is left to the backend's texture cache.
            match check_texture(self.source.as_ref(), &texture) {
                Ok(()) => {
                    assets.insert(key, texture);
                }
                Err(e) => {
                    tracing::warn!(%key, %texture, error = %e, "manifest texture failed to preload");
                }
            }
            self.publish(
                path,
                ManifestState {
                    assets: assets.clone(),
                    loading: loaded < total,
                    error: None,
                    progress: ManifestProgress {
                        loaded,
                        total,
                        percentage: ((loaded * 100) as f64 / total as f64).round() as u32,
                    },
                },
            );
        }
        tracing::debug!(path, loaded = assets.len(), total, "manifest loaded");
    }

    /// Forget every manifest and subscriber.
    pub fn clear(&mut self) {
        self.manifests.clear();
        self.subscribers.clear();
    }
}

impl TextureResolver for ManifestRegistry {
    /// First loaded, non-failed manifest that knows `key`, in load order.
    fn resolve_texture_key(&self, key: &str) -> Option<String> {
        self.manifests
            .iter()
            .filter(|(_, s)| !s.loading && s.error.is_none())
            .find_map(|(_, s)| s.assets.get(key).cloned())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/manifest.rs"]
mod tests;
