//! Artifact store and its startup/shutdown lifecycle.
//!
//! The store is filled once before the HTTP server binds and emptied once
//! after it stops. While requests are being served it is shared behind
//! `web::Data` (an `Arc`), so handlers only ever see `&ArtifactStore` and
//! no lock is needed.

use std::path::Path;
use std::sync::Arc;

use actix_web::web;
use tracing::{error, info, warn};

use crate::booster::Booster;
use crate::config::ArtifactPaths;
use crate::error::{LoadError, ServiceError};
use crate::features::FeatureList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Model,
    Features,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Model, ArtifactKind::Features];

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Features => "features",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Borrowed view of one stored artifact.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    Model(&'a Booster),
    Features(&'a FeatureList),
}

/// Both artifacts, handed to a prediction consumer once the service is ready.
#[derive(Debug, Clone, Copy)]
pub struct ReadyArtifacts<'a> {
    pub model: &'a Booster,
    pub features: &'a FeatureList,
}

/// Named artifacts loaded at startup. A name is present only if its load
/// succeeded.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    model: Option<Booster>,
    features: Option<FeatureList>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks an artifact up by name. Unknown names are simply absent.
    pub fn get(&self, name: &str) -> Option<Artifact<'_>> {
        match ArtifactKind::from_name(name)? {
            ArtifactKind::Model => self.model.as_ref().map(Artifact::Model),
            ArtifactKind::Features => self.features.as_ref().map(Artifact::Features),
        }
    }

    pub fn model(&self) -> Option<&Booster> {
        self.model.as_ref()
    }

    pub fn features(&self) -> Option<&FeatureList> {
        self.features.as_ref()
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Model => self.model.is_some(),
            ArtifactKind::Features => self.features.is_some(),
        }
    }

    pub fn len(&self) -> usize {
        ArtifactKind::ALL
            .into_iter()
            .filter(|&k| self.contains(k))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gate for request handlers that need every artifact.
    pub fn ready(&self) -> Result<ReadyArtifacts<'_>, ServiceError> {
        match (&self.model, &self.features) {
            (Some(model), Some(features)) => Ok(ReadyArtifacts { model, features }),
            _ => Err(ServiceError::NotReady {
                missing: ArtifactKind::ALL
                    .into_iter()
                    .filter(|&k| !self.contains(k))
                    .collect(),
            }),
        }
    }

    pub fn clear(&mut self) {
        self.model = None;
        self.features = None;
    }
}

/// Startup hook. Loads the model, then the feature list. Each load is
/// independent: a failure is logged and leaves only that name absent.
pub fn on_startup(paths: &ArtifactPaths) -> ArtifactStore {
    let model = Booster::load(&paths.model);
    let model = record(ArtifactKind::Model, &paths.model, model);
    if let Some(m) = &model {
        info!(
            artifact = "model",
            path = %paths.model.display(),
            booster = m.booster_name(),
            trees = m.num_trees(),
            features = m.num_features(),
            objective = m.objective_name(),
            "model loaded"
        );
    }

    let features = FeatureList::load(&paths.features);
    let features = record(ArtifactKind::Features, &paths.features, features);
    if let Some(f) = &features {
        info!(
            artifact = "features",
            path = %paths.features.display(),
            count = f.len(),
            "features loaded"
        );
    }

    let store = ArtifactStore { model, features };
    if let Ok(ready) = store.ready() {
        check_consistency(&ready);
    }
    store
}

/// Shutdown hook. Empties the store regardless of what it holds.
pub fn on_shutdown(store: &mut ArtifactStore) {
    let released = store.len();
    store.clear();
    info!(released, "artifact store cleared");
}

/// Runs the shutdown hook on the server's shared handle once every worker
/// has dropped its copy. Returns `false`, leaving the store untouched, if
/// another handle is still alive.
pub fn release(store: web::Data<ArtifactStore>) -> bool {
    let mut store = store.into_inner();
    if let Some(store) = Arc::get_mut(&mut store) {
        on_shutdown(store);
        return true;
    }
    warn!(
        handles = Arc::strong_count(&store),
        "artifact store still shared at shutdown, dropping handle"
    );
    false
}

fn record<T>(kind: ArtifactKind, path: &Path, outcome: Result<T, LoadError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(err) => {
            error!(
                artifact = kind.name(),
                path = %path.display(),
                error_kind = err.kind(),
                error = %err,
                "failed to load {}",
                kind.name()
            );
            None
        }
    }
}

// Mismatches are logged, not fatal: both artifacts stay loaded.
fn check_consistency(ready: &ReadyArtifacts<'_>) {
    let expected = ready.model.num_features();
    if ready.features.len() != expected {
        warn!(
            model_features = expected,
            listed_features = ready.features.len(),
            "feature list length does not match the model"
        );
    }
    let saved = ready.model.feature_names();
    if !saved.is_empty() && saved != ready.features.names() {
        warn!("feature list order or names differ from the names saved in the model");
    }
}
