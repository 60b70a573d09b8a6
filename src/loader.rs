//! Concurrent model loading
//!
//! Every model file is fetched at once and the results are joined in path
//! order. What happens to failures is decided by an explicit `LoadPolicy`
//! instead of silently waiting forever.

use std::fmt::Display;
use std::future::Future;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{import_model, ImportError, Model};

/// What to do when some model files fail to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadPolicy {
    /// Any failure stops the viewer with an error screen
    #[default]
    Abort,
    /// Drop failed models and present the rest (fails only if none loaded)
    DegradeToAvailable,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: fetch failed: {message}")]
    Fetch { path: String, message: String },
    #[error("{path}: {source}")]
    Import {
        path: String,
        #[source]
        source: ImportError,
    },
}

#[cfg(test)]
impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            LoadError::Fetch { path, .. } | LoadError::Import { path, .. } => path,
        }
    }
}

/// Per-path outcome of `load_all`, in path order
pub struct LoadReport {
    pub results: Vec<Result<Model, LoadError>>,
}

impl LoadReport {
    pub fn loaded_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Apply the policy: the models to present, or every error that stops us
    pub fn resolve(self, policy: LoadPolicy) -> Result<Vec<Model>, Vec<LoadError>> {
        let (models, errors): (Vec<_>, Vec<_>) = self.results.into_iter().partition(Result::is_ok);
        let models: Vec<Model> = models.into_iter().filter_map(Result::ok).collect();
        let errors: Vec<LoadError> = errors.into_iter().filter_map(Result::err).collect();

        match policy {
            LoadPolicy::Abort if !errors.is_empty() => Err(errors),
            LoadPolicy::DegradeToAvailable if models.is_empty() => Err(errors),
            _ => {
                for error in &errors {
                    log::warn!("Skipping model: {}", error);
                }
                Ok(models)
            }
        }
    }
}

/// Fetch and import one model, normalizing its materials
async fn load_one<F, Fut, E>(path: &str, fetch: &F) -> Result<Model, LoadError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, E>>,
    E: Display,
{
    let bytes = fetch(path.to_string()).await.map_err(|e| LoadError::Fetch {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let mut model = import_model(path, &bytes).map_err(|source| LoadError::Import {
        path: path.to_string(),
        source,
    })?;
    model.wrapper.normalize_materials();
    log::info!(
        "Loaded {} ({} triangles, {} clips)",
        path,
        model.wrapper.triangle_count(),
        model.clips.len()
    );
    Ok(model)
}

/// Start every fetch, wait for all of them, keep results in path order
pub async fn load_all<F, Fut, E>(paths: &[String], fetch: F) -> LoadReport
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, E>>,
    E: Display,
{
    let fetch = &fetch;
    let results = join_all(paths.iter().map(|path| load_one(path, fetch))).await;
    LoadReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gltf_import::tests::triangle_glb;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Pending for `n` polls, then ready
    struct YieldTimes(u32);

    impl Future for YieldTimes {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 == 0 {
                Poll::Ready(())
            } else {
                self.0 -= 1;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    fn paths(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_results_keep_path_order_despite_completion_order() {
        let delays: HashMap<&str, u32> = [("a.glb", 5), ("b.glb", 0), ("c.glb", 2)].into();
        let completed = RefCell::new(Vec::new());
        let fetch = |path: String| {
            let delay = delays[path.as_str()];
            let completed = &completed;
            async move {
                YieldTimes(delay).await;
                completed.borrow_mut().push(path.clone());
                Ok::<_, String>(triangle_glb("OPAQUE"))
            }
        };
        let list = paths(&["a.glb", "b.glb", "c.glb"]);
        let report = pollster::block_on(load_all(&list, fetch));

        assert_eq!(*completed.borrow(), vec!["b.glb", "c.glb", "a.glb"]);
        let names: Vec<&str> = report
            .results
            .iter()
            .map(|r| r.as_ref().map(|m| m.name.as_str()).unwrap())
            .collect();
        assert_eq!(names, vec!["a.glb", "b.glb", "c.glb"]);
    }

    #[test]
    fn test_loaded_models_are_normalized_and_hidden() {
        let fetch = |_path: String| async { Ok::<_, String>(triangle_glb("BLEND")) };
        let report = pollster::block_on(load_all(&paths(&["m.glb"]), fetch));
        let models = report.resolve(LoadPolicy::Abort).unwrap();
        let model = &models[0];
        assert!(!model.wrapper.visible);
        assert!(model.wrapper.meshes[0].primitives[0].material.is_toon());
    }

    fn mixed_report() -> LoadReport {
        let fetch = |path: String| async move {
            if path == "missing.glb" {
                Err("404".to_string())
            } else {
                Ok(triangle_glb("OPAQUE"))
            }
        };
        pollster::block_on(load_all(&paths(&["a.glb", "missing.glb", "c.glb"]), fetch))
    }

    #[test]
    fn test_abort_policy_fails_on_any_error() {
        let report = mixed_report();
        assert_eq!(report.loaded_count(), 2);
        let errors = report.resolve(LoadPolicy::Abort).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "missing.glb");
        assert!(errors[0].to_string().contains("404"));
    }

    #[test]
    fn test_degrade_policy_keeps_remaining_in_order() {
        let models = mixed_report().resolve(LoadPolicy::DegradeToAvailable).unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.glb", "c.glb"]);
    }

    #[test]
    fn test_degrade_policy_fails_when_nothing_loaded() {
        let fetch = |_path: String| async { Ok::<_, String>(b"garbage".to_vec()) };
        let report = pollster::block_on(load_all(&paths(&["x.glb", "y.glb"]), fetch));
        let errors = report.resolve(LoadPolicy::DegradeToAvailable).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], LoadError::Import { source: ImportError::Parse(_), .. }));
    }
}
