//! Template set loading, rendering and development hot-reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::Environment;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::helpers;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to watch templates: {0}")]
    Watch(#[from] notify::Error),
}

impl IntoResponse for TemplateError {
    fn into_response(self) -> Response {
        error!(error = %self, "template rendering failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Shared handle to the active template set. Cheap to clone.
#[derive(Clone)]
pub struct Templates {
    active: Arc<ArcSwap<Environment<'static>>>,
    // Keeps the watcher thread alive for as long as any handle exists.
    _watcher: Option<Arc<Mutex<RecommendedWatcher>>>,
}

impl Templates {
    /// Parse every `*.html` file directly inside `dir`.
    ///
    /// With `hot_reload`, a watcher re-parses the set whenever a file in `dir`
    /// is written. A set that fails to parse is logged and discarded, leaving
    /// the previous one active.
    pub fn load(dir: impl Into<PathBuf>, hot_reload: bool) -> Result<Self, TemplateError> {
        let dir = dir.into();
        let active = Arc::new(ArcSwap::from_pointee(load_set(&dir)?));

        let watcher = if hot_reload {
            Some(Arc::new(Mutex::new(watch(&dir, active.clone())?)))
        } else {
            None
        };

        Ok(Self {
            active,
            _watcher: watcher,
        })
    }

    pub fn render_to_string<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, TemplateError> {
        let env = self.active.load();
        let template = env.get_template(name).map_err(|source| TemplateError::Render {
            name: name.to_string(),
            source,
        })?;
        template.render(ctx).map_err(|source| TemplateError::Render {
            name: name.to_string(),
            source,
        })
    }

    /// Render `name` into an HTML response with the given status.
    pub fn render<S: Serialize>(
        &self,
        status: StatusCode,
        name: &str,
        ctx: S,
    ) -> Result<(StatusCode, Html<String>), TemplateError> {
        Ok((status, Html(self.render_to_string(name, ctx)?)))
    }
}

fn load_set(dir: &Path) -> Result<Environment<'static>, TemplateError> {
    let io_err = |source| TemplateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "html") {
            files.push(path);
        }
    }
    files.sort();

    let mut env = Environment::new();
    helpers::register(&mut env);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        env.add_template_owned(name.clone(), source)
            .map_err(|source| TemplateError::Parse { name, source })?;
    }

    Ok(env)
}

fn watch(dir: &Path, active: Arc<ArcSwap<Environment<'static>>>) -> Result<RecommendedWatcher, TemplateError> {
    let reload_dir = dir.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
            let changed = event
                .paths
                .first()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            match load_set(&reload_dir) {
                Ok(env) => {
                    active.store(Arc::new(env));
                    info!(file = %changed, "modified file, reloaded templates");
                }
                Err(e) => error!(file = %changed, error = %e, "template reload failed; keeping previous set"),
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "error from template watcher"),
    })?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
