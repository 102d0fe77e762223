//! File watching for configuration hot-reload.
//!
//! This module provides the [`ConfigWatcher`], which monitors configuration
//! files and reloads a [`ConfigStore`] when they change.
//!
//! # Architecture
//!
//! The watcher uses the `notify` crate for cross-platform file system events.
//! When a file change is detected, the watcher:
//! 1. Filters events by extension
//! 2. Debounces events to prevent reload storms
//! 3. Builds a fresh [`ConfigLoader`] and runs a full load
//! 4. Publishes the result, or logs the failure and keeps the current
//!    configuration
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::{ConfigLoader, ConfigStore, ConfigWatcher};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), tessera_config::ConfigError> {
//! let loader = || ConfigLoader::new().with_file("etc/api.yaml");
//! let store = ConfigStore::new(loader()?.load()?);
//!
//! let mut watcher = ConfigWatcher::builder(store.clone(), loader)
//!     .with_debounce(Duration::from_millis(500))
//!     .watch_path("etc/api.yaml")?
//!     .build()?;
//!
//! tokio::spawn(async move { watcher.run().await });
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{ConfigError, LoadError};
use crate::loader::ConfigLoader;
use crate::store::ConfigStore;
use crate::validator::Validator;
use crate::TesseraConfig;

/// Builds the loader for one reload attempt.
pub type LoaderFactory = Arc<dyn Fn() -> Result<ConfigLoader, ConfigError> + Send + Sync>;

/// Result of a file change event.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// Path to the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeKind,
    /// When the change was detected.
    pub timestamp: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// File was created.
    Created,
    /// File was modified.
    Modified,
    /// File was deleted.
    Deleted,
}

impl FileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Paths to watch (files or directories).
    pub paths: Vec<PathBuf>,
    /// Debounce window for rapid changes to the same path.
    pub debounce: Duration,
    /// Whether to watch directories recursively.
    pub recursive: bool,
    /// File extensions to react to (empty = all files).
    pub extensions: HashSet<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce: Duration::from_millis(500),
            recursive: false,
            extensions: ["toml", "json", "yaml", "yml"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Builder for a [`ConfigWatcher`].
pub struct ConfigWatcherBuilder {
    options: WatchOptions,
    store: ConfigStore,
    factory: LoaderFactory,
    validator: Arc<Validator>,
}

impl ConfigWatcherBuilder {
    /// Set the debounce duration. Default is 500ms.
    #[must_use]
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.options.debounce = duration;
        self
    }

    /// Add a path to watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist.
    pub fn watch_path<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::file_not_found(path).into());
        }
        self.options.paths.push(path.to_path_buf());
        Ok(self)
    }

    /// Add a path to watch, ignoring it if it doesn't exist.
    #[must_use]
    pub fn watch_path_optional<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            self.options.paths.push(path.to_path_buf());
        }
        self
    }

    /// Set whether to watch directories recursively. Default is false.
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.options.recursive = recursive;
        self
    }

    /// Replace the extensions that trigger a reload.
    ///
    /// Pass an empty slice to react to every file.
    #[must_use]
    pub fn watch_extensions(mut self, extensions: &[&str]) -> Self {
        self.options.extensions = extensions.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Validate reloads with `validator` instead of the baseline rules.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Build the watcher and start receiving file system events.
    ///
    /// # Errors
    ///
    /// Returns an error if no paths are configured or the OS watcher cannot
    /// be created.
    pub fn build(self) -> Result<ConfigWatcher, ConfigError> {
        if self.options.paths.is_empty() {
            return Err(ConfigError::watch("no paths configured for file watcher"));
        }

        let (tx, rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    // Receiver gone means the watcher is shutting down.
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            }
        })
        .map_err(|e| ConfigError::watch(format!("failed to create file watcher: {e}")))?;

        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        for path in &self.options.paths {
            watcher.watch(path, mode).map_err(|e| {
                ConfigError::watch(format!("failed to watch {}: {e}", path.display()))
            })?;
            tracing::debug!(path = %path.display(), "watching configuration path");
        }

        Ok(ConfigWatcher {
            _watcher: watcher,
            rx,
            options: self.options,
            store: self.store,
            factory: self.factory,
            validator: self.validator,
            last_event: None,
        })
    }
}

/// Reloads a [`ConfigStore`] when watched files change.
///
/// A failed reload is logged and the store keeps serving the configuration
/// it already holds.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    options: WatchOptions,
    store: ConfigStore,
    factory: LoaderFactory,
    validator: Arc<Validator>,
    last_event: Option<(PathBuf, Instant)>,
}

impl ConfigWatcher {
    /// Start building a watcher that reloads `store` with loaders from
    /// `factory`.
    pub fn builder<F>(store: ConfigStore, factory: F) -> ConfigWatcherBuilder
    where
        F: Fn() -> Result<ConfigLoader, ConfigError> + Send + Sync + 'static,
    {
        ConfigWatcherBuilder {
            options: WatchOptions::default(),
            store,
            factory: Arc::new(factory),
            validator: Arc::new(Validator::baseline()),
        }
    }

    /// The store this watcher publishes into.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Process file system events until the event channel closes.
    pub async fn run(&mut self) {
        while let Some(change) = self.next().await {
            tracing::info!(path = %change.path.display(), kind = ?change.kind, "configuration file changed");
            // Failures are logged by the store.
            let _ = self.reload_blocking().await;
        }
        tracing::debug!("configuration watcher stopped");
    }

    /// Wait for the next change that passes filtering and debouncing.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(change) = self.process_event(&event) {
                return Some(change);
            }
        }
    }

    /// Run one full load and publish it.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error; the store is left untouched.
    pub fn reload(&self) -> Result<Arc<TesseraConfig>, ConfigError> {
        reload_into(&self.store, &self.factory, &self.validator)
    }

    /// [`ConfigWatcher::reload`] on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error, or `ConfigError::Watch` if the
    /// reload task died. The store is left untouched either way.
    pub async fn reload_blocking(&self) -> Result<Arc<TesseraConfig>, ConfigError> {
        let store = self.store.clone();
        let factory = Arc::clone(&self.factory);
        let validator = Arc::clone(&self.validator);
        tokio::task::spawn_blocking(move || reload_into(&store, &factory, &validator))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "configuration reload task failed");
                ConfigError::watch(format!("reload task failed: {e}"))
            })?
    }

    fn process_event(&mut self, event: &Event) -> Option<FileChangeEvent> {
        let kind = FileChangeKind::from_event(&event.kind)?;
        let path = event.paths.first()?.clone();

        if !self.options.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str())?;
            if !self.options.extensions.contains(ext) {
                return None;
            }
        }

        let now = Instant::now();
        if let Some((last_path, last_time)) = &self.last_event {
            if last_path == &path && now.duration_since(*last_time) < self.options.debounce {
                return None;
            }
        }
        self.last_event = Some((path.clone(), now));

        Some(FileChangeEvent {
            path,
            kind,
            timestamp: now,
        })
    }
}

fn reload_into(
    store: &ConfigStore,
    factory: &LoaderFactory,
    validator: &Validator,
) -> Result<Arc<TesseraConfig>, ConfigError> {
    let loader = factory().map_err(|e| {
        tracing::warn!(error = %e, "could not prepare configuration reload");
        e
    })?;
    store.reload_with(loader, validator)
}
