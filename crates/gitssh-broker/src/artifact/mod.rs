//! Bridge artifact generation.
//!
//! The artifact is what the external SSH client runs instead of its own
//! prompt: a directory holding the message resources and a launcher that
//! execs the askpass helper with them. It is built once per process, shared
//! by every spawned client, and rebuilt only if it disappears from disk.

mod script;

pub use script::{LAUNCHER_NAME, render_cmd, render_sh};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use gitssh_core::config::BrokerConfig;
use gitssh_core::messages;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Artifact errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Askpass helper not found at {0}")]
    HelperMissing(PathBuf),

    #[error("Cannot locate the askpass helper: {0}")]
    HelperUnknown(std::io::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid resource name: {0:?}")]
    InvalidResourceName(String),
}

/// A file bundled next to the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub contents: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// What goes into an artifact and where.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    /// Directory name prefix.
    pub prefix: String,
    /// The askpass helper binary the launcher execs.
    pub helper: PathBuf,
    /// Parent directory for generated artifacts.
    pub base_dir: PathBuf,
    pub resources: Vec<Resource>,
}

impl ArtifactSpec {
    pub fn new(helper: PathBuf, base_dir: PathBuf) -> Self {
        Self {
            prefix: "gitssh".to_string(),
            helper,
            base_dir,
            resources: vec![Resource::new(messages::FILE_NAME, messages::DEFAULT_MESSAGES)],
        }
    }

    /// Build the spec from broker configuration.
    ///
    /// Without an explicit helper path, the helper is expected next to the
    /// running executable.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ArtifactError> {
        let helper = match &config.askpass_binary {
            Some(path) => path.clone(),
            None => default_helper()?,
        };
        let base_dir = config
            .artifact_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Ok(Self::new(helper, base_dir))
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.retain(|r| r.name != resource.name);
        self.resources.push(resource);
        self
    }
}

fn default_helper() -> Result<PathBuf, ArtifactError> {
    let exe = std::env::current_exe().map_err(ArtifactError::HelperUnknown)?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!("gitssh-askpass{}", std::env::consts::EXE_SUFFIX)))
}

/// Builds the artifact on first use and hands out its path afterwards.
#[derive(Debug)]
pub struct ArtifactBuilder {
    spec: ArtifactSpec,
    current: Mutex<Option<PathBuf>>,
    generations: AtomicUsize,
}

impl ArtifactBuilder {
    pub fn new(spec: ArtifactSpec) -> Self {
        Self {
            spec,
            current: Mutex::new(None),
            generations: AtomicUsize::new(0),
        }
    }

    /// Path of the launcher, generating the artifact if needed.
    ///
    /// Concurrent callers wait on the same lock, so at most one generation
    /// runs at a time and later callers reuse its result. A failed build
    /// caches nothing.
    pub fn artifact_path(&self) -> Result<PathBuf, ArtifactError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = current.as_ref() {
            if path.is_file() {
                return Ok(path.clone());
            }
            warn!(path = %path.display(), "Bridge artifact disappeared, regenerating");
            if let Some(dir) = path.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
            *current = None;
        }

        let path = self.generate()?;
        *current = Some(path.clone());
        Ok(path)
    }

    /// Number of successful generations so far.
    pub fn generation_count(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    fn generate(&self) -> Result<PathBuf, ArtifactError> {
        if !self.spec.helper.is_file() {
            return Err(ArtifactError::HelperMissing(self.spec.helper.clone()));
        }
        for resource in &self.spec.resources {
            validate_resource_name(&resource.name)?;
        }

        let dir = self
            .spec
            .base_dir
            .join(format!("{}-{}", self.spec.prefix, uuid::Uuid::new_v4()));
        match self.write_into(&dir) {
            Ok(launcher) => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
                info!(path = %launcher.display(), generation, "Generated bridge artifact");
                Ok(launcher)
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Removing partial artifact");
                let _ = std::fs::remove_dir_all(&dir);
                Err(e)
            }
        }
    }

    fn write_into(&self, dir: &Path) -> Result<PathBuf, ArtifactError> {
        std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;

        for resource in &self.spec.resources {
            let path = dir.join(&resource.name);
            std::fs::write(&path, &resource.contents).map_err(|source| io_error(&path, source))?;
        }

        let launcher = dir.join(LAUNCHER_NAME);
        std::fs::write(&launcher, script::render(&self.spec.helper, dir))
            .map_err(|source| io_error(&launcher, source))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o755))
                .map_err(|source| io_error(&launcher, source))?;
        }

        Ok(launcher)
    }
}

impl Drop for ArtifactBuilder {
    fn drop(&mut self) {
        let current = self
            .current
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = current.as_ref().and_then(|p| p.parent()) {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn validate_resource_name(name: &str) -> Result<(), ArtifactError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && name != LAUNCHER_NAME
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(ArtifactError::InvalidResourceName(name.to_string()))
    }
}
