//! Project type detection
//!
//! Each [`Detector`] inspects a checked-out tree for declarative markers
//! (manifests, lockfiles, framework dependencies, marker files) and proposes
//! how to build and start the project. Detectors never execute anything from
//! the inspected tree. [`DetectorManager`] runs all of them and keeps the
//! most confident verdict.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub mod container;
pub mod manager;
pub mod node;
pub mod nuxt;
pub mod package_json;
pub mod python;
pub mod static_site;
pub mod toolchain;

pub use manager::DetectorManager;

/// Detected project type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Container,
    Nuxt,
    Node,
    Static,
    Go,
    Rust,
    Python,
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Container => "container",
            ProjectType::Nuxt => "nuxt",
            ProjectType::Node => "node",
            ProjectType::Static => "static",
            ProjectType::Go => "go",
            ProjectType::Rust => "rust",
            ProjectType::Python => "python",
            ProjectType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detector's verdict on how to build and start a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub project_type: ProjectType,

    /// Confidence in `[0, 1]`
    pub confidence: f32,

    /// Build steps, run in order; each one is a single command line
    pub build_commands: Vec<String>,

    pub start_command: Option<String>,

    /// Port the application listens on, when the detector knows it
    pub port: Option<u16>,

    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Detection {
    pub fn new(project_type: ProjectType, confidence: f32) -> Self {
        Self {
            project_type,
            confidence,
            build_commands: Vec::new(),
            start_command: None,
            port: None,
            metadata: BTreeMap::new(),
        }
    }

    /// The zero-confidence verdict used when nothing matched
    pub fn unknown() -> Self {
        Self::new(ProjectType::Unknown, 0.0)
    }

    pub fn with_build(mut self, command: &str) -> Self {
        self.build_commands.push(command.to_string());
        self
    }

    pub fn with_start(mut self, command: &str) -> Self {
        self.start_command = Some(command.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Container project built from a Dockerfile rather than a compose file
    pub fn builds_image(&self) -> bool {
        self.project_type == ProjectType::Container && self.metadata.contains_key("dockerfile")
    }
}

/// Detection strategy
pub trait Detector: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Informational weight; ties are broken by registration order, not by this
    fn priority(&self) -> u8;

    /// Inspect `path`; `None` means "not my kind of project"
    fn detect(&self, path: &Path) -> Option<Detection>;
}

/// True if `name` exists directly under `path`
pub(crate) fn has_file(path: &Path, name: &str) -> bool {
    path.join(name).exists()
}
