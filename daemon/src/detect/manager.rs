//! Detector registry

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::container::ContainerDetector;
use super::node::NodeDetector;
use super::nuxt::NuxtDetector;
use super::python::PythonDetector;
use super::static_site::StaticSiteDetector;
use super::toolchain::{GoDetector, RustDetector};
use super::{Detection, Detector};

/// Runs every registered detector and keeps the best verdict
#[derive(Clone)]
pub struct DetectorManager {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorManager {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.register(Arc::new(ContainerDetector));
        manager.register(Arc::new(NuxtDetector));
        manager.register(Arc::new(GoDetector));
        manager.register(Arc::new(RustDetector));
        manager.register(Arc::new(NodeDetector));
        manager.register(Arc::new(PythonDetector));
        manager.register(Arc::new(StaticSiteDetector));
        manager
    }

    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// Detect the project at `path`.
    ///
    /// Never fails: the strictly highest confidence wins, the first one seen
    /// wins a tie, and no match at all yields [`Detection::unknown`].
    pub fn detect_project(&self, path: &Path) -> Detection {
        let mut best: Option<Detection> = None;

        for detector in &self.detectors {
            let Some(detection) = detector.detect(path) else {
                continue;
            };
            debug!(
                "Detector {} matched {} with confidence {:.2}",
                detector.name(),
                detection.project_type,
                detection.confidence
            );

            let current = best.as_ref().map(|b| b.confidence).unwrap_or(0.0);
            if detection.confidence > current {
                best = Some(detection);
            }
        }

        best.unwrap_or_else(Detection::unknown)
    }
}

impl Default for DetectorManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
