//! Generic Node.js projects

use std::path::Path;

use super::package_json::PackageManifest;
use super::{Detection, Detector, ProjectType};

/// Framework dependencies recognised, in lookup order
const FRAMEWORKS: &[(&str, &str)] = &[
    ("express", "express"),
    ("fastify", "fastify"),
    ("@nestjs/core", "nestjs"),
    ("next", "nextjs"),
];

pub struct NodeDetector;

impl Detector for NodeDetector {
    fn name(&self) -> &'static str {
        "node"
    }

    fn priority(&self) -> u8 {
        70
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        let manifest = PackageManifest::read(path)?;

        let framework = FRAMEWORKS
            .iter()
            .find(|(dep, _)| manifest.depends_on(dep))
            .map(|(_, name)| *name)
            .unwrap_or("generic");

        let is_next = framework == "nextjs";
        let mut detection = Detection::new(ProjectType::Node, 0.8).with_build("npm install");
        if is_next || manifest.has_script("build") {
            detection = detection.with_build("npm run build");
        }

        let start = if is_next { "npm run start" } else { "npm start" };
        Some(
            detection
                .with_start(start)
                .with_port(3000)
                .with_meta("framework", framework),
        )
    }
}
