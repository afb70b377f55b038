//! Nuxt 3 projects

use std::path::Path;

use super::package_json::PackageManifest;
use super::{Detection, Detector, ProjectType};

pub struct NuxtDetector;

impl Detector for NuxtDetector {
    fn name(&self) -> &'static str {
        "nuxt"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        let manifest = PackageManifest::read(path)?;
        if !manifest.uses("nuxt") {
            return None;
        }

        // prebuilt Nitro server bundle
        if path.join(".output").join("server").join("index.mjs").exists() {
            return Some(
                Detection::new(ProjectType::Nuxt, 1.0)
                    .with_build("npm run build")
                    .with_start("node .output/server/index.mjs")
                    .with_port(3000)
                    .with_meta("version", "3")
                    .with_meta("nitro", true),
            );
        }

        Some(
            Detection::new(ProjectType::Nuxt, 0.95)
                .with_build("npm install")
                .with_build("npm run build")
                .with_start("npm run start")
                .with_port(3000)
                .with_meta("version", "3"),
        )
    }
}
