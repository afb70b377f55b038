//! Static sites (plain HTML, Jekyll, Hugo)

use std::path::Path;

use super::{has_file, Detection, Detector, ProjectType};

pub struct StaticSiteDetector;

impl Detector for StaticSiteDetector {
    fn name(&self) -> &'static str {
        "static"
    }

    fn priority(&self) -> u8 {
        50
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        if has_file(path, "index.html") {
            return Some(
                Detection::new(ProjectType::Static, 0.7)
                    .with_start("python -m http.server 8080")
                    .with_port(8080)
                    .with_meta("type", "html"),
            );
        }

        if has_file(path, "_config.yml") {
            return Some(
                Detection::new(ProjectType::Static, 0.8)
                    .with_build("jekyll build")
                    .with_start("jekyll serve --host 0.0.0.0")
                    .with_port(4000)
                    .with_meta("generator", "jekyll"),
            );
        }

        if has_file(path, "config.toml") || has_file(path, "hugo.toml") {
            return Some(
                Detection::new(ProjectType::Static, 0.8)
                    .with_build("hugo")
                    .with_start("hugo server --bind 0.0.0.0")
                    .with_port(1313)
                    .with_meta("generator", "hugo"),
            );
        }

        None
    }
}
