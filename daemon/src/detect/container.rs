//! Container projects (compose file or Dockerfile)

use std::path::Path;

use super::{has_file, Detection, Detector, ProjectType};

const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub struct ContainerDetector;

impl Detector for ContainerDetector {
    fn name(&self) -> &'static str {
        "container"
    }

    fn priority(&self) -> u8 {
        100
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        if let Some(compose_file) = COMPOSE_FILES.iter().find(|f| has_file(path, f)) {
            // port comes from the compose file itself
            return Some(
                Detection::new(ProjectType::Container, 1.0)
                    .with_build("docker-compose build")
                    .with_start("docker-compose up -d")
                    .with_meta("compose_file", *compose_file),
            );
        }

        // image and container are named after the instance at deploy time
        if has_file(path, "Dockerfile") {
            return Some(
                Detection::new(ProjectType::Container, 0.9)
                    .with_build("docker build .")
                    .with_start("docker run -d")
                    .with_port(3000)
                    .with_meta("dockerfile", "Dockerfile"),
            );
        }

        None
    }
}
