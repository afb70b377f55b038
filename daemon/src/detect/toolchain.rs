//! Compiled-language projects (Go modules, Cargo packages)

use std::path::Path;

use serde::Deserialize;

use super::{has_file, Detection, Detector, ProjectType};

pub struct GoDetector;

impl Detector for GoDetector {
    fn name(&self) -> &'static str {
        "go"
    }

    fn priority(&self) -> u8 {
        85
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        if !has_file(path, "go.mod") {
            return None;
        }

        // a root main.go builds with `go build`, a cmd/ layout needs the package path
        let build = if !has_file(path, "main.go") && path.join("cmd").is_dir() {
            first_subdir(&path.join("cmd"))
                .map(|name| format!("go build -o app ./cmd/{}", name))
                .unwrap_or_else(|| "go build -o app".to_string())
        } else {
            "go build -o app".to_string()
        };

        Some(
            Detection::new(ProjectType::Go, 1.0)
                .with_build(&build)
                .with_start("./app")
                .with_port(8080)
                .with_meta("has_go_mod", true),
        )
    }
}

pub struct RustDetector;

impl Detector for RustDetector {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn priority(&self) -> u8 {
        85
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        let manifest = std::fs::read_to_string(path.join("Cargo.toml")).ok()?;
        let detection = Detection::new(ProjectType::Rust, 1.0)
            .with_build("cargo build --release")
            .with_port(8080)
            .with_meta("has_cargo", true);

        // a virtual workspace names no binary to start
        let Some(binary) = binary_name(&manifest) else {
            return Some(detection);
        };
        Some(
            detection
                .with_start(&format!("./target/release/{}", binary))
                .with_meta("binary", binary),
        )
    }
}

#[derive(Debug, Deserialize)]
struct CargoManifest {
    package: Option<CargoPackage>,

    #[serde(default)]
    bin: Vec<CargoTarget>,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CargoTarget {
    name: Option<String>,
}

/// Name of the binary `cargo build --release` produces: the first `[[bin]]`
/// target, else the package name. Only safe file names are accepted.
fn binary_name(manifest: &str) -> Option<String> {
    let manifest: CargoManifest = toml::from_str(manifest).ok()?;

    let name = manifest
        .bin
        .into_iter()
        .find_map(|target| target.name)
        .or_else(|| manifest.package.map(|package| package.name))?;

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(name)
}

fn first_subdir(dir: &Path) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names.into_iter().next()
}
