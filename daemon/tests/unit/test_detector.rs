//! Project detection tests

use std::fs;

use dockyard::detect::container::ContainerDetector;
use dockyard::detect::node::NodeDetector;
use dockyard::detect::nuxt::NuxtDetector;
use dockyard::detect::python::PythonDetector;
use dockyard::detect::static_site::StaticSiteDetector;
use dockyard::detect::toolchain::{GoDetector, RustDetector};
use dockyard::detect::{Detector, DetectorManager, ProjectType};
use tempfile::TempDir;

#[test]
fn test_empty_directory_matches_nothing() {
    let dir = TempDir::new().unwrap();
    let detectors: Vec<Box<dyn Detector>> = vec![
        Box::new(ContainerDetector),
        Box::new(NuxtDetector),
        Box::new(GoDetector),
        Box::new(RustDetector),
        Box::new(NodeDetector),
        Box::new(PythonDetector),
        Box::new(StaticSiteDetector),
    ];

    for detector in &detectors {
        assert!(
            detector.detect(dir.path()).is_none(),
            "{} matched an empty directory",
            detector.name()
        );
    }

    let detection = DetectorManager::with_defaults().detect_project(dir.path());
    assert_eq!(detection.project_type, ProjectType::Unknown);
    assert_eq!(detection.confidence, 0.0);
    assert!(detection.start_command.is_none());
}

#[test]
fn test_compose_file_beats_node_manifest() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"dependencies": {"express": "^4.18.0"}}"#,
    )
    .unwrap();

    let detection = DetectorManager::with_defaults().detect_project(dir.path());
    assert_eq!(detection.project_type, ProjectType::Container);
    assert_eq!(detection.confidence, 1.0);
    assert_eq!(detection.start_command.as_deref(), Some("docker-compose up -d"));
    assert!(detection.port.is_none());
}

#[test]
fn test_plain_html_is_static() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

    let detection = DetectorManager::with_defaults().detect_project(dir.path());
    assert_eq!(detection.project_type, ProjectType::Static);
    assert_eq!(detection.port, Some(8080));
    assert!(detection.build_commands.is_empty());
    assert_eq!(
        detection.start_command.as_deref(),
        Some("python -m http.server 8080")
    );
}

#[test]
fn test_express_project() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"scripts": {"build": "tsc"}, "dependencies": {"express": "^4.18.0"}}"#,
    )
    .unwrap();

    let detection = DetectorManager::with_defaults().detect_project(dir.path());
    assert_eq!(detection.project_type, ProjectType::Node);
    assert_eq!(detection.build_commands, vec!["npm install", "npm run build"]);
    assert_eq!(detection.start_command.as_deref(), Some("npm start"));
    assert_eq!(detection.port, Some(3000));
    assert_eq!(detection.metadata["framework"], "express");
}

#[test]
fn test_unparseable_manifest_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), "{ not json").unwrap();

    assert!(NodeDetector.detect(dir.path()).is_none());
    let detection = DetectorManager::with_defaults().detect_project(dir.path());
    assert_eq!(detection.project_type, ProjectType::Unknown);
}

fn detect(dir: &TempDir) -> dockyard::detect::Detection {
    DetectorManager::with_defaults().detect_project(dir.path())
}

#[test]
fn test_nuxt_with_and_without_prebuilt_server() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"devDependencies": {"nuxt": "^3.9.0"}, "dependencies": {"express": "^4.18.0"}}"#,
    )
    .unwrap();

    let fresh = detect(&dir);
    assert_eq!(fresh.project_type, ProjectType::Nuxt);
    assert_eq!(fresh.confidence, 0.95);
    assert_eq!(fresh.build_commands, vec!["npm install", "npm run build"]);
    assert_eq!(fresh.start_command.as_deref(), Some("npm run start"));

    let server = dir.path().join(".output").join("server");
    fs::create_dir_all(&server).unwrap();
    fs::write(server.join("index.mjs"), "").unwrap();

    let built = detect(&dir);
    assert_eq!(built.project_type, ProjectType::Nuxt);
    assert_eq!(built.confidence, 1.0);
    assert_eq!(built.start_command.as_deref(), Some("node .output/server/index.mjs"));
    assert_eq!(built.port, Some(3000));
}

#[test]
fn test_dockerfile_only_project() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM node:20\n").unwrap();

    let detection = detect(&dir);
    assert_eq!(detection.project_type, ProjectType::Container);
    assert_eq!(detection.confidence, 0.9);
    assert!(detection.builds_image());
    assert_eq!(detection.build_commands, vec!["docker build ."]);
    assert_eq!(detection.start_command.as_deref(), Some("docker run -d"));
    assert_eq!(detection.port, Some(3000));
}

#[test]
fn test_compose_project_does_not_build_an_image() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("compose.yaml"), "services: {}\n").unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM node:20\n").unwrap();

    let detection = detect(&dir);
    assert_eq!(detection.confidence, 1.0);
    assert!(!detection.builds_image());
}

#[test]
fn test_go_layouts() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("go.mod"), "module example.test/app\n").unwrap();
    fs::write(root.path().join("main.go"), "package main\n").unwrap();

    let detection = detect(&root);
    assert_eq!(detection.project_type, ProjectType::Go);
    assert_eq!(detection.build_commands, vec!["go build -o app"]);
    assert_eq!(detection.start_command.as_deref(), Some("./app"));
    assert_eq!(detection.port, Some(8080));

    let cmd = TempDir::new().unwrap();
    fs::write(cmd.path().join("go.mod"), "module example.test/app\n").unwrap();
    fs::create_dir_all(cmd.path().join("cmd").join("worker")).unwrap();
    fs::create_dir_all(cmd.path().join("cmd").join("api")).unwrap();

    let detection = detect(&cmd);
    assert_eq!(detection.build_commands, vec!["go build -o app ./cmd/api"]);
}

#[test]
fn test_rust_package() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Cargo.toml"),
        "[package]\nname = \"hello-web\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
    )
    .unwrap();

    let detection = detect(&dir);
    assert_eq!(detection.project_type, ProjectType::Rust);
    assert_eq!(detection.build_commands, vec!["cargo build --release"]);
    assert_eq!(
        detection.start_command.as_deref(),
        Some("./target/release/hello-web")
    );
    assert_eq!(detection.port, Some(8080));
}

#[test]
fn test_python_frameworks() {
    let cases = [
        ("manage.py", "", "django", "python manage.py runserver 0.0.0.0:8000", 8000),
        ("app.py", "from flask import Flask\n", "flask", "python app.py", 5000),
        (
            "app.py",
            "from fastapi import FastAPI\n",
            "fastapi",
            "uvicorn app:app --host 0.0.0.0 --port 8000",
            8000,
        ),
        ("app.py", "print('hi')\n", "generic", "python app.py", 8000),
    ];

    for (file, source, framework, start, port) in cases {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
        fs::write(dir.path().join(file), source).unwrap();

        let detection = detect(&dir);
        assert_eq!(detection.project_type, ProjectType::Python, "{}", framework);
        assert_eq!(detection.metadata["framework"], framework);
        assert_eq!(detection.start_command.as_deref(), Some(start));
        assert_eq!(detection.port, Some(port), "{}", framework);
        assert_eq!(
            detection.build_commands,
            vec!["pip install -r requirements.txt"]
        );
    }

    let pyproject = TempDir::new().unwrap();
    fs::write(pyproject.path().join("pyproject.toml"), "[project]\nname = \"x\"\n").unwrap();
    assert_eq!(detect(&pyproject).build_commands, vec!["pip install ."]);
}

#[test]
fn test_static_site_generators() {
    let jekyll = TempDir::new().unwrap();
    fs::write(jekyll.path().join("_config.yml"), "title: Blog\n").unwrap();
    let detection = detect(&jekyll);
    assert_eq!(detection.project_type, ProjectType::Static);
    assert_eq!(detection.metadata["generator"], "jekyll");
    assert_eq!(detection.build_commands, vec!["jekyll build"]);
    assert_eq!(detection.port, Some(4000));

    let hugo = TempDir::new().unwrap();
    fs::write(hugo.path().join("hugo.toml"), "title = \"Site\"\n").unwrap();
    let detection = detect(&hugo);
    assert_eq!(detection.metadata["generator"], "hugo");
    assert_eq!(detection.build_commands, vec!["hugo"]);
    assert_eq!(detection.port, Some(1313));
}
