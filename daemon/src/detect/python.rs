//! Python projects

use std::path::Path;

use super::{has_file, Detection, Detector, ProjectType};

pub struct PythonDetector;

impl Detector for PythonDetector {
    fn name(&self) -> &'static str {
        "python"
    }

    fn priority(&self) -> u8 {
        70
    }

    fn detect(&self, path: &Path) -> Option<Detection> {
        let install = if has_file(path, "requirements.txt") {
            "pip install -r requirements.txt"
        } else if has_file(path, "pyproject.toml") {
            "pip install ."
        } else {
            return None;
        };

        let (framework, start, port) = web_framework(path);
        Some(
            Detection::new(ProjectType::Python, 0.8)
                .with_build(install)
                .with_start(start)
                .with_port(port)
                .with_meta("framework", framework),
        )
    }
}

/// Framework, start command and port, judged from entry-point files.
///
/// `app.py` is only read as text for its imports.
fn web_framework(path: &Path) -> (&'static str, &'static str, u16) {
    if has_file(path, "manage.py") {
        return (
            "django",
            "python manage.py runserver 0.0.0.0:8000",
            8000,
        );
    }

    if let Ok(source) = std::fs::read_to_string(path.join("app.py")) {
        if source.contains("from flask") || source.contains("import flask") {
            return ("flask", "python app.py", 5000);
        }
        if source.contains("from fastapi") || source.contains("import fastapi") {
            return (
                "fastapi",
                "uvicorn app:app --host 0.0.0.0 --port 8000",
                8000,
            );
        }
    }

    ("generic", "python app.py", 8000)
}
