//! Minimal `package.json` reader shared by the JavaScript detectors

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub dev_dependencies: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub scripts: HashMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Read `package.json` under `dir`; unreadable or malformed manifests count as absent
    pub fn read(dir: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(dir.join("package.json")).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Runtime dependency
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Runtime or dev dependency
    pub fn uses(&self, name: &str) -> bool {
        self.depends_on(name) || self.dev_dependencies.contains_key(name)
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}
