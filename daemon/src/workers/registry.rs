//! Registry of deployments currently held by a worker

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::deployment::Deployment;

/// The active set.
///
/// Only map operations happen under the lock, never process execution.
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    active: Mutex<HashMap<String, Deployment>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, deployment: &Deployment) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(deployment.id.clone(), deployment.clone());
    }

    pub fn release(&self, id: &str) -> Option<Deployment> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    /// Copies of the active deployments, oldest start first
    pub fn snapshot(&self) -> Vec<Deployment> {
        let mut active: Vec<Deployment> = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        active.sort_by_key(|d| d.started_at());
        active
    }

    pub fn contains(&self, id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
