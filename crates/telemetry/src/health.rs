//! Component health registry.
//!
//! Probes (the scheduler's store ping) write into the registry; the
//! `/health` routes only read it.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Default)]
struct ProbeResult {
    message: Option<String>,
    checked_at: Option<DateTime<Utc>>,
}

/// Last probe outcome for one collaborator. Unhealthy until first probed.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    healthy: AtomicBool,
    last: RwLock<ProbeResult>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(false),
            last: RwLock::new(ProbeResult {
                message: None,
                checked_at: None,
            }),
        }
    }

    pub fn set_healthy(&self) {
        self.record(true, None);
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.record(false, Some(msg.into()));
    }

    fn record(&self, healthy: bool, message: Option<String>) {
        let mut last = self.last.write();
        self.healthy.store(healthy, Ordering::Relaxed);
        last.message = message;
        last.checked_at = Some(Utc::now());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.last.read().message.clone()
    }

    /// When the component was last probed, if ever.
    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        self.last.read().checked_at
    }

    fn report(&self) -> ComponentHealthReport {
        let last = self.last.read();
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: self.is_healthy(),
            message: last.message.clone(),
            checked_at: last.checked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

/// Health of the collaborators the engine depends on.
pub struct HealthRegistry {
    /// Event and heatmap store
    pub store: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            store: ComponentHealth::new("store"),
        }
    }

    fn components(&self) -> [&ComponentHealth; 1] {
        [&self.store]
    }

    pub fn report(&self) -> HealthReport {
        let components: Vec<_> = self.components().iter().map(|c| c.report()).collect();
        let status = if components.iter().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport { status, components }
    }

    /// Traffic is accepted once the store answers.
    pub fn is_ready(&self) -> bool {
        self.store.is_healthy()
    }

    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub static HEALTH: HealthRegistry = HealthRegistry::new();

pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
