use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Health state an endpoint must advertise to be considered by the broker.
pub const HEALTH_OK: &str = "ok";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputingEndpoint {
    pub url: String,
    #[serde(default)]
    pub health_state: String,
}

impl ComputingEndpoint {
    pub fn is_healthy(&self) -> bool {
        self.health_state == HEALTH_OK
    }
}

/// A queue-like allocation of slots and time limits within a target.
///
/// Time bounds are in seconds. `None` means the share does not constrain
/// that bound; a published negative value reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputingShare {
    pub name: String,
    pub free_slots: i32,
    pub used_slots: i32,
    pub waiting_jobs: i32,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub max_slots_per_job: Option<i32>,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub min_cpu_time: Option<i64>,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub max_cpu_time: Option<i64>,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub min_wall_time: Option<i64>,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub max_wall_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputingManager {
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub total_slots: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionEnvironment {
    pub cpu_clock_speed_mhz: Option<f64>,
}

/// One remote share of capacity as advertised by a site's information system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    pub computing_endpoint: ComputingEndpoint,
    #[serde(default)]
    pub computing_share: ComputingShare,
    #[serde(default)]
    pub computing_manager: ComputingManager,
    #[serde(default)]
    pub execution_environment: ExecutionEnvironment,
    #[serde(default)]
    pub benchmarks: HashMap<String, f64>,
}

impl ExecutionTarget {
    /// A healthy target with the given endpoint URL and nothing else published.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            computing_endpoint: ComputingEndpoint {
                url: url.into(),
                health_state: HEALTH_OK.to_string(),
            },
            ..Default::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.computing_endpoint.url
    }

    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.computing_share.name = name.into();
        self
    }

    pub fn with_slots(mut self, free: i32, used: i32, waiting: i32) -> Self {
        self.computing_share.free_slots = free;
        self.computing_share.used_slots = used;
        self.computing_share.waiting_jobs = waiting;
        self
    }

    pub fn with_benchmark(mut self, name: impl Into<String>, value: f64) -> Self {
        self.benchmarks.insert(name.into(), value);
        self
    }
}
