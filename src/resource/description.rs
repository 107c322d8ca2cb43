use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Attribute key for the legacy single-queue exclusion.
pub const REJECT_QUEUE: &str = "reject_queue";
/// Namespaced spelling of [`REJECT_QUEUE`] written by older clients.
pub const REJECT_QUEUE_NAMESPACED: &str = "nordugrid:broker;reject_queue";

/// Benchmark name that selects the target's CPU clock speed instead of the
/// published benchmark table.
pub const CLOCK_RATE: &str = "clock rate";

/// Inclusive bounds in seconds. `None` leaves the bound open, and so does a
/// negative value in a description file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Range {
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub min: Option<i64>,
    #[serde(deserialize_with = "crate::resource::unconstrained_if_negative")]
    pub max: Option<i64>,
}

/// A time requirement, optionally expressed relative to a named benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalableTime {
    pub range: Range,
    /// `(benchmark name, value the job was measured against)`.
    pub benchmark: Option<(String, f64)>,
}

impl ScalableTime {
    /// Benchmark reference, ignoring entries with an empty name.
    pub fn benchmark(&self) -> Option<(&str, f64)> {
        match &self.benchmark {
            Some((name, value)) if !name.is_empty() => Some((name.as_str(), *value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotRequirement {
    pub number_of_slots: i32,
}

impl Default for SlotRequirement {
    fn default() -> Self {
        Self { number_of_slots: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub queue_name: Option<String>,
    pub slot_requirement: SlotRequirement,
    pub total_cpu_time: ScalableTime,
    pub total_wall_time: ScalableTime,
}

/// The resource requirements of one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescription {
    pub resources: Resources,
    pub other_attributes: HashMap<String, String>,
}

impl JobDescription {
    /// Queue the job must run in, if one was requested.
    pub fn queue_name(&self) -> Option<&str> {
        self.resources
            .queue_name
            .as_deref()
            .filter(|q| !q.is_empty())
    }

    /// Queue the job must not run in.
    pub fn reject_queue(&self) -> Option<&str> {
        self.other_attributes
            .get(REJECT_QUEUE)
            .or_else(|| self.other_attributes.get(REJECT_QUEUE_NAMESPACED))
            .map(String::as_str)
    }

    pub fn slots(&self) -> i32 {
        self.resources.slot_requirement.number_of_slots
    }
}
