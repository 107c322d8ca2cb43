use std::cmp::Ordering;
use std::str::FromStr;

use crate::resource::{ExecutionTarget, JobDescription};

/// Orders feasible targets, best first.
///
/// Implementations must be deterministic: the same targets and job always
/// produce the same order.
pub trait TargetRanker: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn compare(&self, a: &ExecutionTarget, b: &ExecutionTarget, job: &JobDescription)
        -> Ordering;

    fn rank(&self, targets: &mut [ExecutionTarget], job: &JobDescription) {
        targets.sort_by(|a, b| self.compare(a, b, job));
    }
}

fn by_url(a: &ExecutionTarget, b: &ExecutionTarget) -> Ordering {
    a.url()
        .cmp(b.url())
        .then_with(|| a.computing_share.name.cmp(&b.computing_share.name))
}

/// Most free slots first, then fewest waiting jobs.
#[derive(Debug, Default, Clone)]
pub struct FreeSlots;

impl TargetRanker for FreeSlots {
    fn name(&self) -> &str {
        "free-slots"
    }

    fn compare(&self, a: &ExecutionTarget, b: &ExecutionTarget, _job: &JobDescription) -> Ordering {
        let (sa, sb) = (&a.computing_share, &b.computing_share);
        sb.free_slots
            .cmp(&sa.free_slots)
            .then_with(|| sa.waiting_jobs.cmp(&sb.waiting_jobs))
            .then_with(|| by_url(a, b))
    }
}

/// Lowest ratio of waiting jobs to total slots first.
#[derive(Debug, Default, Clone)]
pub struct ShortestQueue;

impl ShortestQueue {
    fn load(target: &ExecutionTarget) -> f64 {
        let waiting = target.computing_share.waiting_jobs.max(0) as f64;
        match target.computing_manager.total_slots {
            Some(total) if total > 0 => waiting / total as f64,
            // Unknown capacity ranks behind any site that publishes it.
            _ => f64::INFINITY,
        }
    }
}

impl TargetRanker for ShortestQueue {
    fn name(&self) -> &str {
        "shortest-queue"
    }

    fn compare(&self, a: &ExecutionTarget, b: &ExecutionTarget, job: &JobDescription) -> Ordering {
        Self::load(a)
            .total_cmp(&Self::load(b))
            .then_with(|| FreeSlots.compare(a, b, job))
    }
}

/// Highest published value of one benchmark first.
#[derive(Debug, Clone)]
pub struct Benchmark {
    benchmark: String,
    policy: String,
}

impl Benchmark {
    pub fn new(benchmark: impl Into<String>) -> Self {
        let benchmark = benchmark.into();
        Self {
            policy: format!("benchmark:{}", benchmark),
            benchmark,
        }
    }

    fn score(&self, target: &ExecutionTarget) -> f64 {
        target
            .benchmarks
            .get(&self.benchmark)
            .copied()
            .unwrap_or(f64::NEG_INFINITY)
    }
}

impl TargetRanker for Benchmark {
    /// The policy string, e.g. `benchmark:specint2000`.
    fn name(&self) -> &str {
        &self.policy
    }

    fn compare(&self, a: &ExecutionTarget, b: &ExecutionTarget, job: &JobDescription) -> Ordering {
        self.score(b)
            .total_cmp(&self.score(a))
            .then_with(|| FreeSlots.compare(a, b, job))
    }
}

/// Ranker selection as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RankerKind {
    #[default]
    FreeSlots,
    ShortestQueue,
    Benchmark(String),
}

impl RankerKind {
    pub fn build(&self) -> Box<dyn TargetRanker> {
        match self {
            RankerKind::FreeSlots => Box::new(FreeSlots),
            RankerKind::ShortestQueue => Box::new(ShortestQueue),
            RankerKind::Benchmark(name) => Box::new(Benchmark::new(name.clone())),
        }
    }
}

impl FromStr for RankerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free-slots" => Ok(RankerKind::FreeSlots),
            "shortest-queue" => Ok(RankerKind::ShortestQueue),
            other => match other.strip_prefix("benchmark:") {
                Some(name) if !name.is_empty() => Ok(RankerKind::Benchmark(name.to_string())),
                _ => Err(format!(
                    "unknown ranker '{}', expected free-slots, shortest-queue or benchmark:<name>",
                    other
                )),
            },
        }
    }
}

impl std::fmt::Display for RankerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankerKind::FreeSlots => write!(f, "free-slots"),
            RankerKind::ShortestQueue => write!(f, "shortest-queue"),
            RankerKind::Benchmark(name) => write!(f, "benchmark:{}", name),
        }
    }
}
