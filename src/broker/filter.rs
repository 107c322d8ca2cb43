use crate::resource::description::CLOCK_RATE;
use crate::resource::{ExecutionTarget, JobDescription, ScalableTime};

/// Ratio between the target's measurement of a benchmark and the value the
/// job's time bounds were expressed against.
///
/// Falls back to 1 when the job names no benchmark, the target does not
/// publish it, or the job's reference value is not positive.
pub fn benchmark_factor(target: &ExecutionTarget, time: &ScalableTime) -> f64 {
    let Some((name, value)) = time.benchmark() else {
        return 1.0;
    };

    let measured = if name == CLOCK_RATE {
        target.execution_environment.cpu_clock_speed_mhz
    } else {
        target.benchmarks.get(name).copied()
    };

    match measured {
        Some(m) if m > 0.0 && value > 0.0 => m / value,
        _ => 1.0,
    }
}

/// Check a job's time range against a share's bounds scaled by `factor`.
pub fn time_fits(
    time: &ScalableTime,
    share_min: Option<i64>,
    share_max: Option<i64>,
    factor: f64,
) -> bool {
    if let (Some(job_max), Some(max)) = (time.range.max, share_max) {
        if job_max as f64 > max as f64 * factor {
            return false;
        }
    }
    if let (Some(job_min), Some(min)) = (time.range.min, share_min) {
        if (job_min as f64) < min as f64 * factor {
            return false;
        }
    }
    true
}

fn queue_matches(target: &ExecutionTarget, job: &JobDescription) -> bool {
    let share = target.computing_share.name.as_str();
    if let Some(queue) = job.queue_name() {
        return share == queue;
    }
    match job.reject_queue() {
        // A share without a published name cannot be shown to differ.
        Some(_) if share.is_empty() => false,
        Some(rejected) => share != rejected,
        None => true,
    }
}

/// The reason a target was dropped by [`accepts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unhealthy,
    Rejected,
    Queue,
    CpuTime,
    WallTime,
    Slots,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Unhealthy => write!(f, "endpoint not healthy"),
            Rejection::Rejected => write!(f, "endpoint explicitly rejected"),
            Rejection::Queue => write!(f, "queue mismatch"),
            Rejection::CpuTime => write!(f, "cpu time out of bounds"),
            Rejection::WallTime => write!(f, "wall time out of bounds"),
            Rejection::Slots => write!(f, "too many slots requested"),
        }
    }
}

/// Run every predicate against one target.
pub fn accepts<S: AsRef<str>>(
    target: &ExecutionTarget,
    job: &JobDescription,
    reject_urls: &[S],
) -> Result<(), Rejection> {
    if !target.computing_endpoint.is_healthy() {
        return Err(Rejection::Unhealthy);
    }
    if reject_urls.iter().any(|u| u.as_ref() == target.url()) {
        return Err(Rejection::Rejected);
    }
    if !queue_matches(target, job) {
        return Err(Rejection::Queue);
    }

    let share = &target.computing_share;
    let cpu = &job.resources.total_cpu_time;
    if !time_fits(
        cpu,
        share.min_cpu_time,
        share.max_cpu_time,
        benchmark_factor(target, cpu),
    ) {
        return Err(Rejection::CpuTime);
    }
    let wall = &job.resources.total_wall_time;
    if !time_fits(
        wall,
        share.min_wall_time,
        share.max_wall_time,
        benchmark_factor(target, wall),
    ) {
        return Err(Rejection::WallTime);
    }

    if let Some(max) = share.max_slots_per_job {
        if job.slots() > max {
            return Err(Rejection::Slots);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(min: Option<i64>, max: Option<i64>, benchmark: Option<(&str, f64)>) -> ScalableTime {
        ScalableTime {
            range: crate::resource::Range { min, max },
            benchmark: benchmark.map(|(n, v)| (n.to_string(), v)),
        }
    }

    #[test]
    fn factor_defaults_to_one() {
        let target = ExecutionTarget::new("https://ce/").with_benchmark("B", 100.0);
        assert_eq!(benchmark_factor(&target, &time(None, None, None)), 1.0);
        assert_eq!(
            benchmark_factor(&target, &time(None, None, Some(("missing", 50.0)))),
            1.0
        );
        assert_eq!(
            benchmark_factor(&target, &time(None, None, Some(("B", 0.0)))),
            1.0
        );
        assert_eq!(
            benchmark_factor(&target, &time(None, None, Some(("B", -1.0)))),
            1.0
        );
    }

    #[test]
    fn factor_uses_benchmark_table() {
        let target = ExecutionTarget::new("https://ce/").with_benchmark("B", 100.0);
        assert_eq!(
            benchmark_factor(&target, &time(None, None, Some(("B", 50.0)))),
            2.0
        );
    }

    #[test]
    fn factor_uses_clock_rate() {
        let mut target = ExecutionTarget::new("https://ce/");
        let t = time(None, None, Some((CLOCK_RATE, 1000.0)));
        assert_eq!(benchmark_factor(&target, &t), 1.0);
        target.execution_environment.cpu_clock_speed_mhz = Some(2500.0);
        assert_eq!(benchmark_factor(&target, &t), 2.5);
    }

    #[test]
    fn unconstrained_share_bound_ignores_factor() {
        let t = time(Some(1), Some(1_000_000), None);
        assert!(time_fits(&t, None, None, 0.001));
    }

    #[test]
    fn rejection_reasons() {
        let mut target = ExecutionTarget::new("https://ce/").with_queue("q1");
        let job = JobDescription::default();
        assert_eq!(accepts::<&str>(&target, &job, &[]), Ok(()));
        assert_eq!(
            accepts(&target, &job, &["https://ce/"]),
            Err(Rejection::Rejected)
        );

        target.computing_share.max_slots_per_job = Some(0);
        assert_eq!(accepts::<&str>(&target, &job, &[]), Err(Rejection::Slots));

        target.computing_endpoint.health_state = "critical".to_string();
        assert_eq!(
            accepts::<&str>(&target, &job, &[]),
            Err(Rejection::Unhealthy)
        );
    }
}
