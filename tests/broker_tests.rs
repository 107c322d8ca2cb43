use grid_lite::broker::{Booking, Broker, RankerKind};
use grid_lite::resource::description::{CLOCK_RATE, REJECT_QUEUE, REJECT_QUEUE_NAMESPACED};
use grid_lite::resource::{ExecutionTarget, JobDescription};

const NO_REJECT: &[&str] = &[];

fn job_with_queue(queue: &str) -> JobDescription {
    let mut job = JobDescription::default();
    job.resources.queue_name = Some(queue.to_string());
    job
}

fn job_rejecting(queue: &str) -> JobDescription {
    let mut job = JobDescription::default();
    job.other_attributes
        .insert(REJECT_QUEUE.to_string(), queue.to_string());
    job
}

fn cpu_job(min: Option<i64>, max: Option<i64>) -> JobDescription {
    let mut job = JobDescription::default();
    job.resources.total_cpu_time.range.min = min;
    job.resources.total_cpu_time.range.max = max;
    job
}

fn accepted(targets: &[ExecutionTarget], job: &JobDescription) -> Vec<String> {
    let mut broker = Broker::default();
    broker
        .prefilter_targets(targets, job, NO_REJECT)
        .iter()
        .map(|t| t.url().to_string())
        .collect()
}

fn accepts(target: &ExecutionTarget, job: &JobDescription) -> bool {
    !accepted(std::slice::from_ref(target), job).is_empty()
}

#[test]
fn test_queue_filter() {
    let target = ExecutionTarget::new("https://ce1.example.org/arex").with_queue("q1");
    assert!(accepts(&target, &job_with_queue("q1")));
    assert!(!accepts(&target, &job_with_queue("q2")));
}

#[test]
fn test_reject_queue_filter() {
    let q1 = ExecutionTarget::new("https://ce1.example.org/arex").with_queue("q1");
    let q2 = ExecutionTarget::new("https://ce1.example.org/arex").with_queue("q2");
    assert!(!accepts(&q1, &job_rejecting("q1")));
    assert!(accepts(&q2, &job_rejecting("q1")));

    let mut namespaced = JobDescription::default();
    namespaced
        .other_attributes
        .insert(REJECT_QUEUE_NAMESPACED.to_string(), "q1".to_string());
    assert!(!accepts(&q1, &namespaced));
    assert!(accepts(&q2, &namespaced));
}

#[test]
fn test_queue_name_overrides_reject_queue() {
    let target = ExecutionTarget::new("https://ce1.example.org/arex").with_queue("q1");
    let mut job = job_with_queue("q1");
    job.other_attributes
        .insert(REJECT_QUEUE.to_string(), "q1".to_string());
    assert!(accepts(&target, &job));
}

#[test]
fn test_unnamed_share_excluded_when_rejecting_queue() {
    let unnamed = ExecutionTarget::new("https://ce1.example.org/arex");
    assert!(!accepts(&unnamed, &job_rejecting("q1")));
    assert!(accepts(&unnamed, &JobDescription::default()));
}

#[test]
fn test_unhealthy_target_excluded() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.computing_endpoint.health_state = "critical".to_string();
    assert!(!accepts(&target, &JobDescription::default()));
}

#[test]
fn test_cpu_time_max_bound() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.computing_share.max_cpu_time = Some(100);

    assert!(!accepts(&target, &cpu_job(None, Some(110))));
    assert!(accepts(&target, &cpu_job(None, Some(100))));
    assert!(accepts(&target, &cpu_job(None, Some(90))));
    assert!(accepts(&target, &cpu_job(None, None)));
}

#[test]
fn test_cpu_time_min_bound() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.computing_share.min_cpu_time = Some(10);

    assert!(!accepts(&target, &cpu_job(Some(5), None)));
    assert!(accepts(&target, &cpu_job(Some(10), None)));
    assert!(accepts(&target, &cpu_job(Some(15), None)));
}

#[test]
fn test_unconstrained_share_accepts_any_time() {
    let target = ExecutionTarget::new("https://ce1.example.org/arex");
    assert!(accepts(&target, &cpu_job(Some(1), Some(1_000_000))));
}

#[test]
fn test_benchmark_scaled_bound() {
    let mut target =
        ExecutionTarget::new("https://ce1.example.org/arex").with_benchmark("B", 100.0);
    target.computing_share.max_cpu_time = Some(100);

    let scaled = |max| {
        let mut job = cpu_job(None, Some(max));
        job.resources.total_cpu_time.benchmark = Some(("B".to_string(), 50.0));
        job
    };
    assert!(!accepts(&target, &scaled(210)));
    assert!(accepts(&target, &scaled(200)));
    assert!(accepts(&target, &scaled(190)));
}

#[test]
fn test_clock_rate_scaled_bound() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.execution_environment.cpu_clock_speed_mhz = Some(2500.0);
    target.computing_share.max_cpu_time = Some(100);

    let scaled = |max| {
        let mut job = cpu_job(None, Some(max));
        job.resources.total_cpu_time.benchmark = Some((CLOCK_RATE.to_string(), 1000.0));
        job
    };
    assert!(!accepts(&target, &scaled(300)));
    assert!(accepts(&target, &scaled(250)));
    assert!(accepts(&target, &scaled(200)));
}

#[test]
fn test_unknown_benchmark_uses_unit_factor() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.computing_share.max_cpu_time = Some(100);

    let mut job = cpu_job(None, Some(150));
    job.resources.total_cpu_time.benchmark = Some(("missing".to_string(), 50.0));
    assert!(!accepts(&target, &job));

    let mut zero = cpu_job(None, Some(100));
    zero.resources.total_cpu_time.benchmark = Some(("B".to_string(), 0.0));
    assert!(accepts(&target.clone().with_benchmark("B", 100.0), &zero));
}

#[test]
fn test_wall_time_checked_independently() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex");
    target.computing_share.max_cpu_time = Some(1000);
    target.computing_share.max_wall_time = Some(100);

    let mut job = cpu_job(None, Some(500));
    assert!(accepts(&target, &job));
    job.resources.total_wall_time.range.max = Some(200);
    assert!(!accepts(&target, &job));
}

#[test]
fn test_reject_by_url() {
    let a = ExecutionTarget::new("https://a.example.org/arex");
    let b = ExecutionTarget::new("https://b.example.org/arex");
    let targets = vec![a, b];
    let job = JobDescription::default();

    let mut broker = Broker::default();
    let possible = broker.prefilter_targets(&targets, &job, &["https://a.example.org/arex"]);
    assert_eq!(possible.len(), 1);
    assert_eq!(possible[0].url(), "https://b.example.org/arex");

    let possible = broker.prefilter_targets(
        &targets,
        &job,
        &["https://a.example.org/arex", "https://b.example.org/arex"],
    );
    assert!(possible.is_empty());
    assert!(broker.best_target().is_none());
}

#[test]
fn test_max_slots_per_job_filter() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex").with_slots(10, 0, 0);
    target.computing_share.max_slots_per_job = Some(5);

    let mut job = JobDescription::default();
    job.resources.slot_requirement.number_of_slots = 6;
    assert!(!accepts(&target, &job));
    job.resources.slot_requirement.number_of_slots = 5;
    assert!(accepts(&target, &job));
}

#[test]
fn test_published_negative_bounds_do_not_constrain() {
    let target: ExecutionTarget = serde_json::from_str(
        r#"{
            "computing_endpoint": {"url": "https://ce1.example.org/arex", "health_state": "ok"},
            "computing_share": {
                "free_slots": 4,
                "max_slots_per_job": -1,
                "min_cpu_time": -1,
                "max_cpu_time": -1,
                "min_wall_time": -1,
                "max_wall_time": -1
            }
        }"#,
    )
    .unwrap();

    let mut job = cpu_job(None, Some(100));
    job.resources.total_wall_time.range.max = Some(100);
    job.resources.slot_requirement.number_of_slots = 16;
    assert!(accepts(&target, &job));

    let open_min: JobDescription =
        serde_json::from_str(r#"{"resources": {"total_cpu_time": {"range": {"min": -1}}}}"#)
            .unwrap();
    let mut bounded = target.clone();
    bounded.computing_share.min_cpu_time = Some(60);
    assert!(accepts(&bounded, &open_min));
}

#[test]
fn test_slot_booking_then_queuing() {
    let mut target = ExecutionTarget::new("https://ce1.example.org/arex").with_slots(7, 10, 0);
    target.computing_share.max_slots_per_job = Some(5);

    let mut job = JobDescription::default();
    job.resources.slot_requirement.number_of_slots = 4;

    let mut broker = Broker::default();
    broker.prefilter_targets(&[target], &job, NO_REJECT);
    assert!(broker.best_target().is_some());

    assert_eq!(broker.register_job_submission(), Booking::Reserved);
    let share = &broker.selected().unwrap().computing_share;
    assert_eq!(
        (share.free_slots, share.used_slots, share.waiting_jobs),
        (3, 14, 0)
    );

    assert_eq!(broker.register_job_submission(), Booking::Queued);
    let share = &broker.selected().unwrap().computing_share;
    assert_eq!(
        (share.free_slots, share.used_slots, share.waiting_jobs),
        (3, 14, 4)
    );
}

#[test]
fn test_booking_without_selection() {
    let mut broker = Broker::default();
    assert_eq!(broker.register_job_submission(), Booking::NoSelection);

    let target = ExecutionTarget::new("https://ce1.example.org/arex").with_slots(4, 0, 0);
    broker.prefilter_targets(&[target], &JobDescription::default(), NO_REJECT);
    // Prefiltering alone does not select.
    assert_eq!(broker.register_job_submission(), Booking::NoSelection);
}

#[test]
fn test_booking_rejected_without_free_slots() {
    let target = ExecutionTarget::new("https://ce1.example.org/arex").with_slots(2, 8, 0);
    let mut job = JobDescription::default();
    job.resources.slot_requirement.number_of_slots = 4;

    let mut broker = Broker::default();
    broker.prefilter_targets(&[target], &job, NO_REJECT);
    broker.best_target();

    assert_eq!(broker.register_job_submission(), Booking::Rejected);
    let share = &broker.selected().unwrap().computing_share;
    assert_eq!(
        (share.free_slots, share.used_slots, share.waiting_jobs),
        (2, 8, 0)
    );
}

#[test]
fn test_new_selection_books_again() {
    let target = ExecutionTarget::new("https://ce1.example.org/arex").with_slots(3, 0, 0);
    let mut broker = Broker::default();
    broker.prefilter_targets(&[target], &JobDescription::default(), NO_REJECT);

    for expected_free in [2, 1, 0] {
        broker.best_target();
        assert_eq!(broker.register_job_submission(), Booking::Reserved);
        assert_eq!(
            broker.selected().unwrap().computing_share.free_slots,
            expected_free
        );
    }
    broker.best_target();
    assert_eq!(broker.register_job_submission(), Booking::Rejected);
}

#[test]
fn test_bookings_spread_over_targets() {
    let targets = vec![
        ExecutionTarget::new("https://a.example.org/arex").with_slots(2, 0, 0),
        ExecutionTarget::new("https://b.example.org/arex").with_slots(2, 0, 0),
    ];
    let mut broker = Broker::default();
    broker.prefilter_targets(&targets, &JobDescription::default(), NO_REJECT);

    let mut picked = Vec::new();
    for _ in 0..4 {
        picked.push(broker.best_target().unwrap().url().to_string());
        assert_eq!(broker.register_job_submission(), Booking::Reserved);
    }
    assert_eq!(
        picked,
        vec![
            "https://a.example.org/arex",
            "https://b.example.org/arex",
            "https://a.example.org/arex",
            "https://b.example.org/arex",
        ]
    );
}

#[test]
fn test_descriptions_select_different_queues() {
    let targets = vec![
        ExecutionTarget::new("https://ce1.example.org/arex")
            .with_queue("short")
            .with_slots(10, 0, 0),
        ExecutionTarget::new("https://ce1.example.org/arex")
            .with_queue("long")
            .with_slots(2, 0, 0),
    ];
    let mut broker = Broker::default();

    broker.prefilter_targets(&targets, &job_with_queue("long"), NO_REJECT);
    assert_eq!(broker.best_target().unwrap().computing_share.name, "long");

    broker.prefilter_targets(&targets, &job_with_queue("short"), NO_REJECT);
    assert_eq!(broker.best_target().unwrap().computing_share.name, "short");

    broker.prefilter_targets(&targets, &job_rejecting("short"), NO_REJECT);
    assert_eq!(broker.best_target().unwrap().computing_share.name, "long");
}

#[test]
fn test_ranking_is_deterministic() {
    let targets = vec![
        ExecutionTarget::new("https://c.example.org/arex").with_slots(5, 0, 1),
        ExecutionTarget::new("https://a.example.org/arex").with_slots(5, 0, 1),
        ExecutionTarget::new("https://b.example.org/arex").with_slots(5, 0, 0),
    ];
    let job = JobDescription::default();

    let order = |targets: &[ExecutionTarget]| {
        let mut broker = Broker::default();
        broker.prefilter_targets(targets, &job, NO_REJECT);
        broker.best_target();
        broker
            .possible_targets()
            .iter()
            .map(|t| t.url().to_string())
            .collect::<Vec<_>>()
    };

    let expected = vec![
        "https://b.example.org/arex",
        "https://a.example.org/arex",
        "https://c.example.org/arex",
    ];
    assert_eq!(order(&targets), expected);

    let mut reversed = targets.clone();
    reversed.reverse();
    assert_eq!(order(&reversed), expected);
}

#[test]
fn test_shortest_queue_ranker() {
    let mut busy = ExecutionTarget::new("https://busy.example.org/arex").with_slots(50, 0, 40);
    busy.computing_manager.total_slots = Some(100);
    let mut quiet = ExecutionTarget::new("https://quiet.example.org/arex").with_slots(1, 0, 1);
    quiet.computing_manager.total_slots = Some(10);
    let unknown = ExecutionTarget::new("https://unknown.example.org/arex").with_slots(99, 0, 0);

    let mut broker = Broker::with_kind(&RankerKind::ShortestQueue);
    broker.prefilter_targets(&[busy, unknown, quiet], &JobDescription::default(), NO_REJECT);
    broker.best_target();
    let order: Vec<&str> = broker.possible_targets().iter().map(|t| t.url()).collect();
    assert_eq!(
        order,
        vec![
            "https://quiet.example.org/arex",
            "https://busy.example.org/arex",
            "https://unknown.example.org/arex",
        ]
    );
}

#[test]
fn test_benchmark_ranker() {
    let targets = vec![
        ExecutionTarget::new("https://slow.example.org/arex").with_benchmark("specint2000", 900.0),
        ExecutionTarget::new("https://none.example.org/arex").with_slots(100, 0, 0),
        ExecutionTarget::new("https://fast.example.org/arex").with_benchmark("specint2000", 2400.0),
    ];
    let kind: RankerKind = "benchmark:specint2000".parse().unwrap();
    let mut broker = Broker::with_kind(&kind);
    broker.prefilter_targets(&targets, &JobDescription::default(), NO_REJECT);

    assert_eq!(
        broker.best_target().unwrap().url(),
        "https://fast.example.org/arex"
    );
    let last = broker.possible_targets().last().unwrap();
    assert_eq!(last.url(), "https://none.example.org/arex");
}
