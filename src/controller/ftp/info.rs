use chrono::{DateTime, NaiveDateTime, Utc};

use crate::controller::ftp::state::state_map;
use crate::job::Job;
use crate::remote::InfoRecord;

pub const GLOBAL_ID: &str = "nordugrid-job-globalid";

/// Parse an information system timestamp (`20240115103000Z`).
pub fn parse_mds_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%SZ")
        .ok()
        .map(|t| t.and_utc())
}

fn text(record: &InfoRecord, key: &str) -> Option<String> {
    record.get(key).map(str::to_string)
}

fn number<T: std::str::FromStr>(record: &InfoRecord, key: &str) -> Option<T> {
    record.get(key).and_then(|v| v.trim().parse().ok())
}

/// Usage figures are published in minutes. Values too large to express in
/// seconds are dropped.
fn minutes(record: &InfoRecord, key: &str) -> Option<u64> {
    number::<u64>(record, key).and_then(|m| m.checked_mul(60))
}

/// Copy every attribute present in `record` onto `job`. Attributes the
/// record does not carry leave the job's value untouched.
pub fn apply_record(job: &mut Job, record: &InfoRecord) {
    if let Some(status) = record.get("nordugrid-job-status") {
        job.set_state(status, state_map(status));
    }

    macro_rules! set {
        ($field:ident, $value:expr) => {
            if let Some(v) = $value {
                job.$field = Some(v);
            }
        };
    }

    set!(owner, text(record, "nordugrid-job-globalowner"));
    set!(execution_ce, text(record, "nordugrid-job-execcluster"));
    set!(queue, text(record, "nordugrid-job-execqueue"));
    set!(submission_host, text(record, "nordugrid-job-submissionui"));
    set!(
        submission_time,
        record
            .get("nordugrid-job-submissiontime")
            .and_then(parse_mds_time)
    );
    set!(
        end_time,
        record
            .get("nordugrid-job-completiontime")
            .and_then(parse_mds_time)
    );
    set!(used_slots, number(record, "nordugrid-job-cpucount"));
    set!(used_cpu_time, minutes(record, "nordugrid-job-usedcputime"));
    set!(used_wall_time, minutes(record, "nordugrid-job-usedwalltime"));
    set!(used_memory, number(record, "nordugrid-job-usedmem"));
    set!(exit_code, number(record, "nordugrid-job-exitcode"));
    set!(waiting_position, number(record, "nordugrid-job-queuerank"));
    set!(stdin, text(record, "nordugrid-job-stdin"));
    set!(stdout, text(record, "nordugrid-job-stdout"));
    set!(stderr, text(record, "nordugrid-job-stderr"));
    set!(restart_state, text(record, "nordugrid-job-rerunable"));
    set!(other_messages, text(record, "nordugrid-job-comment"));
    set!(name, text(record, "nordugrid-job-jobname"));
    set!(log_dir, text(record, "nordugrid-job-gmlog"));

    let errors = record.all("nordugrid-job-errors");
    if !errors.is_empty() {
        job.errors = errors.to_vec();
    }
    let nodes = record.all("nordugrid-job-executionnodes");
    if !nodes.is_empty() {
        job.execution_nodes = nodes.to_vec();
    }
}

/// Pull the client's own description out of the description file the site
/// stores, which wraps it as a quoted `clientxrsl` attribute with doubled
/// quotes.
pub fn extract_client_description(stored: &str) -> Option<String> {
    let marker = stored.find("clientxrsl")?;
    let start = marker + stored[marker..].find('&')?;
    let end = start + stored[start..].find(")\"")?;
    Some(stored[start..=end].replace("\"\"", "\""))
}
