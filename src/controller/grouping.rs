use std::collections::BTreeMap;

use url::Url;

use crate::job::Job;

/// Partition `jobs` by the endpoint `key` returns for each of them.
///
/// Every remote round trip of a bulk operation is issued per group, which
/// keeps the number of remote calls proportional to the number of distinct
/// hosts rather than the number of jobs. Groups come out in key order and
/// keep the input order within a group.
pub fn group_by_endpoint<'a, I, F>(jobs: I, key: F) -> BTreeMap<String, Vec<&'a mut Job>>
where
    I: IntoIterator<Item = &'a mut Job>,
    F: Fn(&Job) -> String,
{
    let mut groups: BTreeMap<String, Vec<&'a mut Job>> = BTreeMap::new();
    for job in jobs {
        groups.entry(key(&*job)).or_default().push(job);
    }
    groups
}

/// `scheme://host:port/path` of a URL, dropping query and fragment.
pub fn endpoint_key(url: &Url) -> String {
    let mut key = host_key(url);
    key.push_str(url.path());
    key
}

/// `scheme://host:port` of a URL. The port is included only when known.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, manager: &str) -> Job {
        Job::new(id, "EMIES", Url::parse(manager).unwrap())
    }

    #[test]
    fn groups_by_key_preserving_order() {
        let mut jobs = vec![
            job("https://b/1", "https://b/arex"),
            job("https://a/1", "https://a/arex"),
            job("https://b/2", "https://b/arex"),
            job("https://a/2", "https://a/arex"),
            job("https://b/3", "https://b/arex"),
        ];

        let groups = group_by_endpoint(jobs.iter_mut(), |j| j.management_url.to_string());
        let summary: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(|j| j.job_id.as_str()).collect()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("https://a/arex", vec!["https://a/1", "https://a/2"]),
                ("https://b/arex", vec!["https://b/1", "https://b/2", "https://b/3"]),
            ]
        );
    }

    #[test]
    fn empty_input_gives_no_groups() {
        let mut jobs: Vec<Job> = Vec::new();
        assert!(group_by_endpoint(jobs.iter_mut(), |j| j.job_id.clone()).is_empty());
    }

    #[test]
    fn endpoint_key_drops_query() {
        let url = Url::parse(
            "ldap://ce.example.org:2135/Mds-Vo-name=local,o=grid??sub?(nordugrid-job-globalid=x)",
        )
        .unwrap();
        assert_eq!(
            endpoint_key(&url),
            "ldap://ce.example.org:2135/Mds-Vo-name=local,o=grid"
        );
    }

    #[test]
    fn host_key_uses_default_port() {
        let url = Url::parse("https://ce.example.org/arex/abc").unwrap();
        assert_eq!(host_key(&url), "https://ce.example.org:443");
        let url = Url::parse("gsiftp://ce.example.org:2811/jobs/1").unwrap();
        assert_eq!(host_key(&url), "gsiftp://ce.example.org:2811");
    }
}
