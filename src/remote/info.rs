use std::collections::BTreeMap;

use async_trait::async_trait;
use url::Url;

use crate::remote::TransportError;

/// Selects the records of a set of jobs in one information query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoFilter {
    pub job_ids: Vec<String>,
}

impl InfoFilter {
    /// Merge the ids of every job at one endpoint into a single filter.
    pub fn any_of<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            job_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.job_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }
}

/// One entry of an information query answer: a set of multi-valued
/// attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoRecord {
    attributes: BTreeMap<String, Vec<String>>,
}

impl InfoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// First value of an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn all(&self, key: &str) -> &[String] {
        self.attributes
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait InfoQuery: Send + Sync {
    /// Run one query against `endpoint` and return every matching record.
    async fn query(
        &self,
        endpoint: &Url,
        filter: &InfoFilter,
    ) -> Result<Vec<InfoRecord>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_multi_values() {
        let record = InfoRecord::new()
            .with("nordugrid-job-executionnodes", "wn01")
            .with("nordugrid-job-executionnodes", "wn02")
            .with("nordugrid-job-status", "INLRMS:R");

        assert_eq!(record.get("nordugrid-job-status"), Some("INLRMS:R"));
        assert_eq!(record.get("nordugrid-job-executionnodes"), Some("wn01"));
        assert_eq!(record.all("nordugrid-job-executionnodes").len(), 2);
        assert!(record.get("nordugrid-job-exitcode").is_none());
        assert!(record.all("nordugrid-job-errors").is_empty());
    }

    #[test]
    fn filter_from_ids() {
        let filter = InfoFilter::any_of(["a", "b"]);
        assert_eq!(filter.len(), 2);
        assert!(!filter.is_empty());
        assert!(InfoFilter::default().is_empty());
    }
}
