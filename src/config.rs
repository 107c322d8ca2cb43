use std::path::PathBuf;
use std::time::Duration;

use crate::broker::RankerKind;

/// Credential material handed to control connections and data transfers.
///
/// The paths are passed through untouched; loading and validating proxies is
/// the job of the transport that receives them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Path to a proxy certificate (PEM format).
    /// Takes precedence over `cert_path`/`key_path` when set.
    pub proxy_path: Option<PathBuf>,

    /// Path to the user certificate (PEM format).
    pub cert_path: Option<PathBuf>,

    /// Path to the user private key (PEM format).
    pub key_path: Option<PathBuf>,

    /// Directory holding trusted CA certificates.
    pub ca_dir: Option<PathBuf>,
}

impl Credentials {
    /// Check whether any credential is configured at all.
    pub fn is_empty(&self) -> bool {
        self.proxy_path.is_none() && self.cert_path.is_none() && self.key_path.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound applied to every connection attempt and every remote command.
    pub timeout: Duration,
    /// File-backed list of managed jobs.
    pub joblist: PathBuf,
    pub credentials: Credentials,
    pub ranker: RankerKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            joblist: PathBuf::from("jobs.json"),
            credentials: Credentials::default(),
            ranker: RankerKind::FreeSlots,
        }
    }
}

impl ClientConfig {
    pub fn new(joblist: PathBuf) -> Self {
        Self {
            joblist,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_ranker(mut self, ranker: RankerKind) -> Self {
        self.ranker = ranker;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_default() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.timeout, Duration::from_secs(20));
        assert_eq!(cfg.joblist, PathBuf::from("jobs.json"));
        assert!(cfg.credentials.is_empty());
        assert_eq!(cfg.ranker, RankerKind::FreeSlots);
    }

    #[test]
    fn client_config_builders() {
        let creds = Credentials {
            proxy_path: Some(PathBuf::from("/tmp/x509up_u1000")),
            ..Default::default()
        };
        let cfg = ClientConfig::new(PathBuf::from("/var/lib/grid/jobs.json"))
            .with_timeout(Duration::from_millis(500))
            .with_credentials(creds.clone())
            .with_ranker(RankerKind::ShortestQueue);

        assert_eq!(cfg.joblist, PathBuf::from("/var/lib/grid/jobs.json"));
        assert_eq!(cfg.timeout, Duration::from_millis(500));
        assert_eq!(cfg.credentials, creds);
        assert_eq!(cfg.ranker, RankerKind::ShortestQueue);
    }

    #[test]
    fn credentials_is_empty() {
        assert!(Credentials::default().is_empty());

        let creds = Credentials {
            ca_dir: Some(PathBuf::from("/etc/grid-security/certificates")),
            ..Default::default()
        };
        // A CA directory alone does not identify the user.
        assert!(creds.is_empty());

        let creds = Credentials {
            cert_path: Some(PathBuf::from("/home/u/.globus/usercert.pem")),
            key_path: Some(PathBuf::from("/home/u/.globus/userkey.pem")),
            ..Default::default()
        };
        assert!(!creds.is_empty());
    }
}
