//! Outbound peer HTTP.
//!
//! Each call builds a fresh blocking client pinned to the addresses the
//! [`DomainGuard`] approved, so the dial can never land on an address the
//! guard has not seen. HTTPS is tried first; a transport failure falls back
//! to plain HTTP. Failures are logged once, after every candidate failed.

use crate::adapters::tls::build_tls_config;
use crate::domain::{DomainName, FetchError, ShutdownSignal};
use crate::ports::PeerTransport;
use crate::service::DomainGuard;
use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const SCHEMES: [&str; 2] = ["https", "http"];

/// Timeouts and redirect budget for [`RemoteInstanceClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub open_timeout: Duration,
    pub read_timeout: Duration,
    pub max_redirects: usize,
}

/// [`PeerTransport`] over reqwest + rustls.
pub struct RemoteInstanceClient {
    guard: DomainGuard,
    settings: HttpSettings,
    shutdown: ShutdownSignal,
}

enum Attempt<T> {
    Done(T),
    /// Connect/timeout/request failure; try the next scheme.
    Transport(String),
    /// The server answered but not usefully; do not fall back.
    Fatal(String),
}

impl RemoteInstanceClient {
    pub fn new(guard: DomainGuard, settings: HttpSettings, shutdown: ShutdownSignal) -> Self {
        Self {
            guard,
            settings,
            shutdown,
        }
    }

    fn client_for(&self, domain: &DomainName, addresses: &[IpAddr]) -> Result<Client, FetchError> {
        let tls = build_tls_config().map_err(|reason| FetchError::Failed {
            uri: domain.to_string(),
            reason,
        })?;
        let pinned: Vec<SocketAddr> = addresses.iter().map(|ip| SocketAddr::new(*ip, 0)).collect();
        let redirects = match self.settings.max_redirects {
            0 => Policy::none(),
            n => Policy::limited(n),
        };

        let mut builder = Client::builder()
            .use_preconfigured_tls(tls)
            .redirect(redirects)
            .connect_timeout(self.settings.open_timeout)
            .timeout(self.settings.read_timeout)
            .user_agent(concat!("potatomesh-federation/", env!("CARGO_PKG_VERSION")));
        if domain.ip().is_none() {
            builder = builder.resolve_to_addrs(domain.host(), &pinned);
        }
        builder.build().map_err(|e| FetchError::Failed {
            uri: domain.to_string(),
            reason: e.to_string(),
        })
    }

    /// Guard, pin, then run `attempt` against each candidate URL in order.
    fn with_candidates<T>(
        &self,
        domain: &DomainName,
        path: &str,
        attempt: impl Fn(&Client, Url) -> Attempt<T>,
    ) -> Result<T, FetchError> {
        if self.shutdown.is_raised() {
            return Err(FetchError::ShuttingDown);
        }
        let addresses = self.guard.check_domain(domain)?;
        if addresses.is_empty() {
            return Err(FetchError::Failed {
                uri: domain.to_string(),
                reason: "no addresses resolved".into(),
            });
        }
        let client = self.client_for(domain, &addresses)?;

        let mut failures = Vec::new();
        for url in candidate_urls(domain, path)? {
            if self.shutdown.is_raised() {
                return Err(FetchError::ShuttingDown);
            }
            let uri = url.to_string();
            match attempt(&client, url) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Transport(reason) => {
                    debug!(%uri, %reason, "peer request failed, trying next candidate");
                    failures.push((uri, reason));
                }
                Attempt::Fatal(reason) => {
                    failures.push((uri, reason));
                    break;
                }
            }
        }
        if self.shutdown.is_raised() {
            return Err(FetchError::ShuttingDown);
        }

        let summary = failures
            .iter()
            .map(|(uri, reason)| format!("{uri}: {reason}"))
            .collect::<Vec<_>>()
            .join("; ");
        warn!(%domain, failures = %summary, "peer request failed");
        let (uri, reason) = failures.pop().unwrap_or_else(|| (domain.to_string(), "no candidates".into()));
        Err(FetchError::Failed { uri, reason })
    }
}

/// `https://{authority}{path}` then `http://{authority}{path}`.
fn candidate_urls(domain: &DomainName, path: &str) -> Result<Vec<Url>, FetchError> {
    SCHEMES
        .iter()
        .map(|scheme| {
            let raw = format!("{scheme}://{}{path}", domain.as_str());
            Url::parse(&raw).map_err(|e| FetchError::Failed {
                uri: raw,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn classify<T>(err: reqwest::Error) -> Attempt<T> {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        Attempt::Transport(err.to_string())
    } else {
        Attempt::Fatal(err.to_string())
    }
}

fn require_success(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(format!("unexpected status {status}"))
    }
}

impl PeerTransport for RemoteInstanceClient {
    fn get_json(&self, domain: &DomainName, path: &str) -> Result<Value, FetchError> {
        self.with_candidates(domain, path, |client, url| {
            let response = match client.get(url).header("Accept", "application/json").send() {
                Ok(response) => response,
                Err(err) => return classify(err),
            };
            match require_success(response).and_then(|r| r.json::<Value>().map_err(|e| e.to_string())) {
                Ok(value) => Attempt::Done(value),
                Err(reason) => Attempt::Fatal(reason),
            }
        })
    }

    fn post_json(&self, domain: &DomainName, path: &str, body: &Value) -> Result<(), FetchError> {
        self.with_candidates(domain, path, |client, url| {
            let response = match client.post(url).json(body).send() {
                Ok(response) => response,
                Err(err) => return classify(err),
            };
            match require_success(response) {
                Ok(_) => Attempt::Done(()),
                Err(reason) => Attempt::Fatal(reason),
            }
        })
    }
}
