use std::sync::atomic::{AtomicUsize, Ordering};

use client_logging::{client_info, client_trace, client_warn};
use url::Url;

use crate::error::{map_reqwest_error, ClientError, EndpointFailure, ErrorKind};

/// Ordered candidate base URLs for the backend.
///
/// Requests start at the candidate that last answered. Only transport failures
/// (connect errors, timeouts) move on to the next candidate; any HTTP response,
/// successful or not, ends the walk.
#[derive(Debug)]
pub struct EndpointSet {
    candidates: Vec<Url>,
    preferred: AtomicUsize,
}

impl EndpointSet {
    pub fn new(candidates: Vec<Url>) -> Result<Self, ClientError> {
        if candidates.is_empty() {
            return Err(ClientError::new(
                ErrorKind::Config,
                "at least one backend URL is required",
            ));
        }
        if let Some(bad) = candidates.iter().find(|url| url.cannot_be_a_base()) {
            return Err(ClientError::new(
                ErrorKind::Config,
                format!("{bad} cannot be used as a base URL"),
            ));
        }
        Ok(Self {
            candidates,
            preferred: AtomicUsize::new(0),
        })
    }

    /// The candidate the next request will try first.
    pub fn preferred(&self) -> &Url {
        &self.candidates[self.preferred.load(Ordering::Relaxed) % self.candidates.len()]
    }

    /// Sends the request `build` produces for each candidate until one answers.
    pub async fn send<F>(
        &self,
        segments: &[&str],
        build: F,
    ) -> Result<reqwest::Response, ClientError>
    where
        F: Fn(Url) -> reqwest::RequestBuilder,
    {
        let count = self.candidates.len();
        let start = self.preferred.load(Ordering::Relaxed) % count;
        let mut attempts = Vec::new();

        for offset in 0..count {
            let index = (start + offset) % count;
            let base = &self.candidates[index];
            let url = endpoint_url(base, segments);
            client_trace!("Sending request to {}", url);

            match build(url).send().await {
                Ok(response) => {
                    if index != start {
                        client_info!("Backend endpoint switched to {}", base);
                        self.preferred.store(index, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    client_warn!("Backend endpoint {} unreachable: {}", base, err);
                    attempts.push(EndpointFailure {
                        base: base.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(map_reqwest_error(err)),
            }
        }

        Err(ClientError::new(
            ErrorKind::EndpointsExhausted { attempts },
            "Unable to reach the server. Please try again.",
        ))
    }
}

/// Appends path segments to a base URL, percent-encoding each one.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
