use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{GatewayError, Result};
use crate::models::{MovieDetails, MovieSummary, SearchResponse};
use crate::upstream::UpstreamError;

pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable. Please try again later.";

/// A payload that was either produced from upstream data or substituted for a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackResult<T> {
    Live(T),
    Degraded(T),
}

impl<T> FallbackResult<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FallbackResult::Degraded(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            FallbackResult::Live(value) | FallbackResult::Degraded(value) => value,
        }
    }

    pub fn as_inner(&self) -> &T {
        match self {
            FallbackResult::Live(value) | FallbackResult::Degraded(value) => value,
        }
    }
}

/// What an endpoint does when its upstream load fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Surface the failure as `UpstreamFailure`.
    Propagate,
    /// Answer with the type's degraded placeholder.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Details,
    Popular,
}

/// Failure handling per endpoint. Search and popular mask upstream failures,
/// details lookups report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPolicies {
    pub search: FailurePolicy,
    pub details: FailurePolicy,
    pub popular: FailurePolicy,
}

impl Default for EndpointPolicies {
    fn default() -> Self {
        Self {
            search: FailurePolicy::Degrade,
            details: FailurePolicy::Propagate,
            popular: FailurePolicy::Degrade,
        }
    }
}

impl EndpointPolicies {
    pub fn policy_for(&self, endpoint: Endpoint) -> FailurePolicy {
        match endpoint {
            Endpoint::Search => self.search,
            Endpoint::Details => self.details,
            Endpoint::Popular => self.popular,
        }
    }

    /// Apply the endpoint's policy to a load result.
    pub fn resolve<T: Degradable>(
        &self,
        endpoint: Endpoint,
        result: std::result::Result<T, UpstreamError>,
    ) -> Result<FallbackResult<T>> {
        match (result, self.policy_for(endpoint)) {
            (Ok(value), _) => Ok(FallbackResult::Live(value)),
            (Err(err), FailurePolicy::Propagate) => Err(GatewayError::UpstreamFailure(err)),
            (Err(err), FailurePolicy::Degrade) => {
                error!(?endpoint, error = %err, "Upstream call failed, serving degraded response");
                Ok(FallbackResult::Degraded(T::degraded(UNAVAILABLE_MESSAGE)))
            }
        }
    }
}

/// Types that have a structurally valid "nothing available" value.
pub trait Degradable {
    fn degraded(message: &str) -> Self;
}

impl Degradable for SearchResponse {
    fn degraded(message: &str) -> Self {
        SearchResponse {
            search: Vec::new(),
            total_results: Some("0".to_string()),
            response: "False".to_string(),
            error: Some(message.to_string()),
        }
    }
}

impl Degradable for MovieDetails {
    fn degraded(message: &str) -> Self {
        MovieDetails {
            response: "False".to_string(),
            error: Some(message.to_string()),
            ..MovieDetails::default()
        }
    }
}

impl Degradable for Vec<MovieSummary> {
    fn degraded(_message: &str) -> Self {
        Vec::new()
    }
}
