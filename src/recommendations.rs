//! Coffee-chat recommendations client.
//!
//! Scoring happens server-side; the client only requests the list for a
//! profile and orders it by descending likelihood.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Serialize)]
pub struct RecommendationRequest {
    pub user: String,
}

/// `common_aspects` arrives either as a list or as one string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommonAspects {
    List(Vec<String>),
    Text(String),
}

impl Default for CommonAspects {
    fn default() -> Self {
        CommonAspects::List(Vec::new())
    }
}

impl CommonAspects {
    pub fn joined(&self) -> String {
        match self {
            CommonAspects::List(items) => items.join(", "),
            CommonAspects::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub coffee_chat_likelihood: Option<f64>,
    #[serde(default)]
    pub common_aspects: CommonAspects,
    #[serde(default)]
    pub what_you_can_learn_from_them: String,
    #[serde(default)]
    pub what_they_can_learn_from_you: String,
}

impl Recommendation {
    /// Likelihood as a whole percentage, when present.
    pub fn likelihood_percent(&self) -> Option<u32> {
        self.coffee_chat_likelihood
            .map(|l| (l * 100.0).round().clamp(0.0, u32::MAX as f64) as u32)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Sort by descending likelihood; a missing likelihood counts as zero.
pub fn rank(mut recs: Vec<Recommendation>) -> Vec<Recommendation> {
    recs.sort_by(|a, b| {
        let la = a.coffee_chat_likelihood.unwrap_or(0.0);
        let lb = b.coffee_chat_likelihood.unwrap_or(0.0);
        lb.partial_cmp(&la).unwrap_or(Ordering::Equal)
    });
    recs
}

#[derive(Debug, Clone)]
pub struct RecommendationClient {
    base_url: String,
    client: reqwest::Client,
}

impl RecommendationClient {
    /// Scoring can take tens of seconds, hence the long request timeout.
    pub fn with_defaults(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Request recommendations for `user`. Never fails: problems come back
    /// in `error` with an empty list, and successful lists are ranked.
    pub async fn fetch(&self, user: &str) -> RecommendationResponse {
        let url = format!("{}/api/recommendations", self.base_url);
        let resp = match self
            .client
            .post(&url)
            .json(&RecommendationRequest { user: user.to_string() })
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "recommendations request failed");
                return RecommendationResponse {
                    recommendations: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or("Server error").to_string();
        let parsed = resp.json::<RecommendationResponse>().await;

        match parsed {
            Ok(body) if status.is_success() => RecommendationResponse {
                recommendations: rank(body.recommendations),
                error: body.error,
            },
            Ok(body) => RecommendationResponse {
                recommendations: Vec::new(),
                error: Some(body.error.unwrap_or(reason)),
            },
            Err(_) => RecommendationResponse {
                recommendations: Vec::new(),
                error: Some(reason),
            },
        }
    }
}
