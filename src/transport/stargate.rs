// Stargate quote service client
// This file implements the route fetcher: one GET against the Stargate
// `/routes` (or `/quotes`) endpoint, with classified transport, upstream and
// response-format errors and no local retries
//
// Numan Thabit 2025 Nov

use crate::errors::FetchError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::router::routes::{Route, RoutesResponse, TransferRequest};
use crate::router::validation::validate_transfer_request;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://stargate.finance/api/v1";

/// Which listing endpoint to query. Both return the same route shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteEndpoint {
    #[default]
    Routes,
    Quotes,
}

impl RouteEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            RouteEndpoint::Routes => "routes",
            RouteEndpoint::Quotes => "quotes",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteFetcher {
    base: Url,
    endpoint: RouteEndpoint,
    client: reqwest::Client,
}

impl RouteFetcher {
    pub fn new(base: Url, endpoint: RouteEndpoint, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Transport {
                status: None,
                message: format!("build HTTP client: {e}"),
            })?;
        Ok(Self {
            base,
            endpoint,
            client,
        })
    }

    /// Full URL of the listing endpoint.
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), self.endpoint.path());
        url.set_path(&path);
        url
    }

    /// Fetch candidate routes for `request`. Zero routes is not an error.
    #[tracing::instrument(skip_all, fields(src = %request.src_chain_key, dst = %request.dst_chain_key))]
    pub async fn fetch(&self, request: &TransferRequest) -> Result<Vec<Route>, FetchError> {
        validate_transfer_request(request).into_result()?;

        let method = self.endpoint.path();
        let _timer = REQ_LATENCY
            .with_label_values(&["stargate", method])
            .start_timer();
        let result = self.fetch_inner(request).await;
        match &result {
            Ok(routes) => info!(routes = routes.len(), "stargate routes fetched"),
            Err(err) => {
                REQ_ERRORS.with_label_values(&["stargate", method]).inc();
                warn!(error = %err, "stargate route fetch failed");
            }
        }
        result
    }

    async fn fetch_inner(&self, request: &TransferRequest) -> Result<Vec<Route>, FetchError> {
        let url = self.url();
        debug!(url = %url, "requesting stargate routes");
        let response = self
            .client
            .get(url)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            status: Some(status.as_u16()),
            message: format!("read body: {e}"),
        })?;
        parse_routes(status, &body)
    }
}

/// Classify a response and decode its route list.
pub fn parse_routes(status: StatusCode, body: &str) -> Result<Vec<Route>, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Upstream {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    if body.trim().is_empty() {
        return Err(FetchError::ResponseFormat("empty response body".to_string()));
    }
    let parsed: RoutesResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::ResponseFormat(format!("decode routes: {e}")))?;
    parsed.into_routes().ok_or_else(|| {
        FetchError::ResponseFormat("response has neither `routes` nor `quotes`".to_string())
    })
}
