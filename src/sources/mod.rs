//! Upstream sources
//!
//! HTTP clients for every upstream the resolver consults, plus the pure
//! extraction logic that turns their payloads into descriptors. Extraction
//! functions take `now` explicitly so they can be tested without a clock.
//!
//! All requests are bounded by the client timeout chosen from
//! [`CallContext`]. A request that times out is dropped and reported as a
//! transport error.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::errors::{SourceError, SourceResult};

pub mod holodex;
pub mod live_page;
pub mod traits;
pub mod twitter;
pub mod youtube;

pub use traits::*;

/// Where an upstream call originates, which decides its timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallContext {
    /// Serving a user-facing request
    Serving,
    /// Background or administrative work
    Background,
}

/// Build the shared HTTP client for a call context
pub fn build_http_client(config: &Config, context: CallContext) -> SourceResult<Client> {
    let timeout = match context {
        CallContext::Serving => config.upstream.serving_timeout(),
        CallContext::Background => config.upstream.background_timeout(),
    };

    Client::builder()
        .timeout(timeout)
        .user_agent(config.upstream.user_agent.clone())
        .build()
        .map_err(|e| SourceError::transport("http client", e.to_string()))
}

/// The full set of upstream sources used by the resolver
#[derive(Clone)]
pub struct SourceSet {
    pub live_page: Arc<dyn LivePageSource>,
    pub aggregator: Arc<dyn AggregatorSource>,
    pub social: Arc<dyn SocialTimelineSource>,
    pub video_metadata: Arc<dyn VideoMetadataSource>,
}

impl SourceSet {
    /// HTTP-backed sources sharing one client
    pub fn http(config: &Config, context: CallContext) -> SourceResult<Self> {
        let client = build_http_client(config, context)?;
        let upstream = &config.upstream;

        Ok(Self {
            live_page: Arc::new(live_page::YoutubeLivePage::new(
                client.clone(),
                upstream.live_page_base_url.clone(),
                config.resolver.page_lead_time(),
            )),
            aggregator: Arc::new(holodex::HolodexClient::new(
                client.clone(),
                upstream.aggregator_base_url.clone(),
                upstream.aggregator_api_key.clone(),
            )),
            social: Arc::new(twitter::TwitterTimeline::new(
                client.clone(),
                upstream.social_base_url.clone(),
                upstream.social_bearer_token.clone(),
            )),
            video_metadata: Arc::new(youtube::YoutubeDataApi::new(
                client,
                upstream.video_api_base_url.clone(),
                upstream.video_api_key.clone(),
            )),
        })
    }
}

/// Send a request and insist on a 200 response
pub(crate) async fn send_expecting_ok(request: RequestBuilder, source_name: &str) -> SourceResult<Response> {
    debug!("[{}] request enter", source_name);
    let result = request.send().await;
    debug!("[{}] request exit", source_name);

    let response = result.map_err(|e| SourceError::from_reqwest(source_name, e))?;
    if response.status() != StatusCode::OK {
        return Err(SourceError::transport(
            source_name,
            format!("HTTP status: {}", response.status().as_u16()),
        ));
    }
    Ok(response)
}

/// Decode a JSON body, reporting structural problems as parse errors
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    source_name: &str,
) -> SourceResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| SourceError::from_reqwest(source_name, e))?;
    serde_json::from_slice(&body).map_err(|e| SourceError::parse(source_name, e.to_string()))
}
