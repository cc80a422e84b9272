//! HTTP action gateway.
//!
//! [`HttpActionGateway`] is the single client for every backend service.
//! It turns an [`Action`] into exactly one logical remote call (see
//! [`Action::request`]), forwards the caller's identity as
//! `X-Organization-Id` / `X-User-Id`, and folds every outcome into an
//! [`ActionResult`]. Reads are retried on transient failures; writes are
//! attempted once so a timed-out create is never duplicated.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use org_assist_core::actions::{
    Action, ActionData, ActionGateway, ActionRequest, ActionResult, HttpMethod, Service,
};
use org_assist_core::error::EngineError;
use org_assist_core::models::Identity;

use crate::config::{GatewayConfig, ServiceUrls};
use crate::http::{is_transient, RetryPolicy};

pub struct HttpActionGateway {
    client: reqwest::Client,
    services: HashMap<Service, Url>,
    read_retry: RetryPolicy,
}

impl HttpActionGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            services: service_map(&config.services)?,
            read_retry: RetryPolicy::new(config.max_retries, Duration::from_millis(200)),
        })
    }

    fn url_for(&self, request: &ActionRequest) -> Result<Url> {
        let mut url = self
            .services
            .get(&request.service)
            .cloned()
            .ok_or_else(|| anyhow!("{} service is not configured", request.service.as_str()))?;

        url.path_segments_mut()
            .map_err(|_| anyhow!("{} service URL cannot take a path", request.service.as_str()))?
            .pop_if_empty()
            .extend(&request.path);

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    async fn send(&self, identity: &Identity, action: &Action) -> Result<ActionResult> {
        let request = action.request();
        let url = self.url_for(&request)?;
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
        };
        let retry = if action.operation().is_read() {
            self.read_retry
        } else {
            RetryPolicy::none()
        };

        let mut last_err = None;
        for attempt in 0..=retry.max_retries {
            retry.wait(attempt).await;

            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .header("X-Organization-Id", &identity.organization_id)
                .header("X-User-Id", &identity.user_id);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(action = action.name(), attempt, error = %e, "action request failed");
                    last_err = Some(anyhow!(e).context(format!(
                        "{} service unreachable",
                        request.service.as_str()
                    )));
                    continue;
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(action = action.name(), attempt, %status, error = %e, "action response cut off");
                    last_err = Some(anyhow!(e).context(format!(
                        "incomplete response from {} service ({})",
                        request.service.as_str(),
                        status
                    )));
                    continue;
                }
            };

            if status.is_success() {
                if text.trim().is_empty() {
                    return Ok(ActionResult {
                        success: true,
                        data: None,
                        error: None,
                    });
                }
                let body: Value = serde_json::from_str(&text)
                    .with_context(|| format!("invalid JSON from {} service", request.service.as_str()))?;
                return Ok(match ActionData::from_response(action.operation(), body) {
                    Ok(data) => ActionResult::ok(data),
                    Err(e) => ActionResult::err(format!(
                        "unexpected response from {} service: {}",
                        request.service.as_str(),
                        e
                    )),
                });
            }

            let message = format!(
                "{} service returned {}: {}",
                request.service.as_str(),
                status,
                error_message(&text)
            );
            if is_transient(status) {
                tracing::warn!(action = action.name(), attempt, %status, "action request failed");
                last_err = Some(anyhow!(message));
                continue;
            }
            return Ok(ActionResult::err(message));
        }

        Err(last_err.unwrap_or_else(|| anyhow!("action failed after retries")))
    }
}

#[async_trait]
impl ActionGateway for HttpActionGateway {
    async fn execute(&self, identity: &Identity, action: Action) -> ActionResult {
        match self.send(identity, &action).await {
            Ok(result) => {
                tracing::debug!(action = action.name(), success = result.success, "action completed");
                result
            }
            Err(e) => {
                let chain = EngineError::describe(&e);
                tracing::warn!(action = action.name(), error = %chain, "action failed");
                ActionResult::err(chain)
            }
        }
    }
}

fn service_map(urls: &ServiceUrls) -> Result<HashMap<Service, Url>> {
    let mut services = HashMap::new();
    for service in Service::ALL {
        let configured = match service {
            Service::Project => &urls.project,
            Service::Client => &urls.client,
            Service::Workforce => &urls.workforce,
            Service::Communication => &urls.communication,
            Service::Knowledge => &urls.knowledge,
            Service::Notification => &urls.notification,
        };
        if let Some(raw) = configured {
            let url = Url::parse(raw)
                .with_context(|| format!("invalid gateway.services.{} URL: {}", service.as_str(), raw))?;
            services.insert(service, url);
        }
    }
    Ok(services)
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": …}}`, `{"error": "…"}` and
/// `{"message": "…"}`; anything else is returned as-is.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    json.pointer("/error/message")
        .or_else(|| json.get("error"))
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":"x","message":"project not found"}}"#),
            "project not found"
        );
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message(r#"{"message":"bad"}"#), "bad");
        assert_eq!(error_message("plain text\n"), "plain text");
    }

    #[test]
    fn test_url_building_encodes_segments() {
        let gateway = HttpActionGateway::new(&GatewayConfig {
            services: ServiceUrls {
                knowledge: Some("http://localhost:4005/api/".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

        let action = Action::GetWikiPage(org_assist_core::actions::params::ById {
            id: "a b".into(),
        });
        let url = gateway.url_for(&action.request()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4005/api/wiki-pages/a%20b");
    }

    #[test]
    fn test_unconfigured_service() {
        let gateway = HttpActionGateway::new(&GatewayConfig::default()).unwrap();
        let action = Action::ListTeams(Default::default());
        let err = gateway.url_for(&action.request()).unwrap_err();
        assert!(err.to_string().contains("workforce service is not configured"));
    }
}
