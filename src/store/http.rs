use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::{
    error::StoreError,
    models::{SessionDetails, SessionEnvelope, StartSession, TimerSession},
    settings::ApiSettings,
};

use super::SessionStore;

/// REST client for the session backend. Authenticates with the `token`
/// cookie the backend issues at login.
#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSessionStore {
    pub fn new(settings: &ApiSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("focus-timer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.token {
            request = request.header(header::COOKIE, format!("token={token}"));
        }
        request
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut request = self.request(method.clone(), path);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{method} {path}");
        let response = request.send().await?;
        check_status(response, id).await
    }

    async fn send_session<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        id: Option<&str>,
    ) -> Result<TimerSession, StoreError> {
        let text = self.send(method, path, Some(body), id).await?;
        decode::<SessionEnvelope>(&text).map(SessionEnvelope::into_session)
    }
}

async fn check_status(response: Response, id: Option<&str>) -> Result<String, StoreError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        return Ok(text);
    }

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
    }

    Err(StoreError::Api {
        status: status.as_u16(),
        message: error_message(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        }),
    })
}

/// The backend reports failures as `{"message": "..."}`.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn start(&self, request: &StartSession) -> Result<TimerSession, StoreError> {
        self.send_session(Method::POST, "timers/start", request, None)
            .await
    }

    async fn pause(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let body = json!({ "elapsedTime": elapsed_time });
        self.send_session(Method::PUT, &format!("timers/{id}/pause"), &body, Some(id))
            .await
    }

    async fn stop(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let body = json!({ "elapsedTime": elapsed_time });
        self.send_session(Method::PUT, &format!("timers/{id}/stop"), &body, Some(id))
            .await
    }

    async fn complete(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let body = json!({ "elapsedTime": elapsed_time });
        self.send_session(Method::PUT, &format!("timers/{id}/complete"), &body, Some(id))
            .await
    }

    async fn rename(&self, id: &str, name: &str) -> Result<TimerSession, StoreError> {
        let body = json!({ "name": name });
        self.send_session(Method::PUT, &format!("timers/{id}"), &body, Some(id))
            .await
    }

    async fn update_details(
        &self,
        id: &str,
        details: &SessionDetails,
    ) -> Result<TimerSession, StoreError> {
        self.send_session(Method::PUT, &format!("timers/{id}/details"), details, Some(id))
            .await
    }

    async fn delete(&self, id: &str) -> Result<String, StoreError> {
        self.send::<()>(Method::DELETE, &format!("timers/{id}"), None, Some(id))
            .await?;
        Ok(id.to_string())
    }

    async fn list(&self) -> Result<Vec<TimerSession>, StoreError> {
        let text = self.send::<()>(Method::GET, "timers/me", None, None).await?;
        decode(&text)
    }
}
