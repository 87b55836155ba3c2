//! HTTP SMS gateway client

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;

use super::SmsGateway;
use crate::config::SmsSettings;
use crate::error::{AlarmSrvError, Result};

/// JSON body expected by the gateway
#[derive(Debug, Serialize)]
pub struct SmsRequest<'a> {
    pub to: &'a str,
    pub content: &'a str,
}

/// Posts `{to, content}` with Basic auth; any 2xx counts as delivered
pub struct HttpSmsGateway {
    client: Client,
    uri: String,
    authorization: HeaderValue,
}

impl HttpSmsGateway {
    /// Only `POST` is supported; anything else is a configuration error.
    pub fn new(settings: SmsSettings) -> Result<Self> {
        if !settings.method.eq_ignore_ascii_case("POST") {
            return Err(AlarmSrvError::config(format!(
                "Unsupported SMS method: {} (only POST)",
                settings.method
            )));
        }
        if settings.uri.is_empty() {
            return Err(AlarmSrvError::config("SMS gateway uri is empty"));
        }

        let encoded = general_purpose::STANDARD.encode(settings.credentials.as_bytes());
        let mut authorization = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| AlarmSrvError::config(format!("Invalid SMS credentials: {e}")))?;
        authorization.set_sensitive(true);

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AlarmSrvError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            uri: settings.uri,
            authorization,
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        let body = SmsRequest {
            to: recipient,
            content: message,
        };

        let response = self
            .client
            .post(&self.uri)
            .header(AUTHORIZATION, self.authorization.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AlarmSrvError::delivery(
                "sms",
                format!("{recipient}: gateway returned HTTP {status}"),
            ))
        }
    }

    fn name(&self) -> &str {
        &self.uri
    }
}
