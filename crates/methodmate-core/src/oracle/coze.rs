use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use super::{ChatResponse, OracleClient, OracleError, OracleReply, OracleRequest};
use crate::OracleConfig;

/// Oracle backed by the Coze chat API (`/open_api/v2/chat`).
pub struct CozeOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    bot_id: String,
    user_id: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    bot_id: &'a str,
    user: &'a str,
    query: &'a str,
    stream: bool,
    conversation_id: &'a str,
}

impl CozeOracle {
    pub fn new(config: &OracleConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: format!("{}/open_api/v2/chat", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.clone().unwrap_or_default(),
            bot_id: config.bot_id.clone(),
            user_id: config.user_id.clone(),
            timeout: config.timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let body = ChatRequest {
            bot_id: &self.bot_id,
            user: &self.user_id,
            query: &request.prompt,
            stream: false,
            conversation_id: &request.conversation_id,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        check_response_status(&resp)?;

        let text = resp.text().await.map_err(|e| self.map_error(e))?;
        let parsed = ChatResponse::parse(&text).map_err(|e| OracleError::Malformed(e.to_string()))?;
        let answer = parsed.answer().ok_or(OracleError::EmptyAnswer)?;

        Ok(OracleReply::classify(answer.to_string()))
    }

    fn map_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::from(e)
        }
    }
}

impl OracleClient for CozeOracle {
    fn name(&self) -> &str {
        "Coze"
    }

    fn ask<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, OracleError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(
                purpose = request.purpose.as_str(),
                conversation_id = %request.conversation_id,
                prompt_len = request.prompt.len(),
                "sending oracle request"
            );
            self.send(request).await
        })
    }
}

/// Map a non-2xx response to [`OracleError::Status`].
pub fn check_response_status(resp: &reqwest::Response) -> Result<(), OracleError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(OracleError::Status(status.as_u16()))
    }
}
