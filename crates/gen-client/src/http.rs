use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Generate, GenClientError, Result};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    temperature: f64,
    prompt: &'a str,
    context: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: String,
}

// ---------------------------------------------------------------------------
// HttpGenerator
// ---------------------------------------------------------------------------

/// HTTP backend for the generation collaborator.
///
/// POSTs `{model, temperature, prompt, context}` to the configured endpoint
/// and expects `{"content": "..."}` back. Transport failures surface as
/// `Http`, a non-2xx status as `Unavailable`; both are retryable and the
/// caller decides whether to retry (see [`crate::policy`]).
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
}

impl HttpGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            temperature,
        }
    }

    async fn call(&self, prompt: &str, context: &Value) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            temperature: self.temperature,
            prompt,
            context,
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenClientError::Unavailable(format!(
                "endpoint returned {status}"
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GenClientError::Malformed(e.to_string()))?;

        if parsed.content.is_empty() {
            return Err(GenClientError::Malformed("empty content field".into()));
        }
        Ok(parsed.content)
    }
}

impl Generate for HttpGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, context: &'a Value) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.call(prompt, context))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn generate_parses_content_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":"resource \"aws_s3_bucket\" \"b\" {}"}"#)
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()), "gen-1", 0.2);
        let out = gen
            .generate("emit infra", &json!({"provider": "aws"}))
            .await
            .unwrap();
        assert!(out.contains("aws_s3_bucket"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(503)
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()), "gen-1", 0.2);
        let err = gen.generate("p", &json!({})).await.unwrap_err();
        assert!(matches!(err, GenClientError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn transport_error_is_retryable_http() {
        // nothing listens on port 1; the connection itself fails
        let gen = HttpGenerator::new("http://127.0.0.1:1/generate", "gen-1", 0.2);
        let err = gen.generate("p", &json!({})).await.unwrap_err();
        assert!(matches!(err, GenClientError::Http(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()), "gen-1", 0.2);
        let err = gen.generate("p", &json!({})).await.unwrap_err();
        assert!(matches!(err, GenClientError::Malformed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn empty_content_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"content":""}"#)
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()), "gen-1", 0.2);
        let err = gen.generate("p", &json!({})).await.unwrap_err();
        assert!(matches!(err, GenClientError::Malformed(_)));
    }

    #[test]
    fn request_body_shape() {
        let ctx = json!({"k": "v"});
        let req = GenerateRequest {
            model: "gen-1",
            temperature: 0.7,
            prompt: "hello",
            context: &ctx,
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["model"], "gen-1");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["context"]["k"], "v");
    }
}
