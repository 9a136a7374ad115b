//! Logseq HTTP API client.
//!
//! Logseq's desktop app can expose its plugin API over HTTP
//! (Settings → Features → HTTP APIs server). Every call is a
//! `POST /api` with a bearer token and a body of the form
//! `{"method": "logseq.Editor.getBlock", "args": [...]}`.

use async_trait::async_trait;
use logbridge_core::Settings;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;

use crate::block::Block;
use crate::error::{NotebookError, Result};
use crate::traits::{InsertOptions, Notebook};

/// Client for the Logseq HTTP API server.
#[derive(Debug, Clone)]
pub struct LogseqClient {
    http: reqwest::Client,
    base_url: Url,
    endpoint: Url,
    token: String,
}

impl LogseqClient {
    /// Create a client for the API server at `base_url`.
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        let endpoint = base_url.join("api").unwrap_or_else(|_| base_url.clone());
        Self {
            http: reqwest::Client::new(),
            base_url,
            endpoint,
            token: token.into(),
        }
    }

    /// Create a client from bridge settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.logseq_api_url.clone(), settings.logseq_api_token.clone())
    }

    /// Base URL of the API server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL of the `/api` endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Authorization token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Invoke an API method and return its raw JSON result.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        trace!(method = %method, "calling Logseq API");
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&request_body(method, args))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(method = %method, status = %status, len = body.len(), "Logseq API answered");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NotebookError::Unauthorized);
        }
        if !status.is_success() {
            return Err(NotebookError::Api {
                method: method.to_string(),
                message: if body.is_empty() { status.to_string() } else { body },
            });
        }

        parse_response(method, &body)
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<Option<T>> {
        let value = self.call(method, args).await?;
        decode_optional(value)
    }
}

/// Build the JSON body for an API call.
pub fn request_body(method: &str, args: Vec<Value>) -> Value {
    json!({ "method": method, "args": args })
}

/// Parse an API response body. An empty body is `null`; an object carrying
/// only an `error` string is an API error.
pub fn parse_response(method: &str, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_str(body)?;
    if let Some(obj) = value.as_object() {
        if obj.len() == 1 {
            if let Some(message) = obj.get("error").and_then(Value::as_str) {
                return Err(NotebookError::Api {
                    method: method.to_string(),
                    message: message.to_string(),
                });
            }
        }
    }
    Ok(value)
}

fn decode_optional<T: DeserializeOwned>(value: Value) -> Result<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

/// Flatten `getPageLinkedReferences` output (`[[page, [block, ...]], ...]`)
/// into the referencing blocks, in the order returned.
pub fn flatten_linked_references(value: Value) -> Result<Vec<Block>> {
    let refs: Option<Vec<(Value, Vec<Block>)>> = decode_optional(value)?;
    Ok(refs
        .unwrap_or_default()
        .into_iter()
        .flat_map(|(_, blocks)| blocks)
        .collect())
}

fn slash_actions(template: &str) -> Value {
    json!([["editor/clear-current-slash"], ["editor/input", template]])
}

#[async_trait]
impl Notebook for LogseqClient {
    async fn linked_blocks(&self, page: &str) -> Result<Vec<Block>> {
        let value = self
            .call("logseq.Editor.getPageLinkedReferences", vec![json!(page)])
            .await?;
        flatten_linked_references(value)
    }

    async fn query(&self, query: &str, args: &[Value]) -> Result<Option<Value>> {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(json!(query));
        call_args.extend(args.iter().cloned());
        let value = self.call("logseq.DB.datascriptQuery", call_args).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn block(&self, uuid: &str, include_children: bool) -> Result<Option<Block>> {
        self.call_as(
            "logseq.Editor.getBlock",
            vec![json!(uuid), json!({ "includeChildren": include_children })],
        )
        .await
    }

    async fn page_blocks_tree(&self, page: &str) -> Result<Vec<Block>> {
        Ok(self
            .call_as("logseq.Editor.getPageBlocksTree", vec![json!(page)])
            .await?
            .unwrap_or_default())
    }

    async fn insert_block(
        &self,
        target: &str,
        content: &str,
        options: InsertOptions,
    ) -> Result<Option<Block>> {
        self.call_as(
            "logseq.Editor.insertBlock",
            vec![
                json!(target),
                json!(content),
                json!({ "before": options.before, "sibling": options.sibling }),
            ],
        )
        .await
    }

    async fn update_block(&self, uuid: &str, content: &str) -> Result<()> {
        self.call("logseq.Editor.updateBlock", vec![json!(uuid), json!(content)])
            .await?;
        Ok(())
    }

    async fn register_slash_template(&self, label: &str, template: &str) -> Result<()> {
        self.call(
            "logseq.Editor.registerSlashCommand",
            vec![json!(label), slash_actions(template)],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_api() {
        let client = LogseqClient::new("http://127.0.0.1:12315".parse().unwrap(), "t");
        assert_eq!(client.endpoint().as_str(), "http://127.0.0.1:12315/api");
        assert_eq!(client.token(), "t");
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("logseq.DB.datascriptQuery", vec![json!("[:find ?b]"), json!(1)]);
        assert_eq!(
            body,
            json!({"method": "logseq.DB.datascriptQuery", "args": ["[:find ?b]", 1]})
        );
    }

    #[test]
    fn test_parse_empty_and_null() {
        assert_eq!(parse_response("m", "").unwrap(), Value::Null);
        assert_eq!(parse_response("m", "null").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_error_object() {
        let err = parse_response("logseq.Editor.getBlock", r#"{"error":"MethodNotExist"}"#)
            .unwrap_err();
        match err {
            NotebookError::Api { method, message } => {
                assert_eq!(method, "logseq.Editor.getBlock");
                assert_eq!(message, "MethodNotExist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_block_with_error_field_is_not_an_error() {
        let value = parse_response("m", r#"{"uuid":"a","error":"x"}"#).unwrap();
        assert_eq!(value["uuid"], "a");
    }

    #[test]
    fn test_flatten_linked_references() {
        let value = json!([
            [{"name": "journal"}, [{"uuid": "a", "content": "one"}, {"uuid": "b", "content": "two"}]],
            [{"name": "other"}, [{"uuid": "c", "content": "three"}]]
        ]);
        let blocks = flatten_linked_references(value).unwrap();
        let contents: Vec<_> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_flatten_linked_references_null() {
        assert!(flatten_linked_references(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_slash_actions() {
        assert_eq!(
            slash_actions("tpl"),
            json!([["editor/clear-current-slash"], ["editor/input", "tpl"]])
        );
    }
}
