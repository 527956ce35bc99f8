#![forbid(unsafe_code)]

//! [`RemoteSync`] over the project REST API.
//!
//! # Configuration
//!
//! - `SPROUT_API_URL`: base URL (default `http://localhost:8000`)
//! - `SPROUT_API_TOKEN`: optional bearer token
//! - `SPROUT_API_TIMEOUT_S`: request timeout in seconds (default 30)

use crate::error::{SyncError, SyncResult};
use crate::remote::{NewNode, NodeUpdate, RemoteSync, SuggestionRequest};
use crate::wire::{
    CreateNodeBody, NodeRecord, OneOrMany, SuggestBody, TagBody, TagRecord, UpdateNodeBody,
    error_detail,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sp_core::{Node, NodeId, ProjectId, Tag, TagDraft, TagId};
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_S: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRemoteConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_S,
        }
    }
}

impl HttpRemoteConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_var("SPROUT_API_URL").unwrap_or(defaults.base_url),
            api_token: env_var("SPROUT_API_TOKEN"),
            timeout_secs: env_var("SPROUT_API_TIMEOUT_S")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(SyncError::Config("base url cannot be empty".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "base url must be http(s), got {url:?}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SyncError::Config("timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct HttpRemote {
    config: HttpRemoteConfig,
    http: Client,
}

impl HttpRemote {
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> SyncResult<Self> {
        Self::new(HttpRemoteConfig::from_env())
    }

    pub fn config(&self) -> &HttpRemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self.authorized(request).send().await?;
        debug!(status = %response.status(), url = %response.url(), "remote response");
        Ok(response)
    }

    async fn expect_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn expect_empty(&self, request: RequestBuilder) -> SyncResult<()> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

async fn rejection(response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &error_detail(&body))
}

pub(crate) fn classify(status: StatusCode, detail: &str) -> SyncError {
    if status == StatusCode::NOT_FOUND {
        return SyncError::NotFound(detail.to_string());
    }
    if status.is_client_error() {
        return SyncError::Validation {
            status: status.as_u16(),
            detail: detail.to_string(),
        };
    }
    SyncError::Transport(format!("server answered {status}: {detail}"))
}

fn nodes_from(records: Vec<NodeRecord>) -> SyncResult<Vec<Node>> {
    records.into_iter().map(NodeRecord::into_node).collect()
}

fn tag_body(draft: TagDraft) -> TagBody {
    TagBody {
        name: draft.name,
        description: draft.description,
        color: draft.color,
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn fetch_all(&self, project: &ProjectId, tag_filter: &[TagId]) -> SyncResult<Vec<Node>> {
        let mut request = self.http.get(self.url(&format!("/projects/{project}/nodes")));
        if !tag_filter.is_empty() {
            let joined = tag_filter
                .iter()
                .map(TagId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            request = request.query(&[("tag_ids", joined)]);
        }
        let records: Vec<NodeRecord> = self.expect_json(request).await?;
        nodes_from(records)
    }

    async fn create(&self, project: &ProjectId, payload: NewNode) -> SyncResult<Node> {
        let body = CreateNodeBody {
            content: payload.content.as_wire().to_string(),
            pos_x: payload.position.x,
            pos_y: payload.position.y,
            depth: payload.depth,
            order: payload.order,
            parent_id: payload.parent_id.map(NodeId::into_string),
        };
        let request = self
            .http
            .post(self.url(&format!("/projects/{project}/nodes")))
            .json(&body);
        let record: NodeRecord = self.expect_json(request).await?;
        record.into_node()
    }

    async fn create_ai_suggestions(
        &self,
        project: &ProjectId,
        request: SuggestionRequest,
    ) -> SyncResult<Vec<Node>> {
        let body = SuggestBody {
            ai_prompt: request.prompt,
            pos_x: request.position.x,
            pos_y: request.position.y,
            depth: request.depth,
            order: request.order,
            parent_id: request.parent_id.map(NodeId::into_string),
            count: request.count,
        };
        let http_request = self
            .http
            .post(self.url(&format!("/projects/{project}/nodes")))
            .json(&body);
        let records: OneOrMany<NodeRecord> = self.expect_json(http_request).await?;
        nodes_from(records.into_vec())
    }

    async fn update(
        &self,
        project: &ProjectId,
        node: &NodeId,
        update: NodeUpdate,
    ) -> SyncResult<Node> {
        let body = UpdateNodeBody {
            content: update.content.map(|c| c.as_wire().to_string()),
            pos_x: update.position.map(|p| p.x),
            pos_y: update.position.map(|p| p.y),
        };
        let request = self
            .http
            .patch(self.url(&format!("/projects/{project}/nodes/{node}")))
            .json(&body);
        let record: NodeRecord = self.expect_json(request).await?;
        record.into_node()
    }

    async fn activate(&self, project: &ProjectId, node: &NodeId) -> SyncResult<Node> {
        let request = self
            .http
            .post(self.url(&format!("/projects/{project}/nodes/{node}/activate")));
        let record: NodeRecord = self.expect_json(request).await?;
        record.into_node()
    }

    async fn attach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        let request = self
            .http
            .post(self.url(&format!("/projects/{project}/tags/{tag}/nodes/{node}")));
        let response = self.send(request).await?;
        // 409 means the link already exists.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        Err(rejection(response).await)
    }

    async fn detach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/projects/{project}/tags/{tag}/nodes/{node}")));
        let response = self.send(request).await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let detail = error_detail(&response.text().await.unwrap_or_default());
        if status == StatusCode::BAD_REQUEST && detail.eq_ignore_ascii_case("node not tagged") {
            return Ok(());
        }
        Err(classify(status, &detail))
    }

    async fn delete_node(&self, project: &ProjectId, node: &NodeId) -> SyncResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/projects/{project}/nodes/{node}")));
        self.expect_empty(request).await
    }

    async fn list_tags(&self, project: &ProjectId) -> SyncResult<Vec<Tag>> {
        let request = self.http.get(self.url(&format!("/projects/{project}/tags")));
        let records: Vec<TagRecord> = self.expect_json(request).await?;
        records.into_iter().map(TagRecord::into_tag).collect()
    }

    async fn create_tag(&self, project: &ProjectId, draft: TagDraft) -> SyncResult<Tag> {
        let request = self
            .http
            .post(self.url(&format!("/projects/{project}/tags")))
            .json(&tag_body(draft));
        let record: TagRecord = self.expect_json(request).await?;
        record.into_tag()
    }

    async fn update_tag(&self, project: &ProjectId, tag: &TagId, draft: TagDraft) -> SyncResult<Tag> {
        let request = self
            .http
            .patch(self.url(&format!("/projects/{project}/tags/{tag}")))
            .json(&tag_body(draft));
        let record: TagRecord = self.expect_json(request).await?;
        record.into_tag()
    }

    async fn delete_tag(&self, project: &ProjectId, tag: &TagId) -> SyncResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/projects/{project}/tags/{tag}")));
        self.expect_empty(request).await
    }

    async fn refresh_tag_summary(&self, project: &ProjectId, tag: &TagId) -> SyncResult<Tag> {
        let request = self
            .http
            .post(self.url(&format!("/projects/{project}/tags/{tag}/summary")));
        let record: TagRecord = self.expect_json(request).await?;
        record.into_tag()
    }
}
