// どこで: IC への低レベル呼び出しをまとめる Agent ラッパ
// 何を: identity と HTTP transport から Agent を組み、query/update を raw bytes で流す
// なぜ: SDK 依存をここに閉じ込め、上位は CanisterTransport だけを見るようにするため

use async_trait::async_trait;
use ic_agent::export::Principal;
use ic_agent::{Agent, AgentError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::identity::SharedIdentity;

#[derive(Debug, Error)]
pub enum IcClientError {
    #[error("Agent 初期化に失敗しました: {0}")]
    Init(String),
    #[error("query 失敗: {0}")]
    Query(String),
    #[error("update 失敗: {0}")]
    Update(String),
}

/// canister へ candid エンコード済みの引数を送り、返答の bytes をそのまま返す経路
#[async_trait]
pub trait CanisterTransport: Send + Sync {
    async fn query_raw(
        &self,
        canister_id: &Principal,
        method: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, IcClientError>;

    async fn update_raw(
        &self,
        canister_id: &Principal,
        method: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, IcClientError>;
}

#[derive(Clone)]
pub struct IcClient {
    pub agent: Arc<Agent>,
    url: String,
}

impl IcClient {
    pub async fn new(
        url: &str,
        identity: SharedIdentity,
        fetch_root_key: bool,
    ) -> Result<Self, IcClientError> {
        let agent = Agent::builder()
            .with_url(url)
            .with_arc_identity(identity)
            .build()
            .map_err(|e| IcClientError::Init(e.to_string()))?;
        if fetch_root_key {
            agent
                .fetch_root_key()
                .await
                .map_err(|e| IcClientError::Init(format!("root key: {}", e)))?;
        }
        Ok(IcClient {
            agent: Arc::new(agent),
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CanisterTransport for IcClient {
    async fn query_raw(
        &self,
        canister_id: &Principal,
        method: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, IcClientError> {
        debug!("query {}.{} ({} bytes)", canister_id, method, args.len());
        self.agent
            .query(canister_id, method)
            .with_arg(args)
            .call()
            .await
            .map_err(|e| IcClientError::Query(render_agent_error(e)))
    }

    async fn update_raw(
        &self,
        canister_id: &Principal,
        method: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, IcClientError> {
        debug!("update {}.{} ({} bytes)", canister_id, method, args.len());
        self.agent
            .update(canister_id, method)
            .with_arg(args)
            .call_and_wait()
            .await
            .map_err(|e| IcClientError::Update(render_agent_error(e)))
    }
}

fn render_agent_error(err: AgentError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::load_identity;
    use std::path::Path;

    #[tokio::test]
    async fn builds_without_network_when_root_key_not_fetched() {
        let identity = load_identity(Path::new("")).expect("anonymous identity");
        let client = IcClient::new("https://icp0.io", identity, false)
            .await
            .expect("agent builds offline");
        assert_eq!(client.url(), "https://icp0.io");
    }
}
