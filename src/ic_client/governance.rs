// どこで: sentinel dashboard の governance canister アダプタ
// 何を: identity / transport / agent と .did から組んだ proxy を保持し、画像ハッシュ登録・取得を中継する
// なぜ: プロセスで 1 つだけ作ったハンドルを、参照で各所に渡して使い回すため

use candid::utils::ArgumentDecoder;
use candid::{IDLArgs, IDLValue};
use ic_agent::export::Principal;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use super::agent::{CanisterTransport, IcClient, IcClientError};
use super::schema::{CallKind, CandidSchema, SchemaError};
use crate::config::AppConfig;
use crate::identity::{load_identity, sender_text, IdentityError, SharedIdentity};

pub const ADD_IMAGE_HASH: &str = "add_image_hash";
pub const GET_IMAGE_HASHES: &str = "get_image_hashes";
pub const LIST_IMAGES: &str = "list_images";
pub const GET_CRAWL_RESULTS: &str = "get_crawl_results";

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Client(#[from] IcClientError),
    #[error("canister ID が不正です ({id}): {reason}")]
    InvalidCanisterId { id: String, reason: String },
    #[error("candid エンコード失敗 ({method}): {reason}")]
    Encode { method: String, reason: String },
    #[error("candid デコード失敗 ({method}): {reason}")]
    Decode { method: String, reason: String },
}

/// canister から返ってきたそのままの返答
#[derive(Debug, Clone)]
pub struct CanisterReply {
    pub method: String,
    pub raw: Vec<u8>,
    /// .did の返り値型で解釈した値
    pub args: IDLArgs,
}

impl CanisterReply {
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// 呼び出し側が期待する Rust 型に読み替える
    pub fn decode<T>(&self) -> Result<T, GovernanceError>
    where
        T: for<'de> ArgumentDecoder<'de>,
    {
        candid::decode_args::<T>(&self.raw).map_err(|e| GovernanceError::Decode {
            method: self.method.clone(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Display for CanisterReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args)
    }
}

pub struct GovernanceCanister {
    identity: SharedIdentity,
    client: Option<IcClient>,
    transport: Arc<dyn CanisterTransport>,
    schema: CandidSchema,
    canister_id: Principal,
}

impl GovernanceCanister {
    /// .did を読んでから identity・agent を組む。.did が無ければネットワーク系は一切作らない
    pub async fn connect(cfg: &AppConfig) -> Result<Self, GovernanceError> {
        let schema = CandidSchema::load(Path::new(&cfg.governance.did_path))?;
        let canister_id = parse_canister_id(&cfg.governance.canister_id)?;
        let identity = load_identity(Path::new(&cfg.identity.pem_path))?;
        let client = IcClient::new(
            &cfg.network.api_url,
            identity.clone(),
            cfg.network.fetch_root_key,
        )
        .await?;

        info!(
            "governance canister {} を {} で初期化しました (sender {})",
            canister_id,
            client.url(),
            sender_text(&identity)
        );

        Ok(GovernanceCanister {
            identity,
            transport: Arc::new(client.clone()),
            client: Some(client),
            schema,
            canister_id,
        })
    }

    /// 任意の transport で組む（ローカル replica 以外の経路やテスト用）
    pub fn with_transport(
        schema: CandidSchema,
        canister_id: Principal,
        identity: SharedIdentity,
        transport: Arc<dyn CanisterTransport>,
    ) -> Self {
        GovernanceCanister {
            identity,
            client: None,
            transport,
            schema,
            canister_id,
        }
    }

    pub fn canister_id(&self) -> &Principal {
        &self.canister_id
    }

    pub fn identity(&self) -> &SharedIdentity {
        &self.identity
    }

    /// `connect` で組んだ場合のみ Some
    pub fn client(&self) -> Option<&IcClient> {
        self.client.as_ref()
    }

    pub fn schema(&self) -> &CandidSchema {
        &self.schema
    }

    pub async fn add_image_hash(
        &self,
        subject_id: Uuid,
        image_hash: &str,
    ) -> Result<CanisterReply, GovernanceError> {
        self.call_text(ADD_IMAGE_HASH, &[&subject_id.to_string(), image_hash])
            .await
    }

    pub async fn get_image_hashes(&self, subject_id: Uuid) -> Result<CanisterReply, GovernanceError> {
        self.call_text(GET_IMAGE_HASHES, &[&subject_id.to_string()])
            .await
    }

    pub async fn list_images(&self, user_id: &str) -> Result<CanisterReply, GovernanceError> {
        self.call_text(LIST_IMAGES, &[user_id]).await
    }

    pub async fn get_crawl_results(&self, user_id: &str) -> Result<CanisterReply, GovernanceError> {
        self.call_text(GET_CRAWL_RESULTS, &[user_id]).await
    }

    async fn call_text(
        &self,
        method: &str,
        texts: &[&str],
    ) -> Result<CanisterReply, GovernanceError> {
        let sig = self.schema.method(method)?;
        let values = texts
            .iter()
            .map(|t| IDLValue::Text((*t).to_string()))
            .collect();
        let args = self
            .schema
            .encode_args(&sig, values)
            .map_err(|e| GovernanceError::Encode {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        debug!("{} -> {:?} ({:?})", method, texts, sig.kind);
        let raw = match sig.kind {
            CallKind::Query => {
                self.transport
                    .query_raw(&self.canister_id, method, args)
                    .await?
            }
            CallKind::Update => {
                self.transport
                    .update_raw(&self.canister_id, method, args)
                    .await?
            }
        };

        let decoded = self
            .schema
            .decode_reply(&sig, &raw)
            .map_err(|e| GovernanceError::Decode {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CanisterReply {
            method: method.to_string(),
            raw,
            args: decoded,
        })
    }
}

fn parse_canister_id(text: &str) -> Result<Principal, GovernanceError> {
    Principal::from_text(text).map_err(|e| GovernanceError::InvalidCanisterId {
        id: text.to_string(),
        reason: e.to_string(),
    })
}

/// プロセス起動時に 1 つ作って参照で配る、governance canister の保持箱。
/// 最初の初期化が成功した後は、渡された設定に関わらず同じインスタンスを返す。
#[derive(Default)]
pub struct GovernanceCell {
    inner: OnceCell<Arc<GovernanceCanister>>,
}

impl GovernanceCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_connect(
        &self,
        cfg: &AppConfig,
    ) -> Result<Arc<GovernanceCanister>, GovernanceError> {
        self.get_or_build(|| GovernanceCanister::connect(cfg)).await
    }

    /// 初期化に失敗した場合は未初期化のまま残り、次の呼び出しで再試行される
    pub async fn get_or_build<F, Fut>(
        &self,
        build: F,
    ) -> Result<Arc<GovernanceCanister>, GovernanceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GovernanceCanister, GovernanceError>>,
    {
        self.inner
            .get_or_try_init(|| async move { build().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self) -> Option<&Arc<GovernanceCanister>> {
        self.inner.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }
}
