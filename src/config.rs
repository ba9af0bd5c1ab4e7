// どこで: sentinel-governance の設定モジュール
// 何を: canister ID・candid パス・エンドポイント・鍵パスを集中管理
// なぜ: 既定値を一箇所に置き、環境変数で差し替えられるようにするため

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_DID_PATH: &str = "app/sentinel_dashboard_backend.did";
pub const DEFAULT_CANISTER_ID: &str = "qhsyi-dyaaa-aaaai-q3s4a-cai";
pub const DEFAULT_API_URL: &str = "https://icp0.io";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub api_url: String,
    /// ローカル replica (dfx) のときだけ true にする
    pub fetch_root_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// 空文字なら匿名 identity
    pub pem_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanisterConfig {
    pub canister_id: String,
    pub did_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    pub governance: CanisterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            network: NetworkConfig {
                api_url: DEFAULT_API_URL.to_string(),
                fetch_root_key: false,
            },
            identity: IdentityConfig {
                pem_path: String::new(),
            },
            governance: CanisterConfig {
                canister_id: DEFAULT_CANISTER_ID.to_string(),
                did_path: DEFAULT_DID_PATH.to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn load_default() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// `lookup` で与えた値を既定値に上書きする（環境変数の代わりに差し込める）
    pub fn load_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = AppConfig::default();

        if let Some(v) = lookup("GOVERNANCE_DID_PATH") {
            cfg.governance.did_path = v;
        }
        if let Some(v) = lookup("GOVERNANCE_CANISTER_ID") {
            cfg.governance.canister_id = v;
        }
        if let Some(v) = lookup("IC_API_URL") {
            cfg.network.api_url = v;
        }
        if let Some(v) = lookup("IC_FETCH_ROOT_KEY").and_then(|v| parse_flag(&v)) {
            cfg.network.fetch_root_key = v;
        }
        if let Some(v) = lookup("IC_IDENTITY_PEM") {
            cfg.identity.pem_path = v;
        }

        cfg
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_mainnet_dashboard() {
        let cfg = AppConfig::load_with(|_| None);
        assert_eq!(cfg.governance.did_path, "app/sentinel_dashboard_backend.did");
        assert_eq!(cfg.governance.canister_id, "qhsyi-dyaaa-aaaai-q3s4a-cai");
        assert_eq!(cfg.network.api_url, "https://icp0.io");
        assert!(!cfg.network.fetch_root_key);
        assert!(cfg.identity.pem_path.is_empty());
    }

    #[test]
    fn env_values_override_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GOVERNANCE_DID_PATH", "/tmp/local.did"),
            ("GOVERNANCE_CANISTER_ID", "bkyz2-fmaaa-aaaaa-qaaaq-cai"),
            ("IC_API_URL", "http://127.0.0.1:4943"),
            ("IC_FETCH_ROOT_KEY", "true"),
            ("IC_IDENTITY_PEM", "identity.pem"),
        ]);
        let cfg = AppConfig::load_with(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.governance.did_path, "/tmp/local.did");
        assert_eq!(cfg.governance.canister_id, "bkyz2-fmaaa-aaaaa-qaaaq-cai");
        assert_eq!(cfg.network.api_url, "http://127.0.0.1:4943");
        assert!(cfg.network.fetch_root_key);
        assert_eq!(cfg.identity.pem_path, "identity.pem");
    }

    #[test]
    fn unparsable_flag_keeps_default() {
        let cfg = AppConfig::load_with(|k| {
            (k == "IC_FETCH_ROOT_KEY").then(|| "maybe".to_string())
        });
        assert!(!cfg.network.fetch_root_key);
    }
}
