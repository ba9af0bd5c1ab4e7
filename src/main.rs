use clap::{ArgAction, Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sentinel_governance::config::AppConfig;
use sentinel_governance::{CanisterReply, GovernanceCell, GovernanceError};

#[derive(Parser, Debug)]
#[command(
    name = "sentinel-governance",
    version,
    about = "sentinel dashboard の governance canister クライアント"
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Commands,
}

/// 環境変数・既定値より優先される設定
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true, help = "candid (.did) ファイルのパス")]
    did: Option<String>,
    #[arg(long, global = true, help = "governance canister の principal")]
    canister_id: Option<String>,
    #[arg(long, global = true, help = "IC API エンドポイント")]
    url: Option<String>,
    #[arg(long, global = true, help = "署名に使う PEM（省略時は匿名）")]
    pem: Option<String>,
    #[arg(
        long,
        global = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "root key を取得する（ローカル replica 用）。--fetch-root-key=false で無効化"
    )]
    fetch_root_key: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// subject に画像ハッシュを登録する
    Add { subject_id: Uuid, image_hash: String },
    /// subject に登録済みの画像ハッシュを取得する
    Get { subject_id: Uuid },
    /// ユーザーがアップロードした画像名を一覧する
    ListImages { user_id: String },
    /// ユーザーのクロール結果を取得する
    CrawlResults { user_id: String },
}

impl Overrides {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(v) = self.did {
            cfg.governance.did_path = v;
        }
        if let Some(v) = self.canister_id {
            cfg.governance.canister_id = v;
        }
        if let Some(v) = self.url {
            cfg.network.api_url = v;
        }
        if let Some(v) = self.pem {
            cfg.identity.pem_path = v;
        }
        if let Some(v) = self.fetch_root_key {
            cfg.network.fetch_root_key = v;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load_default();
    cli.overrides.apply(&mut cfg);

    let governance = GovernanceCell::new();
    match run(&governance, &cfg, cli.command).await {
        Ok(reply) => {
            println!("{}", reply);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cell: &GovernanceCell,
    cfg: &AppConfig,
    command: Commands,
) -> Result<CanisterReply, GovernanceError> {
    let governance = cell.get_or_connect(cfg).await?;
    match command {
        Commands::Add {
            subject_id,
            image_hash,
        } => {
            let reply = governance.add_image_hash(subject_id, &image_hash).await?;
            info!("{}: add_image_hash {} を送信しました", subject_id, image_hash);
            Ok(reply)
        }
        Commands::Get { subject_id } => governance.get_image_hashes(subject_id).await,
        Commands::ListImages { user_id } => governance.list_images(&user_id).await,
        Commands::CrawlResults { user_id } => governance.get_crawl_results(&user_id).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_canonical_uuid() {
        let cli = Cli::try_parse_from([
            "sentinel-governance",
            "add",
            "123E4567-E89B-12D3-A456-426614174000",
            "abc123",
        ])
        .expect("parse");
        match cli.command {
            Commands::Add {
                subject_id,
                image_hash,
            } => {
                assert_eq!(subject_id.to_string(), "123e4567-e89b-12d3-a456-426614174000");
                assert_eq!(image_hash, "abc123");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let result = Cli::try_parse_from(["sentinel-governance", "get", "not-a-uuid"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_loaded_config() {
        let cli = Cli::try_parse_from([
            "sentinel-governance",
            "list-images",
            "user-1",
            "--did",
            "local.did",
            "--url",
            "http://127.0.0.1:4943",
            "--fetch-root-key",
        ])
        .expect("parse");

        let mut cfg = AppConfig::default();
        cli.overrides.apply(&mut cfg);
        assert_eq!(cfg.governance.did_path, "local.did");
        assert_eq!(cfg.network.api_url, "http://127.0.0.1:4943");
        assert!(cfg.network.fetch_root_key);
        assert_eq!(cfg.governance.canister_id, "qhsyi-dyaaa-aaaai-q3s4a-cai");
    }

    #[test]
    fn fetch_root_key_flag_can_turn_env_setting_off() {
        let cli = Cli::try_parse_from([
            "sentinel-governance",
            "get",
            "123e4567-e89b-12d3-a456-426614174000",
            "--fetch-root-key=false",
        ])
        .expect("parse");

        let mut cfg = AppConfig::load_with(|k| {
            (k == "IC_FETCH_ROOT_KEY").then(|| "true".to_string())
        });
        assert!(cfg.network.fetch_root_key);
        cli.overrides.apply(&mut cfg);
        assert!(!cfg.network.fetch_root_key);
    }

    #[test]
    fn omitted_fetch_root_key_keeps_env_setting() {
        let cli = Cli::try_parse_from([
            "sentinel-governance",
            "get",
            "123e4567-e89b-12d3-a456-426614174000",
        ])
        .expect("parse");

        let mut cfg = AppConfig::load_with(|k| {
            (k == "IC_FETCH_ROOT_KEY").then(|| "true".to_string())
        });
        cli.overrides.apply(&mut cfg);
        assert!(cfg.network.fetch_root_key);
    }
}
