// どこで: クイックデバッグ用バイナリ
// 何を: .did のメソッド一覧と、get_image_hashes の生レスポンス・デコード結果を表示
// なぜ: canister 側の .did と手元の .did のずれを確認するため

use sentinel_governance::config::AppConfig;
use sentinel_governance::ic_client::schema::CallKind;
use sentinel_governance::GovernanceCell;
use std::error::Error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cfg = AppConfig::load_default();

    let subject = match std::env::args().nth(1) {
        Some(raw) => Uuid::parse_str(&raw)?,
        None => Uuid::nil(),
    };

    let cell = GovernanceCell::new();
    let governance = cell.get_or_connect(&cfg).await?;

    println!("=== {} ({}) ===", cfg.governance.did_path, governance.canister_id());
    for method in governance.schema().methods() {
        let mode = match method.kind {
            CallKind::Query => "query",
            CallKind::Update => "update",
        };
        println!("  - {} [{}]", method.name, mode);
    }

    let reply = governance.get_image_hashes(subject).await?;
    println!("=== get_image_hashes ({}) ===", subject);
    print_raw("raw", &reply.raw);
    println!("decoded: {}", reply);

    Ok(())
}

fn print_raw(label: &str, bytes: &[u8]) {
    print!("{label} ({} bytes): 0x", bytes.len());
    for b in bytes {
        print!("{:02x}", b);
    }
    println!();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
