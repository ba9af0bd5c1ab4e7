// どこで: IC 呼び出しのクライアントをまとめるモジュール
// 何を: agent 初期化、.did の型付け、governance canister への中継
// なぜ: 外部依存をここに閉じ込め、上位 (main / inspect) を簡潔にするため

pub mod agent;
pub mod governance;
pub mod schema;
