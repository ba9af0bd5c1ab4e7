// どこで: governance canister の candid (.did) を扱う層
// 何を: .did を読み込み型検査し、メソッドの query/update 判定と型付き encode/decode を行う
// なぜ: 呼び出し側がフィールドID を手で探さずに済むよう、引数・返り値を .did の型で解釈するため

use candid::types::{FuncMode, Function, Type, TypeEnv};
use candid::{IDLArgs, IDLValue};
use candid_parser::types::IDLProg;
use candid_parser::typing::check_prog;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("candid ファイルを読めません ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("candid の解析に失敗しました: {0}")]
    Parse(String),
    #[error("candid に service 定義がありません")]
    NoService,
    #[error("service にメソッド {0} がありません")]
    UnknownMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Update,
}

/// .did 上のメソッド 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub kind: CallKind,
}

/// 型検査済みの .did。candid の Type は Send でないので、型環境は保持せず
/// encode/decode のたびに原文から組み直す
#[derive(Debug, Clone)]
pub struct CandidSchema {
    source: String,
    methods: Vec<MethodSig>,
}

struct Checked {
    env: TypeEnv,
    service: Type,
}

impl CandidSchema {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let source = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(source)
    }

    pub fn parse(source: String) -> Result<Self, SchemaError> {
        let checked = check(&source)?;
        let entries = checked
            .env
            .as_service(&checked.service)
            .map_err(|e| SchemaError::Parse(e.to_string()))?;
        let mut methods = entries
            .iter()
            .map(|(name, ty)| {
                checked
                    .env
                    .as_func(ty)
                    .map(|f| MethodSig {
                        name: name.clone(),
                        kind: call_kind(f),
                    })
                    .map_err(|e| SchemaError::Parse(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        methods.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(CandidSchema { source, methods })
    }

    /// 読み込んだ .did の原文
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn method(&self, name: &str) -> Result<MethodSig, SchemaError> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownMethod(name.to_string()))
    }

    /// service の全メソッド（メソッド名の昇順。.did の記述順ではない）
    pub fn methods(&self) -> &[MethodSig] {
        &self.methods
    }

    pub fn encode_args(&self, sig: &MethodSig, values: Vec<IDLValue>) -> candid::Result<Vec<u8>> {
        self.with_func(&sig.name, |env, func| {
            IDLArgs::new(&values).to_bytes_with_types(env, &func.args)
        })
    }

    pub fn decode_reply(&self, sig: &MethodSig, bytes: &[u8]) -> candid::Result<IDLArgs> {
        self.with_func(&sig.name, |env, func| {
            IDLArgs::from_bytes_with_types(bytes, env, &func.rets)
        })
    }

    fn with_func<R, F>(&self, method: &str, f: F) -> candid::Result<R>
    where
        F: FnOnce(&TypeEnv, &Function) -> candid::Result<R>,
    {
        let checked = check(&self.source).map_err(|e| candid::Error::msg(e.to_string()))?;
        let func = checked.env.get_method(&checked.service, method)?;
        f(&checked.env, func)
    }
}

fn check(source: &str) -> Result<Checked, SchemaError> {
    let prog: IDLProg = source
        .parse()
        .map_err(|e: candid_parser::Error| SchemaError::Parse(e.to_string()))?;
    let mut env = TypeEnv::new();
    let service = check_prog(&mut env, &prog)
        .map_err(|e| SchemaError::Parse(e.to_string()))?
        .ok_or(SchemaError::NoService)?;
    Ok(Checked { env, service })
}

fn call_kind(func: &Function) -> CallKind {
    let is_query = func
        .modes
        .iter()
        .any(|m| matches!(m, FuncMode::Query | FuncMode::CompositeQuery));
    if is_query {
        CallKind::Query
    } else {
        CallKind::Update
    }
}
