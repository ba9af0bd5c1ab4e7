// どこで: governance canister 呼び出しの署名者
// 何を: 設定の PEM パスから identity を構築する（空なら匿名）
// なぜ: 署名方法を一箇所に集約し、agent 側は Arc<dyn Identity> だけを扱うため

use ic_agent::export::Principal;
use ic_agent::identity::{AnonymousIdentity, BasicIdentity, Secp256k1Identity};
use ic_agent::Identity;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub type SharedIdentity = Arc<dyn Identity + Send + Sync>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("PEM 読み込みに失敗しました ({path}): {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("PEM から identity を生成できませんでした: {0}")]
    BuildFailed(String),
}

pub fn load_identity(pem_path: &Path) -> Result<SharedIdentity, IdentityError> {
    if pem_path.as_os_str().is_empty() {
        return Ok(Arc::new(AnonymousIdentity {}));
    }

    let pem = fs::read_to_string(pem_path).map_err(|e| IdentityError::ReadFailed {
        path: pem_path.display().to_string(),
        reason: e.to_string(),
    })?;

    // dfx の secp256k1 鍵は "EC PRIVATE KEY"、それ以外は PKCS8 Ed25519 とみなす
    if pem.contains("EC PRIVATE KEY") {
        let id = Secp256k1Identity::from_pem(pem.as_bytes())
            .map_err(|e| IdentityError::BuildFailed(e.to_string()))?;
        Ok(Arc::new(id))
    } else {
        let id = BasicIdentity::from_pem(pem.as_bytes())
            .map_err(|e| IdentityError::BuildFailed(e.to_string()))?;
        Ok(Arc::new(id))
    }
}

/// ログ用の principal 表記。取得できない場合は理由を返す
pub fn sender_text(identity: &SharedIdentity) -> String {
    match identity.sender() {
        Ok(p) => p.to_text(),
        Err(e) => format!("<unknown: {}>", e),
    }
}

pub fn is_anonymous(identity: &SharedIdentity) -> bool {
    matches!(identity.sender(), Ok(p) if p == Principal::anonymous())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_path_yields_anonymous_identity() {
        let id = load_identity(Path::new("")).expect("anonymous identity");
        assert!(is_anonymous(&id));
        assert_eq!(sender_text(&id), "2vxsx-fae");
    }

    #[test]
    fn missing_pem_file_is_read_error() {
        let err = match load_identity(Path::new("/nonexistent/identity.pem")) {
            Ok(_) => panic!("missing pem must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, IdentityError::ReadFailed { .. }));
    }

    #[test]
    fn garbage_pem_is_build_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp pem");
        writeln!(file, "this is not a key").expect("write pem");

        let err = match load_identity(file.path()) {
            Ok(_) => panic!("garbage pem must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, IdentityError::BuildFailed(_)));
    }
}
