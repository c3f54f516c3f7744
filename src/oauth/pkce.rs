//! PKCE (Proof Key for Code Exchange, RFC 7636)
//!
//! 授权请求携带 `code_challenge`，授权码中保存它；兑换授权码时客户端
//! 提交原始的 `code_verifier`，服务端重新计算并比较。
//!
//! ## 示例
//!
//! ```rust
//! use oauthrs::oauth::pkce::{PkceChallenge, PkceMethod, verify_pkce};
//!
//! // 客户端
//! let pkce = PkceChallenge::new(PkceMethod::S256).unwrap();
//! let (challenge, method) = pkce.authorization_params();
//!
//! // 服务端
//! assert!(verify_pkce(Some(challenge), Some(method), Some(pkce.verifier())).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::{Error, OAuthError, Result};
use crate::random::{constant_time_compare_str, generate_random_bytes};

/// PKCE challenge 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceMethod {
    /// challenge = verifier
    Plain,

    /// challenge = BASE64URL(SHA256(verifier))
    #[default]
    S256,
}

impl PkceMethod {
    /// 转换为 OAuth 2.0 参数字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            PkceMethod::Plain => "plain",
            PkceMethod::S256 => "S256",
        }
    }

    /// 计算 code_challenge
    pub fn compute_challenge(&self, verifier: &str) -> String {
        match self {
            PkceMethod::Plain => verifier.to_string(),
            PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
        }
    }
}

impl std::str::FromStr for PkceMethod {
    type Err = Error;

    /// 方法名区分大小写
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(PkceMethod::Plain),
            "S256" => Ok(PkceMethod::S256),
            _ => Err(OAuthError::invalid_grant("Unsupported code challenge method").into()),
        }
    }
}

impl std::fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// code_verifier / code_challenge 的长度范围（RFC 7636 §4.1）
pub const CODE_VERIFIER_LENGTH: std::ops::RangeInclusive<usize> = 43..=128;

/// 检查 code_verifier 或 code_challenge 的格式
///
/// 43 到 128 个 unreserved 字符：`A-Z a-z 0-9 - . _ ~`
pub fn is_well_formed(value: &str) -> bool {
    CODE_VERIFIER_LENGTH.contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// 校验 code_verifier
///
/// - 没有 challenge：不校验
/// - 有 challenge 但没有 verifier：`invalid_grant`
/// - 方法不是 `S256` / `plain`：`invalid_grant`
/// - 不匹配：`invalid_grant`
///
/// 比较对整个字符串做常量时间比较。
pub fn verify_pkce(
    code_challenge: Option<&str>,
    code_challenge_method: Option<&str>,
    code_verifier: Option<&str>,
) -> Result<()> {
    let Some(challenge) = code_challenge else {
        return Ok(());
    };

    let verifier = code_verifier
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_grant("Code verifier is required"))?;

    let method: PkceMethod = code_challenge_method.unwrap_or("plain").parse()?;
    let computed = method.compute_challenge(verifier);

    if !constant_time_compare_str(&computed, challenge) {
        return Err(OAuthError::invalid_grant("Invalid code verifier").into());
    }

    Ok(())
}

/// 客户端侧的 PKCE challenge
///
/// 包含 code_verifier 和对应的 code_challenge
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
    method: PkceMethod,
}

impl PkceChallenge {
    /// 生成新的 challenge
    ///
    /// verifier 为 32 字节随机数的 base64url 编码（43 个字符）
    pub fn new(method: PkceMethod) -> Result<Self> {
        let verifier = URL_SAFE_NO_PAD.encode(generate_random_bytes(32)?);
        Ok(Self::from_verifier(verifier, method))
    }

    /// 从已有的 verifier 构造
    pub fn from_verifier(verifier: impl Into<String>, method: PkceMethod) -> Self {
        let verifier = verifier.into();
        let challenge = method.compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            method,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> PkceMethod {
        self.method
    }

    /// 返回 (code_challenge, code_challenge_method)
    pub fn authorization_params(&self) -> (&str, &str) {
        (&self.challenge, self.method.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuthErrorCode;
    use proptest::prelude::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn description(result: Result<()>) -> String {
        match result {
            Err(Error::OAuth(e)) => {
                assert_eq!(e.error, OAuthErrorCode::InvalidGrant);
                e.error_description
            }
            other => panic!("expected invalid_grant, got {:?}", other),
        }
    }

    #[test]
    fn test_rfc7636_vector() {
        assert_eq!(PkceMethod::S256.compute_challenge(VERIFIER), CHALLENGE);
        assert!(verify_pkce(Some(CHALLENGE), Some("S256"), Some(VERIFIER)).is_ok());
    }

    #[test]
    fn test_no_challenge_skips_check() {
        assert!(verify_pkce(None, None, None).is_ok());
        assert!(verify_pkce(None, Some("S256"), Some("anything")).is_ok());
    }

    #[test]
    fn test_missing_verifier() {
        assert_eq!(
            description(verify_pkce(Some(CHALLENGE), Some("S256"), None)),
            "Code verifier is required"
        );
        assert_eq!(
            description(verify_pkce(Some(CHALLENGE), Some("S256"), Some(""))),
            "Code verifier is required"
        );
    }

    #[test]
    fn test_unsupported_method() {
        assert_eq!(
            description(verify_pkce(Some(CHALLENGE), Some("S512"), Some(VERIFIER))),
            "Unsupported code challenge method"
        );
        // 区分大小写
        assert!(verify_pkce(Some(CHALLENGE), Some("s256"), Some(VERIFIER)).is_err());
    }

    #[test]
    fn test_wrong_verifier() {
        assert_eq!(
            description(verify_pkce(Some(CHALLENGE), Some("S256"), Some("wrong"))),
            "Invalid code verifier"
        );
    }

    #[test]
    fn test_plain() {
        assert!(verify_pkce(Some("abc"), Some("plain"), Some("abc")).is_ok());
        assert!(verify_pkce(Some("abc"), None, Some("abc")).is_ok());
        assert!(verify_pkce(Some("abc"), Some("plain"), Some("abcd")).is_err());
    }

    #[test]
    fn test_s256_challenge_is_not_accepted_as_plain_verifier() {
        assert!(verify_pkce(Some(CHALLENGE), Some("S256"), Some(CHALLENGE)).is_err());
    }

    #[test]
    fn test_generated_challenge() {
        let pkce = PkceChallenge::new(PkceMethod::S256).unwrap();

        assert_eq!(pkce.verifier().len(), 43);
        assert_eq!(pkce.challenge().len(), 43);
        assert_eq!(pkce.authorization_params().1, "S256");

        let other = PkceChallenge::new(PkceMethod::S256).unwrap();
        assert_ne!(pkce.verifier(), other.verifier());
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(VERIFIER));
        assert!(is_well_formed(CHALLENGE));
        assert!(is_well_formed(&"a".repeat(128)));

        assert!(!is_well_formed(""));
        assert!(!is_well_formed(&"a".repeat(42)));
        assert!(!is_well_formed(&"a".repeat(129)));
        assert!(!is_well_formed(&format!("{}+", &CHALLENGE[..42])));
    }

    proptest! {
        #[test]
        fn prop_generated_pair_verifies(verifier in "[A-Za-z0-9._~-]{43,128}") {
            let pkce = PkceChallenge::from_verifier(verifier.clone(), PkceMethod::S256);
            prop_assert!(verify_pkce(Some(pkce.challenge()), Some("S256"), Some(&verifier)).is_ok());
        }

        #[test]
        fn prop_other_verifier_rejected(
            verifier in "[A-Za-z0-9._~-]{43,64}",
            other in "[A-Za-z0-9._~-]{43,64}",
        ) {
            prop_assume!(verifier != other);
            let pkce = PkceChallenge::from_verifier(verifier, PkceMethod::S256);
            prop_assert!(verify_pkce(Some(pkce.challenge()), Some("S256"), Some(&other)).is_err());
        }
    }
}
