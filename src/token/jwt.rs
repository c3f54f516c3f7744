//! JWT (RS256) 编解码
//!
//! 所有 token 都是用 [`KeyMaterial`] 签名的 JWT。验证分两步：
//!
//! 1. 由 `jsonwebtoken` 校验签名、算法和签发者，签名通过之前不信任任何 claim
//! 2. 自行比较 `exp` / `nbf` 与当前时间（`now >= exp` 即过期）

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header, TokenData, Validation, decode, encode, errors::ErrorKind};

use super::claims::SignedClaimSet;
use super::keys::KeyMaterial;
use crate::error::{Error, Result, TokenError};

/// 对 claim 集合签名
///
/// header 中带上 `kid`，方便资源服务器从 JWKS 中挑选公钥。
pub fn sign(keys: &KeyMaterial, claims: &SignedClaimSet) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(keys.kid().to_string());

    encode(&header, claims, keys.encoding_key()).map_err(|e| {
        Error::Token(TokenError::EncodingFailed(format!(
            "failed to encode JWT: {}",
            e
        )))
    })
}

/// JWT 验证器配置
#[derive(Debug, Clone, Default)]
pub struct JwtValidatorConfig {
    /// 期望的签发者
    pub issuer: Option<String>,
    /// 允许的时钟偏差（秒）
    pub leeway: i64,
}

impl JwtValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = leeway;
        self
    }
}

/// JWT 验证器
#[derive(Debug, Clone)]
pub struct JwtValidator {
    keys: Arc<KeyMaterial>,
    config: JwtValidatorConfig,
}

impl JwtValidator {
    pub fn new(keys: Arc<KeyMaterial>, config: JwtValidatorConfig) -> Self {
        Self { keys, config }
    }

    /// 验证并解码 JWT
    pub fn validate(&self, token: &str) -> std::result::Result<SignedClaimSet, TokenError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// 以给定时间为"当前时间"验证 JWT
    pub fn validate_at(
        &self,
        token: &str,
        now: i64,
    ) -> std::result::Result<SignedClaimSet, TokenError> {
        let validation = self.build_validation();

        let token_data: TokenData<SignedClaimSet> =
            decode(token, self.keys.decoding_key(), &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                ErrorKind::InvalidIssuer => TokenError::InvalidClaim("invalid issuer".to_string()),
                ErrorKind::MissingRequiredClaim(claim) => {
                    TokenError::InvalidClaim(format!("missing claim: {}", claim))
                }
                _ => TokenError::InvalidFormat(e.to_string()),
            })?;

        let claims = token_data.claims;

        if claims.is_expired_at(now, self.config.leeway) {
            return Err(TokenError::Expired);
        }
        if claims.is_immature_at(now, self.config.leeway) {
            return Err(TokenError::NotYetValid);
        }

        Ok(claims)
    }

    fn build_validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        // 时间窗口在签名通过后自行检查
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub", "aud"]);

        if let Some(ref iss) = self.config.issuer {
            validation.set_issuer(&[iss]);
        }

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::claims::TokenKind;
    use std::sync::LazyLock;

    static KEYS: LazyLock<Arc<KeyMaterial>> =
        LazyLock::new(|| Arc::new(KeyMaterial::generate().unwrap()));

    const ISSUER: &str = "https://auth.example.com";

    fn claims(iat: i64, ttl: i64) -> SignedClaimSet {
        SignedClaimSet {
            iss: ISSUER.to_string(),
            sub: "user123".to_string(),
            aud: "client-1".to_string(),
            iat,
            nbf: iat,
            exp: iat + ttl,
            jti: "jti-1".to_string(),
            scope: Some("read".to_string()),
            client_id: "client-1".to_string(),
            token_type: TokenKind::Access,
            redirect_uri: None,
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    fn validator() -> JwtValidator {
        JwtValidator::new(
            KEYS.clone(),
            JwtValidatorConfig::new().with_issuer(ISSUER),
        )
    }

    #[test]
    fn test_sign_and_validate() {
        let now = Utc::now().timestamp();
        let token = sign(&KEYS, &claims(now, 3600)).unwrap();

        assert_eq!(token.matches('.').count(), 2);

        let decoded = validator().validate(&token).unwrap();
        assert_eq!(decoded, claims(now, 3600));
    }

    #[test]
    fn test_header_carries_kid() {
        let token = sign(&KEYS, &claims(Utc::now().timestamp(), 60)).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();

        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(KEYS.kid()));
    }

    #[test]
    fn test_expired() {
        let token = sign(&KEYS, &claims(1_000, 60)).unwrap();

        assert_eq!(validator().validate_at(&token, 1_059).map(|c| c.sub), Ok("user123".to_string()));
        assert_eq!(validator().validate_at(&token, 1_060), Err(TokenError::Expired));
    }

    #[test]
    fn test_leeway_extends_window() {
        let token = sign(&KEYS, &claims(1_000, 60)).unwrap();
        let lenient = JwtValidator::new(KEYS.clone(), JwtValidatorConfig::new().with_leeway(30));

        assert!(lenient.validate_at(&token, 1_070).is_ok());
        assert!(lenient.validate_at(&token, 970).is_ok());
        assert_eq!(lenient.validate_at(&token, 969), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_not_yet_valid() {
        let token = sign(&KEYS, &claims(2_000, 60)).unwrap();
        assert_eq!(validator().validate_at(&token, 1_999), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = sign(&KEYS, &claims(Utc::now().timestamp(), 60)).unwrap();
        let other = JwtValidator::new(
            KEYS.clone(),
            JwtValidatorConfig::new().with_issuer("https://evil.example.com"),
        );

        assert!(matches!(other.validate(&token), Err(TokenError::InvalidClaim(_))));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other_keys = Arc::new(KeyMaterial::generate().unwrap());
        let token = sign(&other_keys, &claims(Utc::now().timestamp(), 60)).unwrap();

        assert_eq!(validator().validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validator().validate("not-a-jwt"),
            Err(TokenError::InvalidFormat(_))
        ));
    }
}
