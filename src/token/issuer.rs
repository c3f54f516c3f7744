//! Token 签发与验证
//!
//! 访问令牌、刷新令牌、授权码都是同一把密钥签名的 claim 集合，
//! 由 `token_type` 区分用途。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::claims::{SignedClaimSet, TokenKind};
use super::jwt::{self, JwtValidator, JwtValidatorConfig};
use super::keys::KeyMaterial;
use crate::config::ServerConfig;
use crate::error::{Error, OAuthError, Result, TokenError};
use crate::oauth::pkce::verify_pkce;
use crate::random::generate_token_id;

/// 授权码绑定的参数
#[derive(Debug, Clone, Default)]
pub struct CodeBinding<'a> {
    pub redirect_uri: &'a str,
    pub scope: Option<&'a str>,
    pub code_challenge: Option<&'a str>,
    pub code_challenge_method: Option<&'a str>,
}

/// Token 签发器
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
    validator: JwtValidator,
    issuer: String,
    refresh_token_ttl: i64,
    authorization_code_ttl: i64,
}

impl TokenIssuer {
    /// 创建签发器
    pub fn new(keys: Arc<KeyMaterial>, config: &ServerConfig) -> Self {
        let validator = JwtValidator::new(
            keys.clone(),
            JwtValidatorConfig::new()
                .with_issuer(&config.issuer)
                .with_leeway(config.leeway),
        );

        Self {
            keys,
            validator,
            issuer: config.issuer.clone(),
            refresh_token_ttl: config.refresh_token_ttl,
            authorization_code_ttl: config.authorization_code_ttl,
        }
    }

    /// 签名密钥
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    // ========================================================================
    // 签发
    // ========================================================================

    /// 签发访问令牌
    pub fn issue_access_token(
        &self,
        client_id: &str,
        subject: &str,
        scope: Option<&str>,
        ttl_seconds: i64,
    ) -> Result<String> {
        let claims = self.base_claims(TokenKind::Access, client_id, subject, scope, ttl_seconds)?;
        self.sign(&claims)
    }

    /// 签发刷新令牌
    pub fn issue_refresh_token(
        &self,
        client_id: &str,
        subject: &str,
        scope: Option<&str>,
    ) -> Result<String> {
        let claims = self.base_claims(
            TokenKind::Refresh,
            client_id,
            subject,
            scope,
            self.refresh_token_ttl,
        )?;
        self.sign(&claims)
    }

    /// 签发授权码
    ///
    /// 给出 challenge 但没有给出方法时，方法记为 `plain`。
    pub fn issue_authorization_code(
        &self,
        client_id: &str,
        subject: &str,
        binding: CodeBinding<'_>,
    ) -> Result<String> {
        let mut claims = self.base_claims(
            TokenKind::AuthorizationCode,
            client_id,
            subject,
            binding.scope,
            self.authorization_code_ttl,
        )?;

        claims.redirect_uri = Some(binding.redirect_uri.to_string());
        if let Some(challenge) = binding.code_challenge {
            claims.code_challenge = Some(challenge.to_string());
            claims.code_challenge_method =
                Some(binding.code_challenge_method.unwrap_or("plain").to_string());
        }

        self.sign(&claims)
    }

    fn base_claims(
        &self,
        kind: TokenKind,
        client_id: &str,
        subject: &str,
        scope: Option<&str>,
        ttl_seconds: i64,
    ) -> Result<SignedClaimSet> {
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(ttl_seconds)
            .filter(|_| ttl_seconds >= 0)
            .ok_or_else(|| TokenError::InvalidClaim(format!("ttl out of range: {}", ttl_seconds)))?;

        Ok(SignedClaimSet {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: client_id.to_string(),
            iat: now,
            nbf: now,
            exp,
            jti: generate_token_id()?,
            scope: scope.filter(|s| !s.trim().is_empty()).map(str::to_string),
            client_id: client_id.to_string(),
            token_type: kind,
            redirect_uri: None,
            code_challenge: None,
            code_challenge_method: None,
        })
    }

    fn sign(&self, claims: &SignedClaimSet) -> Result<String> {
        let token = jwt::sign(&self.keys, claims)?;
        debug!(
            kind = %claims.token_type,
            client_id = %claims.client_id,
            jti = %claims.jti,
            exp = claims.exp,
            "signed token"
        );
        Ok(token)
    }

    // ========================================================================
    // 验证
    // ========================================================================

    /// 验证 token 并返回其 claim 集合
    ///
    /// 失败时返回 `invalid_token`。
    pub fn verify(&self, token: &str) -> Result<SignedClaimSet> {
        self.validator.validate(token).map_err(|e| {
            warn!(reason = %e, "token verification failed");
            let description = match e {
                TokenError::InvalidSignature => "Invalid token signature",
                TokenError::Expired => "Token has expired",
                TokenError::NotYetValid => "Token not yet valid",
                _ => "Invalid token",
            };
            Error::OAuth(OAuthError::invalid_token(description))
        })
    }

    /// 验证授权码并检查 PKCE
    ///
    /// 失败时返回 `invalid_grant`。访问令牌和刷新令牌不能当作授权码使用。
    pub fn verify_authorization_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<SignedClaimSet> {
        let claims = self.validator.validate(code).map_err(|e| {
            warn!(reason = %e, "authorization code verification failed");
            let description = match e {
                TokenError::Expired => "Authorization code has expired",
                TokenError::NotYetValid => "Authorization code not yet valid",
                _ => "Invalid authorization code",
            };
            Error::OAuth(OAuthError::invalid_grant(description))
        })?;

        if claims.token_type != TokenKind::AuthorizationCode {
            warn!(kind = %claims.token_type, "token presented as authorization code");
            return Err(OAuthError::invalid_grant("Invalid authorization code").into());
        }

        verify_pkce(
            claims.code_challenge.as_deref(),
            claims.code_challenge_method.as_deref(),
            code_verifier,
        )?;

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuthErrorCode;
    use std::sync::LazyLock;

    static KEYS: LazyLock<Arc<KeyMaterial>> =
        LazyLock::new(|| Arc::new(KeyMaterial::generate().unwrap()));

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(KEYS.clone(), &ServerConfig::default())
    }

    fn code_error(err: Error) -> OAuthError {
        err.as_oauth().cloned().expect("expected an OAuth error")
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token("client-1", "user-1", Some("read write"), 3600)
            .unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.aud, "client-1");
        assert_eq!(claims.client_id, "client-1");
        assert_eq!(claims.scope.as_deref(), Some("read write"));
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.iss, issuer.issuer());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_zero_ttl_fails_immediately() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token("client-1", "user-1", None, 0)
            .unwrap();

        let err = code_error(issuer.verify(&token).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidToken);
        assert_eq!(err.error_description, "Token has expired");
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let issuer = issuer();

        for ttl in [i64::MAX, -1] {
            let err = issuer
                .issue_access_token("client-1", "user-1", None, ttl)
                .unwrap_err();
            assert!(matches!(err, Error::Token(TokenError::InvalidClaim(_))), "{}", ttl);
        }

        // 未经校验的配置同样不会 panic
        let config = ServerConfig {
            refresh_token_ttl: i64::MAX,
            ..ServerConfig::default()
        };
        let issuer = TokenIssuer::new(KEYS.clone(), &config);
        assert!(issuer.issue_refresh_token("client-1", "user-1", None).is_err());
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let issuer = issuer();
        let token = issuer
            .issue_refresh_token("client-1", "user-1", Some("read"))
            .unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.token_type, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn test_jti_unique_per_token() {
        let issuer = issuer();
        let a = issuer.issue_access_token("c", "u", None, 60).unwrap();
        let b = issuer.issue_access_token("c", "u", None, 60).unwrap();

        assert_ne!(issuer.verify(&a).unwrap().jti, issuer.verify(&b).unwrap().jti);
    }

    #[test]
    fn test_authorization_code_with_pkce() {
        let issuer = issuer();
        let code = issuer
            .issue_authorization_code(
                "client-1",
                "user-1",
                CodeBinding {
                    redirect_uri: "https://app.example.com/cb",
                    scope: Some("read"),
                    code_challenge: Some(CHALLENGE),
                    code_challenge_method: Some("S256"),
                },
            )
            .unwrap();

        let claims = issuer
            .verify_authorization_code(&code, Some(VERIFIER))
            .unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.scope.as_deref(), Some("read"));
        assert_eq!(claims.redirect_uri.as_deref(), Some("https://app.example.com/cb"));
        assert_eq!(claims.exp - claims.iat, 300);

        let err = code_error(
            issuer
                .verify_authorization_code(&code, Some("wrong-verifier"))
                .unwrap_err(),
        );
        assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
        assert_eq!(err.error_description, "Invalid code verifier");

        let err = code_error(issuer.verify_authorization_code(&code, None).unwrap_err());
        assert_eq!(err.error_description, "Code verifier is required");
    }

    #[test]
    fn test_challenge_without_method_defaults_to_plain() {
        let issuer = issuer();
        let code = issuer
            .issue_authorization_code(
                "client-1",
                "user-1",
                CodeBinding {
                    redirect_uri: "https://app.example.com/cb",
                    code_challenge: Some("plain-verifier"),
                    ..Default::default()
                },
            )
            .unwrap();

        let claims = issuer
            .verify_authorization_code(&code, Some("plain-verifier"))
            .unwrap();
        assert_eq!(claims.code_challenge_method.as_deref(), Some("plain"));
    }

    #[test]
    fn test_access_token_is_not_a_code() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token("client-1", "user-1", None, 60)
            .unwrap();

        let err = code_error(issuer.verify_authorization_code(&token, None).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
        assert_eq!(err.error_description, "Invalid authorization code");
    }

    #[test]
    fn test_expired_code() {
        let config = ServerConfig::default().with_authorization_code_ttl(0);
        let issuer = TokenIssuer::new(KEYS.clone(), &config);
        let code = issuer
            .issue_authorization_code(
                "client-1",
                "user-1",
                CodeBinding {
                    redirect_uri: "https://app.example.com/cb",
                    ..Default::default()
                },
            )
            .unwrap();

        let err = code_error(issuer.verify_authorization_code(&code, None).unwrap_err());
        assert_eq!(err.error_description, "Authorization code has expired");
    }

    #[test]
    fn test_other_issuer_rejected() {
        let other = TokenIssuer::new(
            KEYS.clone(),
            &ServerConfig::default().with_issuer("https://other.example.com"),
        );
        let token = other.issue_access_token("c", "u", None, 60).unwrap();

        let err = code_error(issuer().verify(&token).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidToken);
    }
}
