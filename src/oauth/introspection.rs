//! OAuth 2.0 Token 内省 (RFC 7662)
//!
//! 资源服务器向授权服务器查询令牌的状态。任何失败（客户端认证失败、
//! 签名无效、已过期、已撤销）都只返回 `active: false`，不说明原因。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::ClientRegistry;
use crate::audit::{AuditLogger, SecurityEvent};
use crate::error::{Error, OAuthError, Result};
use crate::token::{RevocationList, SignedClaimSet, TokenIssuer, TokenKind};

/// Token 内省请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionRequest {
    /// 要内省的令牌
    pub token: String,

    /// 令牌类型提示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_hint: Option<TokenTypeHint>,

    /// 发起请求的客户端
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl IntrospectionRequest {
    /// 为给定令牌创建新的内省请求
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// 设置令牌类型提示
    pub fn with_type_hint(mut self, hint: TokenTypeHint) -> Self {
        self.token_type_hint = Some(hint);
        self
    }

    /// 设置客户端凭证
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<&str>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret.map(str::to_string);
        self
    }
}

/// 被内省令牌的类型提示
///
/// 所有令牌共用同一个验证器，提示只用于日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// 访问令牌
    AccessToken,
    /// 刷新令牌
    RefreshToken,
}

/// Token 内省响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// 令牌是否活跃，响应中唯一必需的字段
    pub active: bool,

    /// 空格分隔的权限范围
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// 资源所有者标识
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// 令牌类型（"Bearer" 或 "refresh_token"）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    /// 表示令牌无效的响应
    pub fn inactive() -> Self {
        Self::default()
    }

    /// 由已验证的 claim 集合构造活跃响应
    pub fn from_claims(claims: SignedClaimSet) -> Self {
        Self {
            active: true,
            token_type: Some(claims.token_type.as_str().to_string()),
            username: Some(claims.sub.clone()),
            scope: claims.scope,
            client_id: Some(claims.client_id),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            nbf: Some(claims.nbf),
            sub: Some(claims.sub),
            aud: Some(claims.aud),
            iss: Some(claims.iss),
            jti: Some(claims.jti),
        }
    }

    /// 过期时间
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// 权限范围列表
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// 是否具有指定的权限范围
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }
}

// ============================================================================
// 内省端点
// ============================================================================

/// 内省端点
#[derive(Clone, Copy)]
pub struct Introspector<'a> {
    pub registry: &'a ClientRegistry,
    pub issuer: &'a TokenIssuer,
    pub revocations: &'a RevocationList,
    pub audit: &'a dyn AuditLogger,
}

impl Introspector<'_> {
    /// 内省令牌
    pub fn introspect(&self, request: &IntrospectionRequest) -> IntrospectionResponse {
        let client_id = request.client_id.as_deref().unwrap_or("");
        info!(client_id, hint = ?request.token_type_hint, "token introspection request");

        match self.active_claims(request) {
            Ok(claims) => {
                debug!(client_id, jti = %claims.jti, "token is active");
                IntrospectionResponse::from_claims(claims)
            }
            Err(e) => {
                info!(client_id, reason = %e, "token is inactive");
                self.audit
                    .log(SecurityEvent::introspection_failed(client_id, e.to_string()));
                IntrospectionResponse::inactive()
            }
        }
    }

    fn active_claims(&self, request: &IntrospectionRequest) -> Result<SignedClaimSet> {
        self.registry.authenticate_client_audited(
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
            "introspection",
            self.audit,
        )?;

        let claims = self.issuer.verify(&request.token)?;

        // 授权码不是可以对外使用的令牌
        if claims.token_type == TokenKind::AuthorizationCode {
            return Err(Error::OAuth(OAuthError::invalid_token("Invalid token")));
        }

        if self.revocations.is_revoked(&claims.jti)? {
            return Err(Error::OAuth(OAuthError::invalid_token("Token has been revoked")));
        }

        Ok(claims)
    }
}
