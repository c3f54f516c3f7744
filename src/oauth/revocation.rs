//! OAuth 2.0 Token 撤销 (RFC 7009)

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::ClientRegistry;
use super::introspection::TokenTypeHint;
use crate::audit::{AuditLogger, SecurityEvent};
use crate::config::ServerConfig;
use crate::error::OAuthError;
use crate::token::{RevocationList, TokenIssuer};

/// Token 撤销请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRequest {
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_hint: Option<TokenTypeHint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl RevocationRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_type_hint(mut self, hint: TokenTypeHint) -> Self {
        self.token_type_hint = Some(hint);
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<&str>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret.map(str::to_string);
        self
    }
}

/// 撤销端点
#[derive(Clone, Copy)]
pub struct Revoker<'a> {
    pub registry: &'a ClientRegistry,
    pub issuer: &'a TokenIssuer,
    pub revocations: &'a RevocationList,
    pub audit: &'a dyn AuditLogger,
    pub config: &'a ServerConfig,
}

impl Revoker<'_> {
    /// 撤销令牌
    ///
    /// - 客户端认证失败：`invalid_client`
    /// - 令牌无效或已过期：视为成功，没有需要撤销的东西
    /// - 令牌属于其他客户端：`invalid_client`
    ///
    /// 重复撤销同一个令牌同样成功。授权码也可以撤销，撤销后不能再兑换。
    pub fn revoke(&self, request: &RevocationRequest) -> Result<(), OAuthError> {
        let client = self
            .registry
            .authenticate_client_audited(
                request.client_id.as_deref(),
                request.client_secret.as_deref(),
                "revocation",
                self.audit,
            )
            .map_err(|e| e.into_oauth("Failed to authenticate client"))?;

        info!(client_id = %client.client_id, hint = ?request.token_type_hint, "token revocation request");

        let claims = match self.issuer.verify(&request.token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(client_id = %client.client_id, reason = %e, "nothing to revoke");
                return Ok(());
            }
        };

        if claims.client_id != client.client_id {
            warn!(
                client_id = %client.client_id,
                token_client_id = %claims.client_id,
                "revocation of another client's token"
            );
            return Err(OAuthError::invalid_client("Token does not belong to the client"));
        }

        let newly_revoked = self
            .revocations
            .revoke(&claims.jti, claims.retain_until(self.config.leeway))
            .map_err(|e| e.into_oauth("Failed to revoke token"))?;

        if newly_revoked {
            self.audit
                .log(SecurityEvent::token_revoked(&client.client_id, &claims.jti));
        }

        Ok(())
    }
}
