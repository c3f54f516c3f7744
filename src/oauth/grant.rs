//! Token 端点的授权类型分发
//!
//! 原始请求先被解析为封闭的 [`GrantKind`]，再由 [`GrantDispatcher`] 穷尽匹配
//! 到对应的处理函数。新增授权类型时编译器会指出所有需要处理的位置。
//!
//! 处理流程：
//!
//! 1. 认证客户端
//! 2. 解析 `grant_type` 及其参数
//! 3. 检查客户端注册了该授权类型
//! 4. 执行处理函数，内部错误折叠为 `server_error`

use tracing::{debug, info, warn};

use super::authenticator::Authenticator;
use super::client::{ClientRegistry, GrantType, OAuthClient};
use super::token::{TokenRequest, TokenResponse};
use crate::audit::{AuditLogger, SecurityEvent};
use crate::config::ServerConfig;
use crate::error::{OAuthError, Result};
use crate::token::{CodeLedger, RevocationList, SignedClaimSet, TokenIssuer, TokenKind};

/// 已解析的授权请求
///
/// 每个变体只包含该授权类型需要的参数，缺失的必需参数在解析时报
/// `invalid_request`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantKind {
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    Password {
        username: String,
        password: String,
        scope: Option<String>,
    },
    ClientCredentials {
        scope: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
        scope: Option<String>,
    },
}

impl GrantKind {
    /// 从 token 请求解析
    ///
    /// 未知的授权类型以及 `implicit`（不在 token 端点使用）返回
    /// `unsupported_grant_type`。
    pub fn from_request(request: &TokenRequest) -> std::result::Result<Self, OAuthError> {
        let grant_type = request
            .grant_type
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_request("grant_type is required"))?;

        let parsed: GrantType = grant_type
            .parse()
            .map_err(|_| OAuthError::unsupported_grant_type(grant_type))?;

        let scope = request.scope.clone().filter(|s| !s.trim().is_empty());

        match parsed {
            GrantType::AuthorizationCode => Ok(GrantKind::AuthorizationCode {
                code: required(&request.code, "code")?,
                redirect_uri: required(&request.redirect_uri, "redirect_uri")?,
                code_verifier: request.code_verifier.clone(),
            }),
            GrantType::Password => Ok(GrantKind::Password {
                username: required(&request.username, "username")?,
                password: required(&request.password, "password")?,
                scope,
            }),
            GrantType::ClientCredentials => Ok(GrantKind::ClientCredentials { scope }),
            GrantType::RefreshToken => Ok(GrantKind::RefreshToken {
                refresh_token: required(&request.refresh_token, "refresh_token")?,
                scope,
            }),
            GrantType::Implicit => Err(OAuthError::unsupported_grant_type(grant_type)),
        }
    }

    /// 对应的注册授权类型
    pub fn grant_type(&self) -> GrantType {
        match self {
            GrantKind::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            GrantKind::Password { .. } => GrantType::Password,
            GrantKind::ClientCredentials { .. } => GrantType::ClientCredentials,
            GrantKind::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

fn required(value: &Option<String>, name: &str) -> std::result::Result<String, OAuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OAuthError::invalid_request(format!("{} is required", name)))
}

// ============================================================================
// 分发器
// ============================================================================

/// 授权类型分发器
///
/// 借用服务器持有的组件，每个请求构造一次。
#[derive(Clone, Copy)]
pub struct GrantDispatcher<'a> {
    pub registry: &'a ClientRegistry,
    pub issuer: &'a TokenIssuer,
    pub authenticator: &'a dyn Authenticator,
    pub audit: &'a dyn AuditLogger,
    pub revocations: &'a RevocationList,
    pub codes: &'a CodeLedger,
    pub config: &'a ServerConfig,
}

impl GrantDispatcher<'_> {
    /// 处理 token 请求
    pub fn dispatch(&self, request: &TokenRequest) -> std::result::Result<TokenResponse, OAuthError> {
        let grant_type = request.grant_type.as_deref().unwrap_or("");
        let client_id = request.client_id.as_deref().unwrap_or("");
        info!(grant_type, client_id, "token request");

        self.try_dispatch(request).inspect_err(|e| {
            warn!(grant_type, client_id, error = %e.error, "token request rejected");
            self.audit.log(SecurityEvent::grant_rejected(
                client_id,
                grant_type,
                e.error.as_str(),
            ));
        })
    }

    fn try_dispatch(&self, request: &TokenRequest) -> std::result::Result<TokenResponse, OAuthError> {
        let client = self
            .registry
            .authenticate_client_audited(
                request.client_id.as_deref(),
                request.client_secret.as_deref(),
                "token",
                self.audit,
            )
            .map_err(|e| e.into_oauth("Failed to authenticate client"))?;

        let grant = GrantKind::from_request(request)?;
        let grant_type = grant.grant_type();

        if !client.allows_grant_type(grant_type) {
            return Err(OAuthError::unauthorized_client(format!(
                "Client is not authorized to use grant type: {}",
                grant_type
            )));
        }

        let context = format!("Failed to handle {} grant", grant_type);
        let response = match grant {
            GrantKind::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => self.authorization_code(
                &client,
                &code,
                &redirect_uri,
                code_verifier.as_deref(),
            ),
            GrantKind::Password {
                username,
                password,
                scope,
            } => self.password(&client, &username, &password, scope.as_deref()),
            GrantKind::ClientCredentials { scope } => {
                self.client_credentials(&client, scope.as_deref())
            }
            GrantKind::RefreshToken {
                refresh_token,
                scope,
            } => self.refresh_token(&client, &refresh_token, scope.as_deref()),
        }
        .map_err(|e| e.into_oauth(&context))?;

        Ok(response)
    }

    // ========================================================================
    // 授权码模式
    // ========================================================================

    fn authorization_code(
        &self,
        client: &OAuthClient,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse> {
        let claims = self.issuer.verify_authorization_code(code, code_verifier)?;

        if claims.client_id != client.client_id {
            warn!(
                client_id = %client.client_id,
                code_client_id = %claims.client_id,
                "authorization code issued to another client"
            );
            return Err(OAuthError::invalid_grant("Invalid authorization code").into());
        }

        if claims.redirect_uri.as_deref() != Some(redirect_uri) {
            warn!(client_id = %client.client_id, "redirect_uri does not match authorization code");
            return Err(OAuthError::invalid_grant("redirect_uri does not match").into());
        }

        if self.revocations.is_revoked(&claims.jti)? {
            warn!(client_id = %client.client_id, jti = %claims.jti, "revoked authorization code presented");
            return Err(OAuthError::invalid_grant("Authorization code has been revoked").into());
        }

        if self.config.single_use_codes
            && !self.codes.consume(&claims.jti, claims.retain_until(self.config.leeway))?
        {
            warn!(client_id = %client.client_id, jti = %claims.jti, "authorization code replayed");
            self.audit.log(SecurityEvent::authorization_code_replayed(
                &client.client_id,
                &claims.sub,
            ));
            return Err(OAuthError::invalid_grant("Authorization code has already been used").into());
        }

        debug!(client_id = %client.client_id, subject = %claims.sub, "authorization code redeemed");
        self.issue_pair(client, GrantType::AuthorizationCode, &claims.sub, claims.scope.as_deref())
    }

    // ========================================================================
    // 密码模式
    // ========================================================================

    fn password(
        &self,
        client: &OAuthClient,
        username: &str,
        password: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse> {
        let subject = self.authenticator.authenticate(username, password)?;

        if let Some(scope) = scope {
            self.authenticator.validate_scope(&subject, scope)?;
            self.registry.validate_scope(&client.client_id, scope)?;
        }

        self.issue_pair(client, GrantType::Password, &subject, scope)
    }

    // ========================================================================
    // 客户端凭证模式
    // ========================================================================

    fn client_credentials(&self, client: &OAuthClient, scope: Option<&str>) -> Result<TokenResponse> {
        if let Some(scope) = scope {
            self.registry.validate_scope(&client.client_id, scope)?;
        }

        // 客户端以自身身份访问，不签发刷新令牌
        let access_token = self.issuer.issue_access_token(
            &client.client_id,
            &client.client_id,
            scope,
            self.config.access_token_ttl,
        )?;

        self.audit.log(SecurityEvent::token_issued(
            &client.client_id,
            GrantType::ClientCredentials.as_str(),
            None,
        ));

        Ok(TokenResponse::new(access_token, self.expires_in()).with_scope(scope))
    }

    // ========================================================================
    // 刷新令牌
    // ========================================================================

    fn refresh_token(
        &self,
        client: &OAuthClient,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse> {
        let claims = self
            .issuer
            .verify(refresh_token)
            .map_err(|_| OAuthError::invalid_grant("Invalid refresh token"))?;

        if claims.token_type != TokenKind::Refresh {
            return Err(OAuthError::invalid_grant("Invalid refresh token").into());
        }

        if claims.client_id != client.client_id {
            warn!(
                client_id = %client.client_id,
                token_client_id = %claims.client_id,
                "refresh token presented by another client"
            );
            return Err(OAuthError::invalid_client("Token does not belong to the client").into());
        }

        if self.revocations.is_revoked(&claims.jti)? {
            warn!(client_id = %client.client_id, jti = %claims.jti, "revoked refresh token presented");
            self.audit.log(SecurityEvent::refresh_token_reuse_detected(
                &client.client_id,
                &claims.sub,
            ));
            return Err(OAuthError::invalid_grant("Refresh token has been revoked").into());
        }

        let scope = narrow_scope(&claims, scope)?;

        if self.config.rotate_refresh_tokens
            && !self
                .revocations
                .revoke(&claims.jti, claims.retain_until(self.config.leeway))?
        {
            // 并发请求中另一个已经完成了轮换
            self.audit.log(SecurityEvent::refresh_token_reuse_detected(
                &client.client_id,
                &claims.sub,
            ));
            return Err(OAuthError::invalid_grant("Refresh token has been revoked").into());
        }

        self.issue_pair(client, GrantType::RefreshToken, &claims.sub, scope)
    }

    // ========================================================================
    // 辅助方法
    // ========================================================================

    fn issue_pair(
        &self,
        client: &OAuthClient,
        grant_type: GrantType,
        subject: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse> {
        let access_token = self.issuer.issue_access_token(
            &client.client_id,
            subject,
            scope,
            self.config.access_token_ttl,
        )?;
        let refresh_token = self
            .issuer
            .issue_refresh_token(&client.client_id, subject, scope)?;

        self.audit.log(SecurityEvent::token_issued(
            &client.client_id,
            grant_type.as_str(),
            Some(subject),
        ));

        Ok(TokenResponse::new(access_token, self.expires_in())
            .with_refresh_token(refresh_token)
            .with_scope(scope))
    }

    fn expires_in(&self) -> u64 {
        u64::try_from(self.config.access_token_ttl).unwrap_or(0)
    }
}

/// 刷新时可以收窄 scope，但不能超出原授权
fn narrow_scope<'a>(claims: &'a SignedClaimSet, requested: Option<&'a str>) -> Result<Option<&'a str>> {
    let Some(requested) = requested else {
        return Ok(claims.scope.as_deref());
    };

    let granted = claims.scopes();
    if let Some(extra) = requested.split_whitespace().find(|s| !granted.contains(s)) {
        return Err(OAuthError::invalid_scope(format!("Scope not allowed: {}", extra)).into());
    }

    Ok(Some(requested))
}
