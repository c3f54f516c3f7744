//! 授权端点
//!
//! 处理 `response_type=code` 的授权请求。在 `client_id` 和 `redirect_uri`
//! 校验通过之前发生的错误直接返回给调用方，不能重定向到一个未经验证的地址；
//! 之后的错误通过重定向带回客户端，并保留 `state`。

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::client::{ClientRegistry, GrantType, OAuthClient, ResponseType};
use super::pkce::{self, PkceMethod};
use crate::audit::{AuditLogger, SecurityEvent};
use crate::config::ServerConfig;
use crate::error::{Error, OAuthError, Result};
use crate::token::{CodeBinding, TokenIssuer};

/// 授权请求参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl AuthorizationRequest {
    /// `response_type=code` 的请求
    pub fn code(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            response_type: Some(ResponseType::Code.as_str().to_string()),
            client_id: Some(client_id.into()),
            redirect_uri: Some(redirect_uri.into()),
            ..Default::default()
        }
    }

    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = Some(response_type.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// 设置 PKCE 参数
    pub fn with_pkce(mut self, challenge: impl Into<String>, method: PkceMethod) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method.as_str().to_string());
        self
    }

    fn scope(&self) -> Option<&str> {
        self.scope.as_deref().filter(|s| !s.trim().is_empty())
    }

    fn state(&self) -> Option<&str> {
        self.state.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// 授权请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// 资源所有者尚未登录
    ///
    /// 携带已通过校验的请求，登录完成后可以用同一请求重新调用。
    LoginRequired(AuthorizationRequest),

    /// 重定向回客户端
    Redirect(AuthorizationResponse),
}

/// 不能重定向的授权错误
///
/// `client_id` 或 `redirect_uri` 未通过校验时返回。调用方直接向用户展示，
/// `state` 原样带回。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct AuthorizationError {
    pub error: OAuthError,
    pub state: Option<String>,
}

impl AuthorizationError {
    /// 错误响应参数，含 `state`
    pub fn params(&self) -> Vec<(&'static str, String)> {
        self.error.redirect_params(self.state.as_deref())
    }
}

/// 重定向回客户端的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResponse {
    /// 授权成功
    Code {
        redirect_uri: String,
        code: String,
        state: Option<String>,
    },
    /// 授权失败
    Error {
        redirect_uri: String,
        error: OAuthError,
        state: Option<String>,
    },
}

impl AuthorizationResponse {
    pub fn redirect_uri(&self) -> &str {
        match self {
            AuthorizationResponse::Code { redirect_uri, .. }
            | AuthorizationResponse::Error { redirect_uri, .. } => redirect_uri,
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            AuthorizationResponse::Code { state, .. }
            | AuthorizationResponse::Error { state, .. } => state.as_deref(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AuthorizationResponse::Code { code, .. } => Some(code),
            AuthorizationResponse::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&OAuthError> {
        match self {
            AuthorizationResponse::Code { .. } => None,
            AuthorizationResponse::Error { error, .. } => Some(error),
        }
    }

    /// 构造完整的重定向地址
    ///
    /// 参数追加在已注册 URI 原有的查询参数之后。
    pub fn redirect_url(&self) -> Result<String> {
        let mut url = Url::parse(self.redirect_uri())
            .map_err(|e| Error::internal(format!("invalid redirect URI: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            match self {
                AuthorizationResponse::Code { code, state, .. } => {
                    query.append_pair("code", code);
                    if let Some(state) = state {
                        query.append_pair("state", state);
                    }
                }
                AuthorizationResponse::Error { error, state, .. } => {
                    for (key, value) in error.redirect_params(state.as_deref()) {
                        query.append_pair(key, &value);
                    }
                }
            }
        }

        Ok(url.into())
    }
}

// ============================================================================
// 授权流程
// ============================================================================

/// 授权端点
///
/// 借用服务器持有的组件，每个请求构造一次。
#[derive(Clone, Copy)]
pub struct AuthorizationFlow<'a> {
    pub registry: &'a ClientRegistry,
    pub issuer: &'a TokenIssuer,
    pub audit: &'a dyn AuditLogger,
    pub config: &'a ServerConfig,
}

impl AuthorizationFlow<'_> {
    /// 处理授权请求
    ///
    /// `subject` 为已登录的资源所有者，`None` 时返回
    /// [`AuthorizationOutcome::LoginRequired`]。
    ///
    /// 返回 `Err` 表示 `client_id` 或 `redirect_uri` 无效，调用方应直接
    /// 展示错误而不是重定向；错误中保留了请求的 `state`。
    pub fn handle(
        &self,
        request: AuthorizationRequest,
        subject: Option<&str>,
    ) -> std::result::Result<AuthorizationOutcome, AuthorizationError> {
        let reject = |error: OAuthError| AuthorizationError {
            error,
            state: request.state().map(str::to_string),
        };

        let client_id = request
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| reject(OAuthError::invalid_request("client_id is required")))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| reject(OAuthError::invalid_request("redirect_uri is required")))?;

        let client = self
            .registry
            .validate_client(client_id, Some(redirect_uri))
            .map_err(|e| reject(e.into_oauth("Failed to validate client")))?;

        info!(client_id, "authorization request");

        if let Err(error) = self.check(&client, &request) {
            warn!(client_id, error = %error, "authorization request denied");
            self.audit
                .log(SecurityEvent::authorization_denied(client_id, error.error.as_str()));
            return Ok(self.redirect_error(error, &request, redirect_uri));
        }

        let Some(subject) = subject else {
            return Ok(AuthorizationOutcome::LoginRequired(request));
        };

        let binding = CodeBinding {
            redirect_uri,
            scope: request.scope(),
            code_challenge: request.code_challenge.as_deref(),
            code_challenge_method: request.code_challenge_method.as_deref(),
        };

        match self.issuer.issue_authorization_code(client_id, subject, binding) {
            Ok(code) => {
                self.audit
                    .log(SecurityEvent::authorization_code_issued(client_id, subject));
                Ok(AuthorizationOutcome::Redirect(AuthorizationResponse::Code {
                    redirect_uri: redirect_uri.to_string(),
                    code,
                    state: request.state().map(str::to_string),
                }))
            }
            Err(e) => {
                let error = e.into_oauth("Failed to issue authorization code");
                Ok(self.redirect_error(error, &request, redirect_uri))
            }
        }
    }

    /// 客户端与重定向地址校验之后的检查
    fn check(
        &self,
        client: &OAuthClient,
        request: &AuthorizationRequest,
    ) -> std::result::Result<(), OAuthError> {
        if request.response_type.as_deref() != Some(ResponseType::Code.as_str()) {
            return Err(OAuthError::unsupported_response_type(
                "Only 'code' response type is supported",
            ));
        }

        if !client.allows_response_type(ResponseType::Code)
            || !client.allows_grant_type(GrantType::AuthorizationCode)
        {
            return Err(OAuthError::unauthorized_client(
                "Client is not authorized to use the authorization code flow",
            ));
        }

        match request.code_challenge.as_deref() {
            Some(challenge) => {
                if let Some(method) = request.code_challenge_method.as_deref() {
                    method.parse::<PkceMethod>().map_err(|_| {
                        OAuthError::invalid_request("Unsupported code challenge method")
                    })?;
                }
                if !pkce::is_well_formed(challenge) {
                    return Err(OAuthError::invalid_request("Invalid code_challenge"));
                }
            }
            None if self.config.require_pkce_for_public_clients && !client.is_confidential() => {
                return Err(OAuthError::invalid_request("code_challenge is required"));
            }
            None => {}
        }

        if let Some(scope) = request.scope() {
            self.registry
                .validate_scope(&client.client_id, scope)
                .map_err(|e| e.into_oauth("Failed to validate scope"))?;
        }

        Ok(())
    }

    fn redirect_error(
        &self,
        error: OAuthError,
        request: &AuthorizationRequest,
        redirect_uri: &str,
    ) -> AuthorizationOutcome {
        AuthorizationOutcome::Redirect(AuthorizationResponse::Error {
            redirect_uri: redirect_uri.to_string(),
            error,
            state: request.state().map(str::to_string),
        })
    }
}
