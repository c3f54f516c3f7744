//! 统一错误类型模块
//!
//! 两层错误模型：
//!
//! - [`OAuthError`]: 协议层错误，带有 RFC 6749 定义的错误码和描述，可以直接
//!   序列化为 `{"error": ..., "error_description": ...}` 返回给客户端
//! - [`Error`]: 库内部错误（签名、存储、配置等），在协议边界上统一折叠为
//!   `server_error`，不向客户端泄露细节

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// oauthrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// oauthrs 库的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 协议层错误，原样传递给调用方
    #[error("{0}")]
    OAuth(#[from] OAuthError),

    /// 密码哈希错误
    #[error("Password hash error: {0}")]
    PasswordHash(#[from] PasswordHashError),

    /// Token 编解码错误
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// 加密错误
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 存储锁被毒化
    pub(crate) fn lock_poisoned() -> Self {
        Error::Storage(StorageError::OperationFailed("lock poisoned".to_string()))
    }

    /// 如果是协议层错误，返回其引用
    pub fn as_oauth(&self) -> Option<&OAuthError> {
        match self {
            Error::OAuth(e) => Some(e),
            _ => None,
        }
    }

    /// 折叠为协议层错误
    ///
    /// `OAuth` 变体原样返回，其余变体记录日志后变为 `server_error`，
    /// 描述使用调用方给出的 `context`。
    pub fn into_oauth(self, context: &str) -> OAuthError {
        match self {
            Error::OAuth(e) => e,
            other => {
                tracing::error!(error = %other, context, "internal failure");
                OAuthError::server_error(context)
            }
        }
    }
}

// ============================================================================
// 协议层错误
// ============================================================================

/// OAuth 错误代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// 请求缺少必需参数、包含无效参数值或格式错误
    InvalidRequest,
    /// 客户端认证失败或客户端不存在
    InvalidClient,
    /// 授权码、刷新令牌或资源所有者凭证无效、已过期、已撤销
    InvalidGrant,
    /// 客户端没有使用此授权类型的权限
    UnauthorizedClient,
    /// 授权服务器不支持此授权类型
    UnsupportedGrantType,
    /// 不支持的响应类型
    UnsupportedResponseType,
    /// 请求的范围无效、未知或超出允许范围
    InvalidScope,
    /// 重定向 URI 未注册
    InvalidRedirectUri,
    /// 客户端注册元数据无效
    InvalidClientMetadata,
    /// Token 无效
    InvalidToken,
    /// 授权服务器遇到意外情况
    ServerError,
    /// 授权服务器暂时无法处理请求
    TemporarilyUnavailable,
}

impl OAuthErrorCode {
    /// 协议中使用的错误码字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthErrorCode::InvalidRequest => "invalid_request",
            OAuthErrorCode::InvalidClient => "invalid_client",
            OAuthErrorCode::InvalidGrant => "invalid_grant",
            OAuthErrorCode::UnauthorizedClient => "unauthorized_client",
            OAuthErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            OAuthErrorCode::UnsupportedResponseType => "unsupported_response_type",
            OAuthErrorCode::InvalidScope => "invalid_scope",
            OAuthErrorCode::InvalidRedirectUri => "invalid_redirect_uri",
            OAuthErrorCode::InvalidClientMetadata => "invalid_client_metadata",
            OAuthErrorCode::InvalidToken => "invalid_token",
            OAuthErrorCode::ServerError => "server_error",
            OAuthErrorCode::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 错误响应
///
/// 符合 RFC 6749 Section 5.2 的错误响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}: {error_description}")]
pub struct OAuthError {
    /// 错误代码
    pub error: OAuthErrorCode,

    /// 错误描述
    pub error_description: String,
}

impl OAuthError {
    /// 创建新的 OAuth 错误
    pub fn new(error: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidClient, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant, description)
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::UnauthorizedClient, description)
    }

    pub fn unsupported_grant_type(grant_type: &str) -> Self {
        Self::new(
            OAuthErrorCode::UnsupportedGrantType,
            format!("Grant type not supported: {}", grant_type),
        )
    }

    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::UnsupportedResponseType, description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidScope, description)
    }

    pub fn invalid_redirect_uri(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRedirectUri, description)
    }

    pub fn invalid_client_metadata(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidClientMetadata, description)
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidToken, description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::ServerError, description)
    }

    pub fn temporarily_unavailable(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::TemporarilyUnavailable, description)
    }

    /// 构造错误重定向的查询参数
    ///
    /// `state` 原样回传，便于客户端关联请求。
    pub fn redirect_params(&self, state: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("error", self.error.as_str().to_string()),
            ("error_description", self.error_description.clone()),
        ];
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }
        params
    }
}

// ============================================================================
// 内部错误
// ============================================================================

/// Token 相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token 已过期
    #[error("token has expired")]
    Expired,
    /// Token 尚未生效
    #[error("token is not yet valid")]
    NotYetValid,
    /// Token 签名无效
    #[error("invalid token signature")]
    InvalidSignature,
    /// Token 格式无效
    #[error("invalid token format: {0}")]
    InvalidFormat(String),
    /// 无效的 claim 值
    #[error("invalid claim value: {0}")]
    InvalidClaim(String),
    /// Token 编码失败
    #[error("token encoding failed: {0}")]
    EncodingFailed(String),
}

/// 密码哈希相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordHashError {
    /// 哈希生成失败
    #[error("hash failed: {0}")]
    HashFailed(String),

    /// 无效的哈希格式
    #[error("invalid hash format: {0}")]
    InvalidFormat(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 缺少必需的配置
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
    /// 无效的配置值
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
    /// 配置解析失败
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 操作失败
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// 随机数生成失败
    #[error("random number generation failed: {0}")]
    RngFailed(String),
    /// 密钥无效
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// 密钥生成失败
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
