//! # oauthrs
//!
//! OAuth 2.1 授权服务器核心。
//!
//! ## 功能特性
//!
//! - **客户端注册**: RFC 7591 动态注册，公开 / 机密客户端
//! - **授权码流程**: 强制校验重定向地址，支持 PKCE (RFC 7636)
//! - **Token 端点**: 授权码、密码、客户端凭证、刷新令牌四种授权类型
//! - **RS256 签名**: 自包含的 JWT 令牌，通过 JWKS 发布公钥
//! - **内省与撤销**: RFC 7662 / RFC 7009
//! - **审计日志**: 关键安全事件通过 [`audit::AuditLogger`] 记录
//!
//! 所有操作都是同步的，不依赖任何异步运行时；HTTP 传输层由调用方提供。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use oauthrs::{AuthorizationServer, ServerConfig};
//! use oauthrs::oauth::{ClientMetadata, ClientType, GrantType, TokenRequest};
//!
//! let server = AuthorizationServer::generate(ServerConfig::default()).unwrap();
//!
//! let client = server
//!     .register_client(
//!         ClientMetadata::new()
//!             .client_name("Batch Job")
//!             .client_type(ClientType::Public)
//!             .grant_type(GrantType::ClientCredentials)
//!             .scope("read"),
//!     )
//!     .unwrap()
//!     .client;
//!
//! let response = server
//!     .token(
//!         &TokenRequest::client_credentials()
//!             .with_client(&client.client_id, None)
//!             .with_scope("read"),
//!     )
//!     .unwrap();
//! assert!(response.refresh_token.is_none());
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod oauth;
pub mod random;
pub mod server;
pub mod token;

pub use config::ServerConfig;
pub use error::{Error, OAuthError, OAuthErrorCode, Result};
pub use server::AuthorizationServer;

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{
    constant_time_compare, constant_time_compare_str, generate_random_alphanumeric,
    generate_random_base64_url, generate_random_bytes, generate_random_hex,
};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use token::{Jwks, KeyMaterial, SignedClaimSet, TokenIssuer, TokenKind};
