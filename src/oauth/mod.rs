//! OAuth 2.1 协议模块
//!
//! - **客户端** (`client`): 动态注册、认证与 scope 校验
//! - **PKCE** (`pkce`): RFC 7636 code_verifier 校验
//! - **Token** (`token`): token 端点的请求与响应
//! - **资源所有者认证** (`authenticator`): 密码模式使用的外部认证接口
//! - **授权类型分发** (`grant`): 四种授权类型的处理
//! - **授权端点** (`authorize`): 授权码流程
//! - **Token 内省** (`introspection`): RFC 7662
//! - **Token 撤销** (`revocation`): RFC 7009
//!
//! ## 客户端注册
//!
//! ```rust
//! use oauthrs::oauth::{ClientMetadata, ClientRegistry, ClientType, GrantType};
//!
//! let registry = ClientRegistry::new();
//! let registration = registry
//!     .register(
//!         ClientMetadata::new()
//!             .client_name("Service")
//!             .client_type(ClientType::Public)
//!             .grant_type(GrantType::ClientCredentials)
//!             .scope("read write"),
//!     )
//!     .unwrap();
//!
//! let client_id = &registration.client.client_id;
//! assert!(registry.validate_scope(client_id, "read").is_ok());
//! assert!(registry.validate_scope(client_id, "read delete").is_err());
//! ```

pub mod authenticator;
pub mod authorize;
pub mod client;
pub mod grant;
pub mod introspection;
pub mod pkce;
pub mod revocation;
pub mod token;

// ============================================================================
// 导出
// ============================================================================

pub use authenticator::{Authenticator, InMemoryAuthenticator};
pub use authorize::{
    AuthorizationError, AuthorizationFlow, AuthorizationOutcome, AuthorizationRequest,
    AuthorizationResponse,
};
pub use client::{
    ClientMetadata, ClientRegistration, ClientRegistry, ClientType, GrantType, OAuthClient,
    ResponseType,
};
pub use grant::{GrantDispatcher, GrantKind};
pub use introspection::{IntrospectionRequest, IntrospectionResponse, Introspector, TokenTypeHint};
pub use pkce::{PkceChallenge, PkceMethod, verify_pkce};
pub use revocation::{RevocationRequest, Revoker};
pub use token::{TokenRequest, TokenResponse, TokenType};
