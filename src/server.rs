//! 授权服务器
//!
//! [`AuthorizationServer`] 持有签名密钥、客户端注册表和服务端记录，对外提供
//! 每个端点对应的操作。传输层（HTTP 路由、表单解析、登录页面）不在本库中，
//! 调用方把解析好的请求交给这里，再把返回值渲染成响应。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oauthrs::config::ServerConfig;
//! use oauthrs::oauth::{
//!     AuthorizationOutcome, AuthorizationRequest, ClientMetadata, ClientType, GrantType,
//!     InMemoryAuthenticator, TokenRequest,
//! };
//! use oauthrs::server::AuthorizationServer;
//!
//! let authenticator = InMemoryAuthenticator::new()
//!     .with_user("alice", "password", "user-alice", &["read"])
//!     .unwrap();
//! let server = AuthorizationServer::generate(ServerConfig::default())
//!     .unwrap()
//!     .with_authenticator(Arc::new(authenticator));
//!
//! let client = server
//!     .register_client(
//!         ClientMetadata::new()
//!             .client_name("Web App")
//!             .client_type(ClientType::Public)
//!             .grant_type(GrantType::AuthorizationCode)
//!             .redirect_uri("https://app.example.com/cb")
//!             .scope("read"),
//!     )
//!     .unwrap()
//!     .client;
//!
//! let request = AuthorizationRequest::code(&client.client_id, "https://app.example.com/cb");
//! if let AuthorizationOutcome::Redirect(response) =
//!     server.authorize(request, Some("user-alice")).unwrap()
//! {
//!     let code = response.code().unwrap();
//!     let tokens = server
//!         .token(
//!             &TokenRequest::authorization_code(code)
//!                 .with_client(&client.client_id, None)
//!                 .with_redirect_uri(response.redirect_uri()),
//!         )
//!         .unwrap();
//!     assert_eq!(tokens.expires_in, 3600);
//! }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::audit::{AuditLogger, NoOpAuditLogger, SecurityEvent};
use crate::config::ServerConfig;
use crate::error::{OAuthError, Result};
use crate::oauth::authenticator::{Authenticator, InMemoryAuthenticator};
use crate::oauth::authorize::{
    AuthorizationError, AuthorizationFlow, AuthorizationOutcome, AuthorizationRequest,
};
use crate::oauth::client::{ClientMetadata, ClientRegistration, ClientRegistry, OAuthClient};
use crate::oauth::grant::GrantDispatcher;
use crate::oauth::introspection::{IntrospectionRequest, IntrospectionResponse, Introspector};
use crate::oauth::revocation::{RevocationRequest, Revoker};
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::token::{CodeLedger, Jwks, KeyMaterial, RevocationList, TokenIssuer};

/// 授权服务器
///
/// 克隆后共享同一份注册表与撤销记录，可以在线程间传递。
#[derive(Clone)]
pub struct AuthorizationServer {
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    issuer: TokenIssuer,
    authenticator: Arc<dyn Authenticator>,
    audit: Arc<dyn AuditLogger>,
    revocations: Arc<RevocationList>,
    codes: Arc<CodeLedger>,
}

impl AuthorizationServer {
    /// 使用已有的签名密钥创建
    ///
    /// 默认没有任何资源所有者（密码模式总是失败），审计事件被丢弃。
    pub fn new(config: ServerConfig, keys: Arc<KeyMaterial>) -> Result<Self> {
        config.validate()?;

        info!(issuer = %config.issuer, kid = %keys.kid(), "authorization server initialized");

        Ok(Self {
            issuer: TokenIssuer::new(keys, &config),
            registry: Arc::new(ClientRegistry::new()),
            authenticator: Arc::new(InMemoryAuthenticator::new()),
            audit: Arc::new(NoOpAuditLogger::new()),
            revocations: Arc::new(RevocationList::new()),
            codes: Arc::new(CodeLedger::new()),
            config,
        })
    }

    /// 生成新的签名密钥并创建
    pub fn generate(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let keys = KeyMaterial::generate_with_bits(config.key_bits)?;
        Self::new(config, Arc::new(keys))
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    // ========================================================================
    // 客户端注册 (RFC 7591 / 7592)
    // ========================================================================

    /// 注册客户端
    ///
    /// 机密客户端的明文密钥只在这里返回一次。
    pub fn register_client(
        &self,
        metadata: ClientMetadata,
    ) -> std::result::Result<ClientRegistration, OAuthError> {
        let registration = self
            .registry
            .register(metadata)
            .map_err(|e| e.into_oauth("Failed to register client"))?;

        self.audit
            .log(SecurityEvent::client_registered(&registration.client.client_id));
        Ok(registration)
    }

    pub fn get_client(&self, client_id: &str) -> std::result::Result<OAuthClient, OAuthError> {
        self.registry
            .get_client(client_id)
            .map_err(|e| e.into_oauth("Failed to get client"))
    }

    /// 替换客户端的全部可变元数据
    pub fn update_client(
        &self,
        client_id: &str,
        metadata: ClientMetadata,
    ) -> std::result::Result<OAuthClient, OAuthError> {
        let client = self
            .registry
            .update_client(client_id, metadata)
            .map_err(|e| e.into_oauth("Failed to update client"))?;

        self.audit.log(SecurityEvent::client_updated(client_id));
        Ok(client)
    }

    pub fn delete_client(&self, client_id: &str) -> std::result::Result<(), OAuthError> {
        self.registry
            .delete_client(client_id)
            .map_err(|e| e.into_oauth("Failed to delete client"))?;

        self.audit.log(SecurityEvent::client_deleted(client_id));
        Ok(())
    }

    // ========================================================================
    // 端点
    // ========================================================================

    /// 授权端点
    ///
    /// `subject` 为当前已登录的资源所有者。
    pub fn authorize(
        &self,
        request: AuthorizationRequest,
        subject: Option<&str>,
    ) -> std::result::Result<AuthorizationOutcome, AuthorizationError> {
        AuthorizationFlow {
            registry: &self.registry,
            issuer: &self.issuer,
            audit: self.audit.as_ref(),
            config: &self.config,
        }
        .handle(request, subject)
    }

    /// Token 端点
    pub fn token(&self, request: &TokenRequest) -> std::result::Result<TokenResponse, OAuthError> {
        GrantDispatcher {
            registry: &self.registry,
            issuer: &self.issuer,
            authenticator: self.authenticator.as_ref(),
            audit: self.audit.as_ref(),
            revocations: &self.revocations,
            codes: &self.codes,
            config: &self.config,
        }
        .dispatch(request)
    }

    /// 内省端点，总是返回响应
    pub fn introspect(&self, request: &IntrospectionRequest) -> IntrospectionResponse {
        Introspector {
            registry: &self.registry,
            issuer: &self.issuer,
            revocations: &self.revocations,
            audit: self.audit.as_ref(),
        }
        .introspect(request)
    }

    /// 撤销端点
    pub fn revoke(&self, request: &RevocationRequest) -> std::result::Result<(), OAuthError> {
        Revoker {
            registry: &self.registry,
            issuer: &self.issuer,
            revocations: &self.revocations,
            audit: self.audit.as_ref(),
            config: &self.config,
        }
        .revoke(request)
    }

    /// 公开的验证密钥
    pub fn jwks(&self) -> Jwks {
        self.issuer.keys().jwks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventType, InMemoryAuditLogger};
    use crate::error::OAuthErrorCode;
    use crate::oauth::client::{ClientType, GrantType};
    use std::sync::LazyLock;

    static KEYS: LazyLock<Arc<KeyMaterial>> =
        LazyLock::new(|| Arc::new(KeyMaterial::generate().unwrap()));

    fn server() -> (AuthorizationServer, InMemoryAuditLogger) {
        let audit = InMemoryAuditLogger::new();
        let server = AuthorizationServer::new(ServerConfig::default(), KEYS.clone())
            .unwrap()
            .with_audit_logger(Arc::new(audit.clone()));
        (server, audit)
    }

    fn machine_client() -> ClientMetadata {
        ClientMetadata::new()
            .client_name("Batch Job")
            .client_type(ClientType::Public)
            .grant_type(GrantType::ClientCredentials)
            .scope("read")
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServerConfig::default().with_issuer("");
        assert!(AuthorizationServer::new(config, KEYS.clone()).is_err());
    }

    #[test]
    fn test_client_lifecycle_is_audited() {
        let (server, audit) = server();

        let client_id = server.register_client(machine_client()).unwrap().client.client_id;
        server
            .update_client(&client_id, machine_client().client_name("Nightly Job"))
            .unwrap();
        assert_eq!(server.get_client(&client_id).unwrap().client_name, "Nightly Job");
        server.delete_client(&client_id).unwrap();

        let err = server.get_client(&client_id).unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);

        let types: Vec<EventType> = audit.get_events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::ClientRegistered,
                EventType::ClientUpdated,
                EventType::ClientDeleted
            ]
        );
    }

    #[test]
    fn test_invalid_metadata() {
        let (server, _) = server();
        let err = server
            .register_client(ClientMetadata::new().client_type(ClientType::Public))
            .unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidClientMetadata);
    }

    #[test]
    fn test_clones_share_state() {
        let (server, _) = server();
        let handle = server.clone();

        let client_id = handle.register_client(machine_client()).unwrap().client.client_id;
        assert!(server.get_client(&client_id).is_ok());
    }

    #[test]
    fn test_jwks_matches_signing_key() {
        let (server, _) = server();
        let jwks = server.jwks();

        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, KEYS.kid());
        assert_eq!(jwks.keys[0].alg, "RS256");
    }

    #[test]
    fn test_server_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthorizationServer>();
    }
}
