//! 集成测试共用的夹具

#![allow(dead_code)]

use std::sync::{Arc, LazyLock};

use oauthrs::audit::InMemoryAuditLogger;
use oauthrs::oauth::{ClientMetadata, ClientType, GrantType, InMemoryAuthenticator};
use oauthrs::{AuthorizationServer, KeyMaterial, ServerConfig};

/// RSA 密钥生成较慢，所有测试共用一把
pub static KEYS: LazyLock<Arc<KeyMaterial>> =
    LazyLock::new(|| Arc::new(KeyMaterial::generate().expect("key generation should succeed")));

pub const REDIRECT_URI: &str = "https://app.example.com/callback";

/// 设置 `RUST_LOG` 时输出日志
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 带一个资源所有者 alice 的服务器
pub fn server_with(config: ServerConfig) -> (AuthorizationServer, InMemoryAuditLogger) {
    init_tracing();

    let authenticator = InMemoryAuthenticator::new()
        .with_user("alice", "correct horse", "user-alice", &["read", "write"])
        .expect("user setup should succeed");
    let audit = InMemoryAuditLogger::new();

    let server = AuthorizationServer::new(config, KEYS.clone())
        .expect("server setup should succeed")
        .with_authenticator(Arc::new(authenticator))
        .with_audit_logger(Arc::new(audit.clone()));

    (server, audit)
}

pub fn server() -> (AuthorizationServer, InMemoryAuditLogger) {
    server_with(ServerConfig::default())
}

/// 使用授权码、刷新令牌的公开 Web 客户端
pub fn web_client() -> ClientMetadata {
    ClientMetadata::new()
        .client_name("Web App")
        .client_type(ClientType::Public)
        .grant_type(GrantType::AuthorizationCode)
        .grant_type(GrantType::RefreshToken)
        .redirect_uri(REDIRECT_URI)
        .scope("read write")
}

/// 只使用客户端凭证的机密客户端
pub fn service_client() -> ClientMetadata {
    ClientMetadata::new()
        .client_name("Billing Service")
        .client_type(ClientType::Confidential)
        .grant_type(GrantType::ClientCredentials)
        .jwks_uri("https://billing.example.com/jwks.json")
        .scope("read write")
}
