//! OAuth 客户端注册与验证
//!
//! [`ClientRegistry`] 是进程内唯一可变的共享状态之一，按 `client_id`
//! 保存已注册的客户端。注册请求遵循 RFC 7591 的元数据命名。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::audit::{AuditLogger, SecurityEvent};
use crate::error::{Error, OAuthError, OAuthErrorCode, Result};
use crate::random::{
    constant_time_compare_str, generate_random_alphanumeric, generate_random_base64_url,
};

/// OAuth 客户端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// 机密客户端（可以安全存储密钥的服务端应用）
    Confidential,
    /// 公开客户端（SPA、移动 App 等无法安全存储密钥的应用）
    Public,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Confidential => "confidential",
            ClientType::Public => "public",
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "confidential" => Ok(ClientType::Confidential),
            "public" => Ok(ClientType::Public),
            _ => Err(OAuthError::invalid_client_metadata(
                "client_type must be either 'public' or 'confidential'",
            )
            .into()),
        }
    }
}

/// OAuth 授权类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// 授权码模式
    AuthorizationCode,
    /// 隐式授权（仅可注册，token 端点不支持）
    Implicit,
    /// 资源所有者密码凭证
    Password,
    /// 客户端凭证模式
    ClientCredentials,
    /// 刷新令牌
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Implicit => "implicit",
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }

    /// 该授权类型是否需要重定向 URI
    pub fn requires_redirect(&self) -> bool {
        matches!(self, GrantType::AuthorizationCode | GrantType::Implicit)
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GrantType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "implicit" => Ok(GrantType::Implicit),
            "password" => Ok(GrantType::Password),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "refresh_token" => Ok(GrantType::RefreshToken),
            _ => Err(OAuthError::unsupported_grant_type(s).into()),
        }
    }
}

/// OAuth 响应类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }
}

impl std::str::FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            _ => Err(
                OAuthError::invalid_client_metadata(format!("Unsupported response_type: {}", s))
                    .into(),
            ),
        }
    }
}

// ============================================================================
// 客户端
// ============================================================================

/// 已注册的 OAuth 客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// 客户端 ID
    pub client_id: String,

    /// 客户端密钥的 SHA-256 摘要（仅机密客户端）
    #[serde(skip_serializing, default)]
    pub client_secret_hash: Option<String>,

    pub client_name: String,

    pub client_type: ClientType,

    /// 已注册的重定向 URI，按字节精确匹配
    pub redirect_uris: Vec<String>,

    pub grant_types: Vec<GrantType>,

    pub response_types: Vec<ResponseType>,

    /// 允许的权限范围
    pub scopes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_statement: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    /// 验证客户端密钥
    pub fn verify_secret(&self, secret: &str) -> bool {
        match &self.client_secret_hash {
            Some(hash) => verify_client_secret(secret, hash),
            None => false,
        }
    }

    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }

    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    pub fn allows_response_type(&self, response_type: ResponseType) -> bool {
        self.response_types.contains(&response_type)
    }

    /// 精确匹配，不做任何规范化
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    pub fn allows_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// 返回第一个未注册的 scope
    pub fn first_disallowed_scope<'a>(&self, scope: &'a str) -> Option<&'a str> {
        scope.split_whitespace().find(|s| !self.allows_scope(s))
    }
}

// ============================================================================
// 注册请求与响应
// ============================================================================

/// 客户端注册元数据
///
/// 字段保持原始字符串形式，由 [`ClientRegistry::register`] 统一校验。
///
/// ```rust
/// use oauthrs::oauth::{ClientMetadata, ClientType, GrantType};
///
/// let metadata = ClientMetadata::new()
///     .client_name("Web App")
///     .client_type(ClientType::Confidential)
///     .grant_type(GrantType::AuthorizationCode)
///     .redirect_uri("https://app.example.com/callback")
///     .scope("read write")
///     .jwks_uri("https://app.example.com/jwks.json");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientMetadata {
    pub client_name: Option<String>,
    pub client_type: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    /// 空格分隔
    pub scope: Option<String>,
    pub jwks_uri: Option<String>,
    pub jwks: Option<serde_json::Value>,
    pub software_id: Option<String>,
    pub software_version: Option<String>,
    pub software_statement: Option<String>,
}

impl ClientMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn client_type(mut self, client_type: impl std::fmt::Display) -> Self {
        self.client_type = Some(client_type.to_string());
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    pub fn grant_type(mut self, grant_type: impl std::fmt::Display) -> Self {
        self.grant_types.push(grant_type.to_string());
        self
    }

    pub fn response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_types.push(response_type.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    pub fn jwks(mut self, jwks: serde_json::Value) -> Self {
        self.jwks = Some(jwks);
        self
    }

    pub fn software(
        mut self,
        software_id: impl Into<String>,
        software_version: impl Into<String>,
    ) -> Self {
        self.software_id = Some(software_id.into());
        self.software_version = Some(software_version.into());
        self
    }

    pub fn software_statement(mut self, statement: impl Into<String>) -> Self {
        self.software_statement = Some(statement.into());
        self
    }
}

/// 注册结果
///
/// 明文密钥只在这里出现一次，之后只保存摘要。
#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistration {
    #[serde(flatten)]
    pub client: OAuthClient,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// 客户端 ID 签发时间（Unix 时间戳）
    pub client_id_issued_at: i64,

    /// 0 表示密钥不过期
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
}

/// 校验通过的元数据
struct ValidatedMetadata {
    client_name: String,
    client_type: ClientType,
    redirect_uris: Vec<String>,
    grant_types: Vec<GrantType>,
    response_types: Vec<ResponseType>,
    scopes: Vec<String>,
    jwks_uri: Option<String>,
    jwks: Option<serde_json::Value>,
    software_id: Option<String>,
    software_version: Option<String>,
    software_statement: Option<String>,
}

impl ValidatedMetadata {
    fn parse(metadata: ClientMetadata) -> Result<Self> {
        let client_name = metadata
            .client_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_client_metadata("client_name is required"))?;

        let client_type: ClientType = metadata
            .client_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_client_metadata("client_type is required"))?
            .parse()?;

        if metadata.grant_types.is_empty() {
            return Err(OAuthError::invalid_client_metadata("grant_types is required").into());
        }
        let mut grant_types = Vec::with_capacity(metadata.grant_types.len());
        for raw in &metadata.grant_types {
            let grant_type: GrantType = raw.parse().map_err(|_| {
                OAuthError::invalid_client_metadata(format!("Unsupported grant_type: {}", raw))
            })?;
            if !grant_types.contains(&grant_type) {
                grant_types.push(grant_type);
            }
        }

        if grant_types.iter().any(GrantType::requires_redirect)
            && metadata.redirect_uris.is_empty()
        {
            return Err(OAuthError::invalid_client_metadata(
                "redirect_uris is required for authorization_code and implicit grant types",
            )
            .into());
        }
        for uri in &metadata.redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let mut response_types = Vec::with_capacity(metadata.response_types.len());
        for raw in &metadata.response_types {
            let response_type: ResponseType = raw.parse()?;
            if !response_types.contains(&response_type) {
                response_types.push(response_type);
            }
        }
        if response_types.is_empty() && grant_types.contains(&GrantType::AuthorizationCode) {
            response_types.push(ResponseType::Code);
        }

        if client_type == ClientType::Confidential
            && metadata.jwks_uri.is_none()
            && metadata.jwks.is_none()
        {
            return Err(OAuthError::invalid_client_metadata(
                "Either jwks_uri or jwks is required for confidential clients",
            )
            .into());
        }

        let mut scopes: Vec<String> = Vec::new();
        for scope in metadata.scope.as_deref().unwrap_or("").split_whitespace() {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }

        Ok(Self {
            client_name,
            client_type,
            redirect_uris: metadata.redirect_uris,
            grant_types,
            response_types,
            scopes,
            jwks_uri: metadata.jwks_uri,
            jwks: metadata.jwks,
            software_id: metadata.software_id,
            software_version: metadata.software_version,
            software_statement: metadata.software_statement,
        })
    }

    fn apply_to(self, client: &mut OAuthClient) {
        client.client_name = self.client_name;
        client.redirect_uris = self.redirect_uris;
        client.grant_types = self.grant_types;
        client.response_types = self.response_types;
        client.scopes = self.scopes;
        client.jwks_uri = self.jwks_uri;
        client.jwks = self.jwks;
        client.software_id = self.software_id;
        client.software_version = self.software_version;
        client.software_statement = self.software_statement;
        client.updated_at = Utc::now();
    }
}

// ============================================================================
// 客户端注册表
// ============================================================================

/// 内存客户端注册表
///
/// 所有读写都在同一把 `RwLock` 下完成，`validate_*` 不会看到写了一半的记录。
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, OAuthClient>>,
}

impl ClientRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新客户端
    pub fn register(&self, metadata: ClientMetadata) -> Result<ClientRegistration> {
        let validated = ValidatedMetadata::parse(metadata).inspect_err(|e| {
            warn!(error = %e, "client registration rejected");
        })?;
        let client_type = validated.client_type;

        let (client_secret_hash, client_secret) = if client_type == ClientType::Confidential {
            let secret = generate_client_secret()?;
            (Some(hash_client_secret(&secret)), Some(secret))
        } else {
            (None, None)
        };

        let now = Utc::now();
        let mut client = OAuthClient {
            client_id: String::new(),
            client_secret_hash,
            client_name: String::new(),
            client_type,
            redirect_uris: Vec::new(),
            grant_types: Vec::new(),
            response_types: Vec::new(),
            scopes: Vec::new(),
            jwks_uri: None,
            jwks: None,
            software_id: None,
            software_version: None,
            software_statement: None,
            created_at: now,
            updated_at: now,
        };
        validated.apply_to(&mut client);
        client.updated_at = now;

        {
            let mut clients = self.clients.write().map_err(|_| Error::lock_poisoned())?;
            loop {
                let client_id = generate_client_id()?;
                if let Entry::Vacant(slot) = clients.entry(client_id.clone()) {
                    client.client_id = client_id;
                    slot.insert(client.clone());
                    break;
                }
            }
        }

        info!(
            client_id = %client.client_id,
            client_type = %client.client_type,
            grant_types = ?client.grant_types,
            "registered OAuth client"
        );

        Ok(ClientRegistration {
            client_id_issued_at: now.timestamp(),
            client_secret_expires_at: client_secret.as_ref().map(|_| 0),
            client,
            client_secret,
        })
    }

    /// 校验客户端存在，并在给出 `redirect_uri` 时校验其已注册
    pub fn validate_client(&self, client_id: &str, redirect_uri: Option<&str>) -> Result<OAuthClient> {
        let client = self.get_client(client_id)?;

        match redirect_uri {
            Some(uri) if !client.allows_redirect_uri(uri) => {
                warn!(client_id, redirect_uri = uri, "unregistered redirect URI");
                Err(OAuthError::invalid_redirect_uri("Redirect URI not registered").into())
            }
            _ => Ok(client),
        }
    }

    /// 认证客户端
    ///
    /// 机密客户端必须提供正确的密钥；公开客户端不得提供密钥。
    pub fn authenticate_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<OAuthClient> {
        let client_id = client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_request("client_id is required"))?;

        let client = self.get_client(client_id)?;

        let authenticated = match (client.client_type, client_secret) {
            (ClientType::Confidential, Some(secret)) => client.verify_secret(secret),
            (ClientType::Confidential, None) => false,
            (ClientType::Public, None) => true,
            (ClientType::Public, Some(_)) => false,
        };

        if !authenticated {
            warn!(client_id, "client authentication failed");
            return Err(OAuthError::invalid_client("Client authentication failed").into());
        }

        debug!(client_id, "client authenticated");
        Ok(client)
    }

    /// 同 [`authenticate_client`](Self::authenticate_client)，`invalid_client` 时记录审计事件
    ///
    /// `endpoint` 记在事件的 details 中。
    pub fn authenticate_client_audited(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        endpoint: &str,
        audit: &dyn AuditLogger,
    ) -> Result<OAuthClient> {
        self.authenticate_client(client_id, client_secret)
            .inspect_err(|e| {
                if e.as_oauth().is_some_and(|o| o.error == OAuthErrorCode::InvalidClient) {
                    audit.log(
                        SecurityEvent::client_authentication_failed(client_id.unwrap_or(""))
                            .with_detail("endpoint", endpoint),
                    );
                }
            })
    }

    /// 校验请求的 scope 都已为该客户端注册
    pub fn validate_scope(&self, client_id: &str, scope: &str) -> Result<()> {
        let client = self.get_client(client_id)?;

        if let Some(disallowed) = client.first_disallowed_scope(scope) {
            warn!(client_id, scope = disallowed, "scope not allowed");
            return Err(
                OAuthError::invalid_scope(format!("Scope not allowed: {}", disallowed)).into(),
            );
        }

        Ok(())
    }

    /// 查询客户端
    pub fn get_client(&self, client_id: &str) -> Result<OAuthClient> {
        let clients = self.clients.read().map_err(|_| Error::lock_poisoned())?;
        clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| OAuthError::invalid_client("Client not found").into())
    }

    /// 更新客户端元数据
    ///
    /// 替换所有可变字段，保留 `client_id`、密钥和客户端类型。
    pub fn update_client(&self, client_id: &str, metadata: ClientMetadata) -> Result<OAuthClient> {
        let validated = ValidatedMetadata::parse(metadata)?;

        let mut clients = self.clients.write().map_err(|_| Error::lock_poisoned())?;
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| OAuthError::invalid_client("Client not found"))?;

        if validated.client_type != client.client_type {
            return Err(OAuthError::invalid_client_metadata("client_type cannot be changed").into());
        }

        validated.apply_to(client);
        info!(client_id, "updated OAuth client");
        Ok(client.clone())
    }

    /// 删除客户端
    pub fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut clients = self.clients.write().map_err(|_| Error::lock_poisoned())?;
        clients
            .remove(client_id)
            .ok_or_else(|| OAuthError::invalid_client("Client not found"))?;

        info!(client_id, "deleted OAuth client");
        Ok(())
    }

    /// 列出所有客户端
    pub fn list_clients(&self) -> Result<Vec<OAuthClient>> {
        let clients = self.clients.read().map_err(|_| Error::lock_poisoned())?;
        Ok(clients.values().cloned().collect())
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 生成客户端 ID
fn generate_client_id() -> Result<String> {
    // 格式: oa_<随机字符串>
    let random = generate_random_alphanumeric(24)?;
    Ok(format!("oa_{}", random))
}

/// 生成客户端密钥（32 字节，base64url 编码）
fn generate_client_secret() -> Result<String> {
    generate_random_base64_url(32)
}

/// 哈希客户端密钥（SHA-256，十六进制）
fn hash_client_secret(secret: &str) -> String {
    use sha2::{Digest, Sha256};

    Sha256::digest(secret.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn verify_client_secret(secret: &str, hash: &str) -> bool {
    constant_time_compare_str(&hash_client_secret(secret), hash)
}

/// 重定向 URI 必须是不带 fragment 的绝对 URI
fn validate_redirect_uri(uri: &str) -> Result<()> {
    let parsed = Url::parse(uri).map_err(|_| {
        OAuthError::invalid_redirect_uri(format!("Invalid redirect_uri: {}", uri))
    })?;

    if parsed.fragment().is_some() {
        return Err(OAuthError::invalid_redirect_uri(format!(
            "redirect_uri must not contain a fragment: {}",
            uri
        ))
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuthErrorCode;
    use std::sync::Arc;
    use std::thread;

    fn oauth_error(err: Error) -> OAuthError {
        err.as_oauth().cloned().expect("expected an OAuth error")
    }

    fn web_app() -> ClientMetadata {
        ClientMetadata::new()
            .client_name("Web App")
            .client_type(ClientType::Confidential)
            .grant_type(GrantType::AuthorizationCode)
            .grant_type(GrantType::RefreshToken)
            .redirect_uri("https://app.example.com/callback")
            .scope("read write")
            .jwks_uri("https://app.example.com/jwks.json")
    }

    fn spa() -> ClientMetadata {
        ClientMetadata::new()
            .client_name("SPA")
            .client_type(ClientType::Public)
            .grant_type(GrantType::AuthorizationCode)
            .redirect_uri("http://localhost:3000/cb")
            .scope("read")
    }

    fn rejected(metadata: ClientMetadata) -> OAuthError {
        oauth_error(ClientRegistry::new().register(metadata).unwrap_err())
    }

    #[test]
    fn test_register_confidential_client() {
        let registry = ClientRegistry::new();
        let registration = registry.register(web_app()).unwrap();

        let client = &registration.client;
        assert!(client.client_id.starts_with("oa_"));
        assert_eq!(client.client_type, ClientType::Confidential);
        assert_eq!(client.response_types, vec![ResponseType::Code]);
        assert_eq!(client.scopes, vec!["read", "write"]);

        let secret = registration.client_secret.as_deref().unwrap();
        assert!(client.verify_secret(secret));
        assert!(!client.verify_secret("wrong_secret"));
        assert_ne!(client.client_secret_hash.as_deref(), Some(secret));
    }

    #[test]
    fn test_register_public_client_has_no_secret() {
        let registration = ClientRegistry::new().register(spa()).unwrap();

        assert!(registration.client_secret.is_none());
        assert!(registration.client.client_secret_hash.is_none());
    }

    #[test]
    fn test_registration_json_hides_secret_hash() {
        let registration = ClientRegistry::new().register(web_app()).unwrap();
        let json = serde_json::to_value(&registration).unwrap();

        assert!(json.get("client_secret_hash").is_none());
        assert!(json["client_secret"].is_string());
        assert_eq!(json["client_type"], "confidential");
        assert_eq!(json["grant_types"][0], "authorization_code");
        assert_eq!(json["client_secret_expires_at"], 0);
    }

    #[test]
    fn test_metadata_from_json() {
        let metadata: ClientMetadata = serde_json::from_str(
            r#"{
                "client_name": "CLI",
                "client_type": "public",
                "grant_types": ["password", "refresh_token"],
                "scope": "read"
            }"#,
        )
        .unwrap();

        let registration = ClientRegistry::new().register(metadata).unwrap();
        assert!(registration.client.redirect_uris.is_empty());
        assert!(registration.client.response_types.is_empty());
    }

    #[test]
    fn test_registration_validation_messages() {
        let cases = [
            (web_app().client_name(""), "client_name is required"),
            (
                ClientMetadata {
                    client_type: None,
                    ..web_app()
                },
                "client_type is required",
            ),
            (
                web_app().client_type("trusted"),
                "client_type must be either 'public' or 'confidential'",
            ),
            (
                ClientMetadata {
                    grant_types: vec![],
                    ..web_app()
                },
                "grant_types is required",
            ),
            (
                ClientMetadata {
                    redirect_uris: vec![],
                    ..web_app()
                },
                "redirect_uris is required for authorization_code and implicit grant types",
            ),
            (
                web_app().response_type("id_token"),
                "Unsupported response_type: id_token",
            ),
            (
                ClientMetadata {
                    jwks_uri: None,
                    ..web_app()
                },
                "Either jwks_uri or jwks is required for confidential clients",
            ),
            (web_app().grant_type("magic"), "Unsupported grant_type: magic"),
        ];

        for (metadata, expected) in cases {
            let err = rejected(metadata);
            assert_eq!(err.error, OAuthErrorCode::InvalidClientMetadata);
            assert_eq!(err.error_description, expected);
        }
    }

    #[test]
    fn test_inline_jwks_satisfies_confidential_requirement() {
        let metadata = ClientMetadata {
            jwks_uri: None,
            ..web_app()
        }
        .jwks(serde_json::json!({"keys": []}));

        assert!(ClientRegistry::new().register(metadata).is_ok());
    }

    #[test]
    fn test_relative_redirect_uri_rejected() {
        let err = rejected(spa().redirect_uri("/callback"));
        assert_eq!(err.error, OAuthErrorCode::InvalidRedirectUri);

        let err = rejected(spa().redirect_uri("https://app.example.com/cb#frag"));
        assert_eq!(err.error, OAuthErrorCode::InvalidRedirectUri);
    }

    #[test]
    fn test_validate_client_redirect_exact_match() {
        let registry = ClientRegistry::new();
        let id = registry.register(web_app()).unwrap().client.client_id;

        assert!(registry.validate_client(&id, None).is_ok());
        assert!(
            registry
                .validate_client(&id, Some("https://app.example.com/callback"))
                .is_ok()
        );

        for uri in [
            "https://app.example.com/callback/",
            "https://APP.example.com/callback",
            "https://app.example.com/callback?x=1",
        ] {
            let err = oauth_error(registry.validate_client(&id, Some(uri)).unwrap_err());
            assert_eq!(err.error, OAuthErrorCode::InvalidRedirectUri);
            assert_eq!(err.error_description, "Redirect URI not registered");
        }

        let err = oauth_error(registry.validate_client("oa_missing", None).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);
        assert_eq!(err.error_description, "Client not found");
    }

    #[test]
    fn test_authenticate_client() {
        let registry = ClientRegistry::new();
        let confidential = registry.register(web_app()).unwrap();
        let public = registry.register(spa()).unwrap();
        let id = confidential.client.client_id.as_str();
        let secret = confidential.client_secret.as_deref();

        assert!(registry.authenticate_client(Some(id), secret).is_ok());
        assert!(registry.authenticate_client(Some(id), Some("nope")).is_err());
        assert!(registry.authenticate_client(Some(id), None).is_err());

        let public_id = public.client.client_id.as_str();
        assert!(registry.authenticate_client(Some(public_id), None).is_ok());
        let err = oauth_error(
            registry
                .authenticate_client(Some(public_id), Some("guess"))
                .unwrap_err(),
        );
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);

        let err = oauth_error(registry.authenticate_client(None, None).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidRequest);
    }

    #[test]
    fn test_validate_scope_names_offender() {
        let registry = ClientRegistry::new();
        let id = registry.register(web_app()).unwrap().client.client_id;

        assert!(registry.validate_scope(&id, "read").is_ok());
        assert!(registry.validate_scope(&id, "read write").is_ok());
        assert!(registry.validate_scope(&id, "").is_ok());

        let err = oauth_error(registry.validate_scope(&id, "read delete").unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidScope);
        assert_eq!(err.error_description, "Scope not allowed: delete");
    }

    #[test]
    fn test_update_preserves_identity_and_secret() {
        let registry = ClientRegistry::new();
        let registration = registry.register(web_app()).unwrap();
        let id = registration.client.client_id.clone();
        let secret = registration.client_secret.unwrap();

        let updated = registry
            .update_client(
                &id,
                web_app()
                    .client_name("Renamed")
                    .redirect_uri("https://app.example.com/other")
                    .scope("read"),
            )
            .unwrap();

        assert_eq!(updated.client_id, id);
        assert_eq!(updated.client_name, "Renamed");
        assert_eq!(updated.scopes, vec!["read"]);
        assert_eq!(updated.redirect_uris.len(), 2);
        assert!(updated.verify_secret(&secret));
        assert_eq!(updated.created_at, registration.client.created_at);

        let err = oauth_error(
            registry
                .update_client(&id, spa().client_type(ClientType::Public))
                .unwrap_err(),
        );
        assert_eq!(err.error, OAuthErrorCode::InvalidClientMetadata);
    }

    #[test]
    fn test_delete_client() {
        let registry = ClientRegistry::new();
        let id = registry.register(spa()).unwrap().client.client_id;

        assert_eq!(registry.list_clients().unwrap().len(), 1);
        registry.delete_client(&id).unwrap();
        assert!(registry.list_clients().unwrap().is_empty());

        let err = oauth_error(registry.delete_client(&id).unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);
        assert!(registry.get_client(&id).is_err());
        assert!(registry.update_client(&id, spa()).is_err());
    }

    #[test]
    fn test_concurrent_registrations_do_not_collide() {
        let registry = Arc::new(ClientRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|_| registry.register(spa()).unwrap().client.client_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: std::collections::HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 200);
        assert_eq!(registry.list_clients().unwrap().len(), 200);
    }

    #[test]
    fn test_grant_type_parsing() {
        assert_eq!(
            "authorization_code".parse::<GrantType>().unwrap(),
            GrantType::AuthorizationCode
        );
        assert_eq!(GrantType::ClientCredentials.to_string(), "client_credentials");

        let err = oauth_error("magic".parse::<GrantType>().unwrap_err());
        assert_eq!(err.error, OAuthErrorCode::UnsupportedGrantType);
    }
}
