//! Token 端点的请求与响应结构

use serde::{Deserialize, Serialize};

use super::client::GrantType;

/// OAuth Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TokenType {
    /// Bearer Token
    #[default]
    Bearer,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Bearer => write!(f, "Bearer"),
        }
    }
}

/// Token 请求
///
/// 传输层解析出的原始参数，所有字段都可能缺失，由授权分发器校验。
///
/// ```rust
/// use oauthrs::oauth::TokenRequest;
///
/// let request = TokenRequest::authorization_code("the-code")
///     .with_client("oa_client", Some("secret"))
///     .with_redirect_uri("https://app.example.com/cb")
///     .with_code_verifier("verifier");
/// assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenRequest {
    /// 指定 grant_type 的空请求
    pub fn new(grant_type: impl Into<String>) -> Self {
        Self {
            grant_type: Some(grant_type.into()),
            ..Default::default()
        }
    }

    pub fn authorization_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(GrantType::AuthorizationCode.as_str())
        }
    }

    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::new(GrantType::Password.as_str())
        }
    }

    pub fn client_credentials() -> Self {
        Self::new(GrantType::ClientCredentials.as_str())
    }

    pub fn refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            ..Self::new(GrantType::RefreshToken.as_str())
        }
    }

    /// 设置客户端凭证
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<&str>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret.map(str::to_string);
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_code_verifier(mut self, code_verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(code_verifier.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// OAuth 2.0 Token 响应
///
/// 符合 RFC 6749 Section 5.1 的 token 响应结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// 访问令牌
    pub access_token: String,

    /// 固定为 "Bearer"
    pub token_type: TokenType,

    /// 过期时间（秒）
    pub expires_in: u64,

    /// 刷新令牌（客户端凭证模式下没有）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// 授权范围（空格分隔）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// 创建新的 Token 响应
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: TokenType::Bearer,
            expires_in,
            refresh_token: None,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// 设置授权范围，空字符串视为没有
    pub fn with_scope(mut self, scope: Option<&str>) -> Self {
        self.scope = scope.filter(|s| !s.trim().is_empty()).map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_builder() {
        let response = TokenResponse::new("access_token_123", 3600)
            .with_refresh_token("refresh_token_456")
            .with_scope(Some("read write"));

        assert_eq!(response.access_token, "access_token_123");
        assert_eq!(response.token_type, TokenType::Bearer);
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.refresh_token.as_deref(), Some("refresh_token_456"));
        assert_eq!(response.scope.as_deref(), Some("read write"));
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new("test_token", 3600).with_scope(Some(""));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("scope").is_none());
    }

    #[test]
    fn test_token_request_from_form_fields() {
        let request: TokenRequest = serde_json::from_str(
            r#"{"grant_type": "refresh_token", "refresh_token": "rt", "client_id": "oa_1"}"#,
        )
        .unwrap();

        assert_eq!(request, TokenRequest::refresh_token("rt").with_client("oa_1", None));
    }
}
