//! 签名 claim 集合
//!
//! 访问令牌、刷新令牌、授权码共用同一个结构，以 `token_type` 区分。
//! claim 集合自包含，验证时不需要服务端记录。

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// token 种类标记
///
/// 序列化为 `token_type` claim 的值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// 访问令牌
    #[serde(rename = "Bearer")]
    Access,
    /// 刷新令牌
    #[serde(rename = "refresh_token")]
    Refresh,
    /// 授权码
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "Bearer",
            TokenKind::Refresh => "refresh_token",
            TokenKind::AuthorizationCode => "authorization_code",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 签名 claim 集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaimSet {
    /// 签发者
    pub iss: String,

    /// 主题（用户 ID；客户端凭证模式下为 client_id）
    pub sub: String,

    /// 接收者，等于 client_id
    pub aud: String,

    /// 签发时间（Unix 时间戳）
    pub iat: i64,

    /// 生效时间
    pub nbf: i64,

    /// 过期时间
    pub exp: i64,

    /// 唯一标识
    pub jti: String,

    /// 授权范围（空格分隔），可以为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    pub client_id: String,

    pub token_type: TokenKind,

    // 以下仅用于授权码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
}

impl SignedClaimSet {
    /// 授权范围列表
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// 距离过期的剩余秒数（已过期为 0）
    pub fn remaining_lifetime(&self) -> i64 {
        self.exp.saturating_sub(Utc::now().timestamp()).max(0)
    }

    /// 检查是否已过期
    ///
    /// `now >= exp + leeway` 即视为过期，因此有效期为 0 的 token 立即失效。
    pub fn is_expired_at(&self, now: i64, leeway: i64) -> bool {
        now >= self.exp.saturating_add(leeway)
    }

    /// 吊销表、授权码台账中保留该 `jti` 的截止时间
    pub fn retain_until(&self, leeway: i64) -> i64 {
        self.exp.saturating_add(leeway)
    }

    /// 检查是否尚未生效
    pub fn is_immature_at(&self, now: i64, leeway: i64) -> bool {
        self.nbf > now.saturating_add(leeway)
    }
}
