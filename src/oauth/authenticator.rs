//! 资源所有者认证
//!
//! 密码模式需要验证用户名和密码。真正的用户存储在库外部，
//! 通过 [`Authenticator`] trait 接入；[`InMemoryAuthenticator`] 用于测试和演示。

use std::collections::HashMap;
use std::sync::RwLock;

use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{Error, OAuthError, PasswordHashError, Result};
use crate::random::generate_random_bytes;

/// 资源所有者认证 trait
pub trait Authenticator: Send + Sync {
    /// 验证凭证，成功时返回用户的 subject 标识
    fn authenticate(&self, username: &str, password: &str) -> Result<String>;

    /// 检查该用户是否可以获得请求的 scope
    fn validate_scope(&self, subject: &str, scope: &str) -> Result<()>;
}

struct UserRecord {
    subject: String,
    /// PHC 格式的 Argon2id 哈希
    password_hash: String,
    scopes: Vec<String>,
}

/// 内存用户表
///
/// 密码以 Argon2id（PHC 字符串）保存。生产环境请接入专门的用户服务。
#[derive(Default)]
pub struct InMemoryAuthenticator {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加用户
    ///
    /// `scopes` 为该用户允许获得的权限范围。
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        subject: impl Into<String>,
        scopes: &[&str],
    ) -> Result<()> {
        let record = UserRecord {
            subject: subject.into(),
            password_hash: hash_password(password)?,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        };

        let mut users = self.users.write().map_err(|_| Error::lock_poisoned())?;
        users.insert(username.into(), record);
        Ok(())
    }

    /// 构建器风格的 [`add_user`](Self::add_user)
    pub fn with_user(
        self,
        username: impl Into<String>,
        password: &str,
        subject: impl Into<String>,
        scopes: &[&str],
    ) -> Result<Self> {
        self.add_user(username, password, subject, scopes)?;
        Ok(self)
    }
}

impl Authenticator for InMemoryAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> Result<String> {
        let users = self.users.read().map_err(|_| Error::lock_poisoned())?;

        // 未知用户和错误密码返回同样的错误
        let invalid = || Error::from(OAuthError::invalid_grant("Invalid resource owner credentials"));

        let user = users.get(username).ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        Ok(user.subject.clone())
    }

    fn validate_scope(&self, subject: &str, scope: &str) -> Result<()> {
        let users = self.users.read().map_err(|_| Error::lock_poisoned())?;
        let user = users
            .values()
            .find(|u| u.subject == subject)
            .ok_or_else(|| OAuthError::invalid_grant("Unknown resource owner"))?;

        match scope
            .split_whitespace()
            .find(|requested| !user.scopes.iter().any(|s| s == requested))
        {
            Some(disallowed) => Err(OAuthError::invalid_scope(format!(
                "Scope not allowed: {}",
                disallowed
            ))
            .into()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Argon2 密码哈希
// ============================================================================

fn hash_password(password: &str) -> Result<String> {
    let salt_bytes = generate_random_bytes(16)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
        PasswordHashError::HashFailed(format!("Failed to encode salt: {}", e))
    })?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordHashError::HashFailed(format!("Argon2 hash failed: {}", e)).into())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordHashError::InvalidFormat(format!("invalid Argon2 hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
