//! 按 `jti` 记录的服务端状态
//!
//! token 本身是无状态的，撤销和授权码单次使用需要额外的记录：
//!
//! - [`RevocationList`]: 已撤销的 token
//! - [`CodeLedger`]: 已兑换的授权码
//!
//! 条目只需保留到 token 自身的 `exp`，之后 token 无论如何都无法通过验证，
//! 每次写入时顺带清理过期条目。

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::{Error, Result};

/// 带过期时间的 `jti` 集合
#[derive(Debug, Default)]
struct ExpiringSet {
    entries: RwLock<HashMap<String, i64>>,
}

impl ExpiringSet {
    /// 插入条目，已存在时返回 `false`
    ///
    /// 检查与写入在同一把写锁内完成。
    fn insert(&self, jti: &str, exp: i64) -> Result<bool> {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().map_err(|_| Error::lock_poisoned())?;

        entries.retain(|_, entry_exp| *entry_exp > now);

        if entries.contains_key(jti) {
            return Ok(false);
        }
        entries.insert(jti.to_string(), exp);
        Ok(true)
    }

    fn contains(&self, jti: &str) -> Result<bool> {
        let entries = self.entries.read().map_err(|_| Error::lock_poisoned())?;
        Ok(entries.contains_key(jti))
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// 撤销列表
#[derive(Debug, Default)]
pub struct RevocationList {
    inner: ExpiringSet,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 撤销 token，返回是否为首次撤销
    pub fn revoke(&self, jti: &str, exp: i64) -> Result<bool> {
        self.inner.insert(jti, exp)
    }

    pub fn is_revoked(&self, jti: &str) -> Result<bool> {
        self.inner.contains(jti)
    }

    /// 当前记录数
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 授权码兑换记录
#[derive(Debug, Default)]
pub struct CodeLedger {
    inner: ExpiringSet,
}

impl CodeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记授权码已兑换
    ///
    /// 首次兑换返回 `true`；重放返回 `false`。
    pub fn consume(&self, jti: &str, exp: i64) -> Result<bool> {
        self.inner.insert(jti, exp)
    }

    pub fn is_consumed(&self, jti: &str) -> Result<bool> {
        self.inner.contains(jti)
    }
}
