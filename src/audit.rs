//! 审计日志模块
//!
//! 授权服务器在关键节点产生 [`SecurityEvent`]，交给一个 [`AuditLogger`] 处理：
//!
//! - [`TracingAuditLogger`]: 转发到 `tracing`，由宿主进程的 subscriber 收集
//! - [`InMemoryAuditLogger`]: 保存在内存中，用于测试和开发
//! - [`NoOpAuditLogger`]: 丢弃所有事件（默认）
//!
//! ## 使用示例
//!
//! ```rust
//! use oauthrs::audit::{AuditLogger, EventType, InMemoryAuditLogger, SecurityEvent};
//!
//! let logger = InMemoryAuditLogger::new();
//! logger.log(SecurityEvent::client_registered("oa_123"));
//! logger.log(SecurityEvent::grant_rejected("oa_123", "password", "invalid_grant"));
//!
//! assert_eq!(logger.get_events_by_client("oa_123").len(), 2);
//! assert_eq!(logger.get_events_by_type(&EventType::GrantRejected).len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 严重/危险
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 安全事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 客户端注册
    ClientRegistered,
    /// 客户端更新
    ClientUpdated,
    /// 客户端删除
    ClientDeleted,
    /// 客户端认证失败
    ClientAuthenticationFailed,
    /// 授权码签发
    AuthorizationCodeIssued,
    /// 授权请求被拒绝
    AuthorizationDenied,
    /// Token 签发
    TokenIssued,
    /// 授权请求在 token 端点被拒绝
    GrantRejected,
    /// Token 撤销
    TokenRevoked,
    /// Token 内省失败
    IntrospectionFailed,
    /// 授权码重放
    AuthorizationCodeReplayed,
    /// 已作废的刷新令牌被再次使用
    RefreshTokenReuseDetected,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::ClientRegistered => "client_registered",
            EventType::ClientUpdated => "client_updated",
            EventType::ClientDeleted => "client_deleted",
            EventType::ClientAuthenticationFailed => "client_authentication_failed",
            EventType::AuthorizationCodeIssued => "authorization_code_issued",
            EventType::AuthorizationDenied => "authorization_denied",
            EventType::TokenIssued => "token_issued",
            EventType::GrantRejected => "grant_rejected",
            EventType::TokenRevoked => "token_revoked",
            EventType::IntrospectionFailed => "introspection_failed",
            EventType::AuthorizationCodeReplayed => "authorization_code_replayed",
            EventType::RefreshTokenReuseDetected => "refresh_token_reuse_detected",
        };
        f.write_str(name)
    }
}

/// 安全事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 相关的客户端
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// 相关的资源所有者
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 事件消息/描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            client_id: None,
            subject: None,
            message: None,
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    pub fn client_registered(client_id: impl Into<String>) -> Self {
        Self::new(EventType::ClientRegistered, EventSeverity::Info)
            .with_client_id(client_id)
            .with_message("OAuth client registered")
    }

    pub fn client_updated(client_id: impl Into<String>) -> Self {
        Self::new(EventType::ClientUpdated, EventSeverity::Info)
            .with_client_id(client_id)
            .with_message("OAuth client updated")
    }

    pub fn client_deleted(client_id: impl Into<String>) -> Self {
        Self::new(EventType::ClientDeleted, EventSeverity::Warning)
            .with_client_id(client_id)
            .with_message("OAuth client deleted")
    }

    pub fn client_authentication_failed(client_id: impl Into<String>) -> Self {
        Self::new(EventType::ClientAuthenticationFailed, EventSeverity::Warning)
            .with_client_id(client_id)
            .with_message("Client authentication failed")
    }

    pub fn authorization_code_issued(
        client_id: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(EventType::AuthorizationCodeIssued, EventSeverity::Info)
            .with_client_id(client_id)
            .with_subject(subject)
            .with_message("Authorization code issued")
    }

    pub fn authorization_denied(client_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(EventType::AuthorizationDenied, EventSeverity::Warning)
            .with_client_id(client_id)
            .with_detail("error", error)
            .with_message("Authorization request denied")
    }

    /// Token 签发；客户端凭证模式下没有 subject
    pub fn token_issued(
        client_id: impl Into<String>,
        grant_type: impl Into<String>,
        subject: Option<&str>,
    ) -> Self {
        let mut event = Self::new(EventType::TokenIssued, EventSeverity::Info)
            .with_client_id(client_id)
            .with_detail("grant_type", grant_type)
            .with_message("OAuth token issued");
        if let Some(subject) = subject {
            event = event.with_subject(subject);
        }
        event
    }

    pub fn grant_rejected(
        client_id: impl Into<String>,
        grant_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(EventType::GrantRejected, EventSeverity::Warning)
            .with_client_id(client_id)
            .with_detail("grant_type", grant_type)
            .with_detail("error", error)
            .with_message("Token request rejected")
    }

    pub fn token_revoked(client_id: impl Into<String>, jti: impl Into<String>) -> Self {
        Self::new(EventType::TokenRevoked, EventSeverity::Info)
            .with_client_id(client_id)
            .with_detail("jti", jti)
            .with_message("OAuth token revoked")
    }

    pub fn introspection_failed(client_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventType::IntrospectionFailed, EventSeverity::Warning)
            .with_client_id(client_id)
            .with_message(format!("Token introspection failed: {}", reason.into()))
    }

    pub fn authorization_code_replayed(
        client_id: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(EventType::AuthorizationCodeReplayed, EventSeverity::Critical)
            .with_client_id(client_id)
            .with_subject(subject)
            .with_message("Authorization code presented more than once")
    }

    pub fn refresh_token_reuse_detected(
        client_id: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(EventType::RefreshTokenReuseDetected, EventSeverity::Critical)
            .with_client_id(client_id)
            .with_subject(subject)
            .with_message("Refresh token reuse detected")
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 获取事件类型名称
    pub fn event_name(&self) -> String {
        self.event_type.to_string()
    }
}

/// 生成事件 ID
fn generate_event_id() -> String {
    use crate::random::generate_random_hex;
    format!(
        "evt_{}",
        generate_random_hex(16).unwrap_or_else(|_| "unknown".to_string())
    )
}

// ============================================================================
// AuditLogger Trait
// ============================================================================

/// 审计日志记录器 trait
pub trait AuditLogger: Send + Sync {
    /// 记录安全事件
    fn log(&self, event: SecurityEvent);
}

// ============================================================================
// TracingAuditLogger
// ============================================================================

/// 将事件转发到 `tracing`
///
/// 事件的 target 为 `oauthrs::audit`，便于单独过滤。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let client_id = event.client_id.as_deref().unwrap_or("-");
        let subject = event.subject.as_deref().unwrap_or("-");
        let message = event.message.as_deref().unwrap_or("");

        match event.severity {
            EventSeverity::Info => tracing::info!(
                target: "oauthrs::audit",
                event_id = %event.id,
                event = %event.event_type,
                client_id,
                subject,
                details = ?event.details,
                "{}", message
            ),
            EventSeverity::Warning => tracing::warn!(
                target: "oauthrs::audit",
                event_id = %event.id,
                event = %event.event_type,
                client_id,
                subject,
                details = ?event.details,
                "{}", message
            ),
            EventSeverity::Critical => tracing::error!(
                target: "oauthrs::audit",
                event_id = %event.id,
                event = %event.event_type,
                client_id,
                subject,
                details = ?event.details,
                "{}", message
            ),
        }
    }
}

// ============================================================================
// InMemoryAuditLogger
// ============================================================================

/// 内存审计日志记录器
///
/// 克隆后的实例共享同一份事件列表。
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLogger {
    events: Arc<RwLock<Vec<SecurityEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 最多保留 `max` 个事件，超出时丢弃最旧的
    pub fn with_max_events(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: Some(max),
        }
    }

    fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<SecurityEvent> {
        self.snapshot()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// 按客户端获取事件
    pub fn get_events_by_client(&self, client_id: &str) -> Vec<SecurityEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.client_id.as_deref() == Some(client_id))
            .collect()
    }

    /// 按事件类型获取事件
    pub fn get_events_by_type(&self, event_type: &EventType) -> Vec<SecurityEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| &e.event_type == event_type)
            .collect()
    }

    /// 按严重程度获取事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<SecurityEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let Ok(mut events) = self.events.write() else {
            return;
        };

        if let Some(max) = self.max_events {
            while events.len() >= max {
                events.remove(0);
            }
        }

        events.push(event);
    }
}

// ============================================================================
// NoOpAuditLogger
// ============================================================================

/// 空操作日志记录器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAuditLogger;

impl NoOpAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _event: SecurityEvent) {}
}
