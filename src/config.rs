//! 授权服务器配置
//!
//! 既可以通过 `with_*` 方法逐项构建，也可以从 JSON 加载
//! （缺省字段使用默认值）。
//!
//! ```rust
//! use oauthrs::config::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .with_issuer("https://auth.example.com")
//!     .with_access_token_ttl(900);
//! assert!(config.validate().is_ok());
//!
//! let loaded = ServerConfig::from_json(r#"{"issuer": "https://auth.example.com"}"#).unwrap();
//! assert_eq!(loaded.access_token_ttl, 3600);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// 默认签发者
pub const DEFAULT_ISSUER: &str = "https://auth.custos.example";

/// 访问令牌默认有效期：1 小时
pub const DEFAULT_ACCESS_TOKEN_TTL: i64 = 3600;

/// 刷新令牌默认有效期：7 天
pub const DEFAULT_REFRESH_TOKEN_TTL: i64 = 7 * 24 * 3600;

/// 授权码默认有效期：5 分钟
pub const DEFAULT_AUTHORIZATION_CODE_TTL: i64 = 300;

/// 各类有效期的上限：1 年
pub const MAX_TTL: i64 = 365 * 24 * 3600;

/// 时钟偏差上限：5 分钟
pub const MAX_LEEWAY: i64 = 300;

/// RSA 密钥最小位数
pub const MIN_KEY_BITS: usize = 2048;

/// 授权服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// token 的 `iss`
    pub issuer: String,

    /// 访问令牌有效期（秒）
    pub access_token_ttl: i64,

    /// 刷新令牌有效期（秒）
    pub refresh_token_ttl: i64,

    /// 授权码有效期（秒）
    pub authorization_code_ttl: i64,

    /// 校验 `exp` / `nbf` 时允许的时钟偏差（秒）
    pub leeway: i64,

    /// 签名密钥位数
    pub key_bits: usize,

    /// 刷新时作废旧的刷新令牌
    pub rotate_refresh_tokens: bool,

    /// 授权码只能兑换一次
    pub single_use_codes: bool,

    /// 公开客户端发起授权请求时必须携带 PKCE challenge
    pub require_pkce_for_public_clients: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            authorization_code_ttl: DEFAULT_AUTHORIZATION_CODE_TTL,
            leeway: 0,
            key_bits: MIN_KEY_BITS,
            rotate_refresh_tokens: true,
            single_use_codes: true,
            require_pkce_for_public_clients: false,
        }
    }
}

impl ServerConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 字符串加载
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_access_token_ttl(mut self, seconds: i64) -> Self {
        self.access_token_ttl = seconds;
        self
    }

    pub fn with_refresh_token_ttl(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl = seconds;
        self
    }

    pub fn with_authorization_code_ttl(mut self, seconds: i64) -> Self {
        self.authorization_code_ttl = seconds;
        self
    }

    pub fn with_leeway(mut self, seconds: i64) -> Self {
        self.leeway = seconds;
        self
    }

    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    pub fn with_refresh_rotation(mut self, enabled: bool) -> Self {
        self.rotate_refresh_tokens = enabled;
        self
    }

    pub fn with_single_use_codes(mut self, enabled: bool) -> Self {
        self.single_use_codes = enabled;
        self
    }

    pub fn with_pkce_required_for_public_clients(mut self, required: bool) -> Self {
        self.require_pkce_for_public_clients = required;
        self
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(Error::Config(ConfigError::MissingRequired(
                "issuer".to_string(),
            )));
        }

        for (key, value, max) in [
            ("access_token_ttl", self.access_token_ttl, MAX_TTL),
            ("refresh_token_ttl", self.refresh_token_ttl, MAX_TTL),
            ("authorization_code_ttl", self.authorization_code_ttl, MAX_TTL),
            ("leeway", self.leeway, MAX_LEEWAY),
        ] {
            if value < 0 {
                return Err(invalid(key, format!("must not be negative, got {}", value)));
            }
            if value > max {
                return Err(invalid(key, format!("must be at most {}, got {}", max, value)));
            }
        }

        if self.key_bits < MIN_KEY_BITS {
            return Err(invalid(
                "key_bits",
                format!("must be at least {}, got {}", MIN_KEY_BITS, self.key_bits),
            ));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: String) -> Error {
    Error::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    })
}
