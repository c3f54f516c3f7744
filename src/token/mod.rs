//! Token 模块
//!
//! 签名密钥、claim 集合、JWT 编解码，以及基于它们的签发器。
//!
//! ## 子模块
//!
//! - **keys**: RSA 签名密钥与 JWKS 发布
//! - **claims**: 访问令牌、刷新令牌、授权码共用的 claim 集合
//! - **jwt**: RS256 签名与验证
//! - **issuer**: 面向授权流程的签发 / 验证入口
//! - **ledger**: 撤销列表与授权码兑换记录
//!
//! ## 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oauthrs::config::ServerConfig;
//! use oauthrs::token::{KeyMaterial, TokenIssuer};
//!
//! let keys = Arc::new(KeyMaterial::generate().unwrap());
//! let issuer = TokenIssuer::new(keys, &ServerConfig::default());
//!
//! let token = issuer
//!     .issue_access_token("client-1", "user-1", Some("read"), 3600)
//!     .unwrap();
//! let claims = issuer.verify(&token).unwrap();
//! assert_eq!(claims.sub, "user-1");
//! ```

pub mod claims;
pub mod issuer;
pub mod jwt;
pub mod keys;
pub mod ledger;

pub use claims::{SignedClaimSet, TokenKind};
pub use issuer::{CodeBinding, TokenIssuer};
pub use jwt::{JwtValidator, JwtValidatorConfig};
pub use keys::{Jwk, Jwks, KeyMaterial};
pub use ledger::{CodeLedger, RevocationList};
