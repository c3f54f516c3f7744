//! 签名密钥模块
//!
//! 进程启动时生成一把 RSA 密钥对，之后只读共享。所有 token 都用它做
//! RS256 签名，公钥以 JWK Set (RFC 7517) 形式发布给资源服务器。
//!
//! `kid` 取公钥的 RFC 7638 指纹，同一把密钥总是得到同一个 `kid`。
//!
//! ```rust,no_run
//! use oauthrs::token::KeyMaterial;
//!
//! let keys = KeyMaterial::generate().unwrap();
//! let jwks = keys.jwks();
//! assert_eq!(jwks.keys[0].kid, keys.kid());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::MIN_KEY_BITS;
use crate::error::{CryptoError, Error, Result};

/// JSON Web Key（仅 RSA 公钥）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

/// JSON Web Key Set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// 签名密钥
///
/// 构建一次后不可变，通过 `Arc` 在各组件之间共享，读取无需加锁。
#[derive(Clone)]
pub struct KeyMaterial {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    n: String,
    e: String,
}

impl KeyMaterial {
    /// 生成 2048 位 RSA 密钥
    pub fn generate() -> Result<Self> {
        Self::generate_with_bits(MIN_KEY_BITS)
    }

    /// 生成指定位数的 RSA 密钥
    pub fn generate_with_bits(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            return Err(Error::Crypto(CryptoError::InvalidKey(format!(
                "RSA key must be at least {} bits, got {}",
                MIN_KEY_BITS, bits
            ))));
        }

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| Error::Crypto(CryptoError::KeyGeneration(e.to_string())))?;

        let keys = Self::from_private_key(&private_key)?;
        tracing::info!(kid = %keys.kid, bits, "generated signing key");
        Ok(keys)
    }

    /// 从 PKCS#8 PEM 格式的私钥加载
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;

        if private_key.size() * 8 < MIN_KEY_BITS {
            return Err(Error::Crypto(CryptoError::InvalidKey(format!(
                "RSA key must be at least {} bits",
                MIN_KEY_BITS
            ))));
        }

        Self::from_private_key(&private_key)
    }

    fn from_private_key(private_key: &RsaPrivateKey) -> Result<Self> {
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;

        let n = URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|err| Error::Crypto(CryptoError::InvalidKey(err.to_string())))?;

        let kid = thumbprint(&n, &e);

        Ok(Self {
            kid,
            encoding_key,
            decoding_key,
            n,
            e,
        })
    }

    /// 密钥 ID
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// 公钥的 JWK 表示
    pub fn jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.kid.clone(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            n: self.n.clone(),
            e: self.e.clone(),
        }
    }

    /// 公钥集合
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.jwk()],
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// RFC 7638 JWK 指纹
fn thumbprint(n: &str, e: &str) -> String {
    // 成员按字典序排列，无空白
    let canonical = format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, e, n);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}
