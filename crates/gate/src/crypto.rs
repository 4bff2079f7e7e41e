//! 签名计算与校验
//!
//! HMAC-SHA256 作用于收到的原始字节，而不是解析后重新序列化的字段；
//! 任何重新编码都会改变被签名的内容。

use crate::error::{GateError, GateResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// 共享密钥来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// 直接从配置文件读取
    Direct(String),
    /// 从环境变量读取
    Environment(String),
    /// 从文件路径读取
    File(String),
}

/// 共享密钥
///
/// `Debug` 输出不包含密钥内容，drop 时清零
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Secret(Vec<u8>);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.0.len())
            .finish()
    }
}

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// 从密钥来源加载
    ///
    /// 文件内容和环境变量值会去掉首尾空白；空密钥视为配置错误
    pub fn from_source(source: &SecretSource) -> GateResult<Self> {
        let mut raw = match source {
            SecretSource::Direct(secret) => {
                debug!("Loading shared secret from direct configuration");
                secret.clone()
            }
            SecretSource::Environment(env_var) => {
                debug!("Loading shared secret from environment variable: {}", env_var);
                std::env::var(env_var).map_err(|e| {
                    GateError::Secret(format!(
                        "Failed to read secret from environment variable {env_var}: {e}"
                    ))
                })?
            }
            SecretSource::File(path) => {
                debug!("Loading shared secret from file: {}", path);
                std::fs::read_to_string(path).map_err(|e| {
                    GateError::Secret(format!("Failed to read secret from file {path}: {e}"))
                })?
            }
        };

        let secret = Self(raw.trim().as_bytes().to_vec());
        raw.zeroize();

        if secret.is_empty() {
            return Err(GateError::Secret("Shared secret is empty".to_string()));
        }

        Ok(secret)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 计算 `payload` 的 HMAC-SHA256，返回小写十六进制字符串
pub fn compute_mac(secret: &[u8], payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// 常量时间比较两个十六进制编码的 MAC
///
/// 两边先解码为字节。长度不同直接返回 false（长度本身可以泄露，内容不可以）；
/// 长度相同则逐字节比较，不会在第一个差异处提前返回。非法十六进制视为不相等。
pub fn constant_time_equals(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (hex::decode(a), hex::decode(b)) else {
        return false;
    };

    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(&b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_mac_known_vector() {
        // RFC 4231 test case 2
        let mac = compute_mac(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_compute_mac_is_deterministic() {
        let body = br#"{"action":"transfer","amount":1000}"#;
        assert_eq!(compute_mac(b"k", body), compute_mac(b"k", body));
    }

    #[test]
    fn test_single_bit_change_alters_mac() {
        let body = b"payload".to_vec();
        let mut flipped = body.clone();
        flipped[0] ^= 0x01;
        assert_ne!(compute_mac(b"k", &body), compute_mac(b"k", &flipped));

        // 密钥变化同样改变结果
        assert_ne!(compute_mac(b"k", &body), compute_mac(b"j", &body));
    }

    #[test]
    fn test_constant_time_equals() {
        let mac = compute_mac(b"k", b"body");
        assert!(constant_time_equals(&mac, &mac));
        assert!(constant_time_equals(&mac, &mac.to_uppercase()));

        let other = compute_mac(b"k", b"other");
        assert!(!constant_time_equals(&mac, &other));

        // 长度不同
        assert!(!constant_time_equals(&mac, &mac[..62]));
        assert!(!constant_time_equals("", &mac));
    }

    #[test]
    fn test_malformed_hex_is_not_equal() {
        let mac = compute_mac(b"k", b"body");
        assert!(!constant_time_equals(&mac, "zz"));
        assert!(!constant_time_equals("abc", "abc"));
        assert!(!constant_time_equals("not-hex", "not-hex"));
    }

    #[test]
    fn test_secret_debug_redacts_value() {
        let secret = Secret::new("supersecretkey123");
        let printed = format!("{secret:?}");
        assert!(!printed.contains("supersecret"));
        assert!(printed.contains("17"));
    }

    #[test]
    fn test_secret_zeroize_clears_bytes() {
        let mut secret = Secret::new("supersecretkey123");
        let copy = secret.clone();

        secret.zeroize();
        assert!(secret.is_empty());
        assert_eq!(secret.as_bytes(), b"");

        // 克隆是独立的副本
        assert_eq!(copy.as_bytes(), b"supersecretkey123");
    }

    #[test]
    fn test_secret_from_direct_source() {
        let secret = Secret::from_source(&SecretSource::Direct("  k  ".to_string())).unwrap();
        assert_eq!(secret.as_bytes(), b"k");

        let empty = Secret::from_source(&SecretSource::Direct("   ".to_string()));
        assert!(matches!(empty, Err(GateError::Secret(_))));
    }

    #[test]
    fn test_secret_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-secret-value").unwrap();

        let source = SecretSource::File(file.path().display().to_string());
        let secret = Secret::from_source(&source).unwrap();
        assert_eq!(secret.as_bytes(), b"file-secret-value");
    }

    #[test]
    fn test_secret_from_missing_env_var() {
        let source = SecretSource::Environment("MACGATE_TEST_SECRET_UNSET".to_string());
        assert!(matches!(
            Secret::from_source(&source),
            Err(GateError::Secret(_))
        ));
    }
}
