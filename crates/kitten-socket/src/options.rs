use std::{fmt, path::PathBuf, sync::Arc};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::tls::TlsBackend;

pub const KEY_SSL_ENABLED: &str = "sslEnabled";
pub const KEY_CA_FILE: &str = "CAFile";
pub const KEY_INVALID_CERTIFICATE_ALLOWED: &str = "invalidCertificateAllowed";
pub const KEY_TCP_NO_DELAY: &str = "tcpNoDelay";
pub const KEY_WRITE_POLICY: &str = "writePolicy";

/// 明文发送遇到短写时的策略。
///
/// - `WriteAll`：循环写直到全部字节被内核接受；
/// - `SinglePass`：只发起一次写调用，短写直接报告为 `PartialWrite`。
///
/// 两种策略都不会把短写当作成功。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WritePolicy {
    #[default]
    WriteAll,
    SinglePass,
}

/// 建连选项。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 调用方通常以“命名选项表”描述连接（`sslEnabled`、`CAFile`、`invalidCertificateAllowed`），
///   本结构把它们收敛为强类型字段，并补充 `tcpNoDelay`、`writePolicy` 两个传输层旋钮；
/// - TLS 后端可在运行时注入，便于测试两种实现或替换为自定义后端。
///
/// ## 契约 (What)
/// - 默认：不启用 TLS、无 CA 文件、校验证书、开启 `TCP_NODELAY`、`WriteAll`；
/// - `from_map`：类型不符的值回退到默认并记录 `warn`，未知键记录 `debug` 后忽略；
/// - `from_toml_str`：同名键的 TOML 文档，语法或类型错误返回 [`OptionsError`]。
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    pub ssl_enabled: bool,
    pub ca_file: Option<PathBuf>,
    pub invalid_certificate_allowed: bool,
    pub tcp_nodelay: bool,
    pub write_policy: WritePolicy,
    tls_backend: Option<Arc<dyn TlsBackend>>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ssl_enabled: false,
            ca_file: None,
            invalid_certificate_allowed: false,
            tcp_nodelay: true,
            write_policy: WritePolicy::WriteAll,
            tls_backend: None,
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ssl(mut self, enabled: bool) -> Self {
        self.ssl_enabled = enabled;
        self
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn with_invalid_certificate_allowed(mut self, allowed: bool) -> Self {
        self.invalid_certificate_allowed = allowed;
        self
    }

    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// 注入 TLS 后端；未注入时使用平台默认后端。
    pub fn with_tls_backend(mut self, backend: Arc<dyn TlsBackend>) -> Self {
        self.tls_backend = Some(backend);
        self
    }

    pub fn tls_backend(&self) -> Option<&Arc<dyn TlsBackend>> {
        self.tls_backend.as_ref()
    }

    /// 从命名选项表构造。
    pub fn from_map(map: &Map<String, JsonValue>) -> Self {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                KEY_SSL_ENABLED => {
                    options.ssl_enabled = bool_option(key, value, options.ssl_enabled);
                }
                KEY_CA_FILE => match value.as_str() {
                    Some(path) => options.ca_file = Some(PathBuf::from(path)),
                    None => warn!(key = %key, value = %value, "ignoring non-string option"),
                },
                KEY_INVALID_CERTIFICATE_ALLOWED => {
                    options.invalid_certificate_allowed =
                        bool_option(key, value, options.invalid_certificate_allowed);
                }
                KEY_TCP_NO_DELAY => {
                    options.tcp_nodelay = bool_option(key, value, options.tcp_nodelay);
                }
                KEY_WRITE_POLICY => match WritePolicy::deserialize(value) {
                    Ok(policy) => options.write_policy = policy,
                    Err(error) => {
                        warn!(key = %key, value = %value, %error, "ignoring invalid write policy")
                    }
                },
                _ => debug!(key = %key, "ignoring unknown connect option"),
            }
        }
        options
    }

    /// 从 TOML 文档构造，键名与 [`ConnectOptions::from_map`] 相同。
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        let raw: RawOptions = toml::from_str(source)?;
        let defaults = Self::default();
        Ok(Self {
            ssl_enabled: raw.ssl_enabled.unwrap_or(defaults.ssl_enabled),
            ca_file: raw.ca_file,
            invalid_certificate_allowed: raw
                .invalid_certificate_allowed
                .unwrap_or(defaults.invalid_certificate_allowed),
            tcp_nodelay: raw.tcp_no_delay.unwrap_or(defaults.tcp_nodelay),
            write_policy: raw.write_policy.unwrap_or(defaults.write_policy),
            tls_backend: None,
        })
    }
}

/// 选项解析错误。
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid connect options: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptions {
    ssl_enabled: Option<bool>,
    #[serde(rename = "CAFile")]
    ca_file: Option<PathBuf>,
    invalid_certificate_allowed: Option<bool>,
    tcp_no_delay: Option<bool>,
    write_policy: Option<WritePolicy>,
}

fn bool_option(key: &str, value: &JsonValue, fallback: bool) -> bool {
    match value.as_bool() {
        Some(flag) => flag,
        None => {
            warn!(key, value = %value, fallback, "ignoring non-boolean option");
            fallback
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::WriteAll => f.write_str("writeAll"),
            WritePolicy::SinglePass => f.write_str("singlePass"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("测试输入必须是对象: {other}"),
        }
    }

    #[test]
    fn named_options_are_read() {
        let options = ConnectOptions::from_map(&map(json!({
            "sslEnabled": true,
            "CAFile": "/etc/ssl/ca.pem",
            "invalidCertificateAllowed": true,
            "writePolicy": "singlePass",
        })));
        assert!(options.ssl_enabled);
        assert_eq!(options.ca_file, Some(PathBuf::from("/etc/ssl/ca.pem")));
        assert!(options.invalid_certificate_allowed);
        assert!(options.tcp_nodelay);
        assert_eq!(options.write_policy, WritePolicy::SinglePass);
    }

    #[test]
    fn wrong_types_fall_back_to_defaults() {
        let options = ConnectOptions::from_map(&map(json!({
            "sslEnabled": "yes",
            "CAFile": 7,
            "writePolicy": "sometimes",
            "replicaSet": "rs0",
        })));
        assert!(!options.ssl_enabled);
        assert_eq!(options.ca_file, None);
        assert_eq!(options.write_policy, WritePolicy::WriteAll);
    }

    #[test]
    fn toml_documents_use_the_same_keys() {
        let options = ConnectOptions::from_toml_str(
            r#"
            sslEnabled = true
            CAFile = "ca.pem"
            tcpNoDelay = false
            "#,
        )
        .expect("合法的 TOML 选项");
        assert!(options.ssl_enabled);
        assert_eq!(options.ca_file, Some(PathBuf::from("ca.pem")));
        assert!(!options.tcp_nodelay);
        assert!(!options.invalid_certificate_allowed);

        assert!(ConnectOptions::from_toml_str("sslEnabled = 1").is_err());
    }
}
