use std::{error::Error as StdError, io, time::Duration};

use rustls::{AlertDescription, Error as RustlsError};
use thiserror::Error;

use crate::addr::TransportSocketAddr;

/// 传输层错误。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 建连失败、握手失败、收发失败都以带类型的结果返回，绝不让底层错误以 panic 的形式逃逸；
/// - 每个变体对应一个稳定错误码（[`ErrorKind::code`]），日志与调用方的重试逻辑据此分流，
///   无需解析底层库的文案。
///
/// ## 契约（What）
/// - 建连阶段（解析、创建、连接、TLS 上下文、握手）的失败由 `connect` 同步返回；
/// - `SendFailed`/`PartialWrite`/`Closed` 由 `send` 同步返回；
/// - `ReadFailed`/`DisconnectedByPeer` 只会经由错误回调异步送达，随后读循环终止；
/// - `PartialWrite` 与 `ConnectFailed` 是对“短写被当作成功”“connect 返回值不检查”两处缺口的显式化。
///
/// ## 风险与权衡（Trade-offs）
/// - 变体携带 `io::Error` 而非字符串，保留 `source()` 链；代价是本类型无法 `Clone`。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("failed to resolve {host}:{port}: {source}")]
    AddressResolutionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to create socket for {peer}: {source}")]
    SocketCreateFailed {
        peer: TransportSocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {peer}: {source}")]
    ConnectFailed {
        peer: TransportSocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to build tls context: {reason}")]
    TlsContextCreateFailed {
        reason: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
    #[error("tls handshake with {peer} failed ({backend}): {source}")]
    TlsHandshakeFailed {
        peer: TransportSocketAddr,
        backend: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("send failed: {source}")]
    SendFailed {
        #[source]
        source: io::Error,
    },
    #[error("partial write: {written} of {expected} bytes accepted")]
    PartialWrite { written: usize, expected: usize },
    #[error("read failed: {source}")]
    ReadFailed {
        #[source]
        source: io::Error,
    },
    #[error("connection closed by peer")]
    DisconnectedByPeer,
    #[error("transport already closed")]
    Closed,
}

/// 错误种类：与 [`TransportError`] 一一对应的无负载枚举，便于匹配与打日志。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AddressResolutionFailed,
    SocketCreateFailed,
    ConnectFailed,
    TlsContextCreateFailed,
    TlsHandshakeFailed,
    SendFailed,
    PartialWrite,
    ReadFailed,
    DisconnectedByPeer,
    Closed,
}

impl ErrorKind {
    /// 稳定错误码。
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::AddressResolutionFailed => "kitten.socket.address_resolution_failed",
            ErrorKind::SocketCreateFailed => "kitten.socket.socket_create_failed",
            ErrorKind::ConnectFailed => "kitten.socket.connect_failed",
            ErrorKind::TlsContextCreateFailed => "kitten.socket.tls_context_create_failed",
            ErrorKind::TlsHandshakeFailed => "kitten.socket.tls_handshake_failed",
            ErrorKind::SendFailed => "kitten.socket.send_failed",
            ErrorKind::PartialWrite => "kitten.socket.partial_write",
            ErrorKind::ReadFailed => "kitten.socket.read_failed",
            ErrorKind::DisconnectedByPeer => "kitten.socket.disconnected_by_peer",
            ErrorKind::Closed => "kitten.socket.closed",
        }
    }
}

/// 面向调用方重试/告警决策的错误分类。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Retryable(RetryAdvice),
    NonRetryable,
    Security(SecurityClass),
    ResourceExhausted,
}

/// 重试建议：等待多久再试。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryAdvice {
    pub wait: Duration,
}

impl RetryAdvice {
    pub const fn after(wait: Duration) -> Self {
        Self { wait }
    }
}

/// 安全类错误的细分。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecurityClass {
    Authentication,
    Authorization,
    Integrity,
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::AddressResolutionFailed { .. } => ErrorKind::AddressResolutionFailed,
            TransportError::SocketCreateFailed { .. } => ErrorKind::SocketCreateFailed,
            TransportError::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            TransportError::TlsContextCreateFailed { .. } => ErrorKind::TlsContextCreateFailed,
            TransportError::TlsHandshakeFailed { .. } => ErrorKind::TlsHandshakeFailed,
            TransportError::SendFailed { .. } => ErrorKind::SendFailed,
            TransportError::PartialWrite { .. } => ErrorKind::PartialWrite,
            TransportError::ReadFailed { .. } => ErrorKind::ReadFailed,
            TransportError::DisconnectedByPeer => ErrorKind::DisconnectedByPeer,
            TransportError::Closed => ErrorKind::Closed,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// 面向重连决策的分类。
    ///
    /// - 握手阶段的证书与告警失败归为 `Security`：换一条连接也只会得到同样的证书；
    /// - 对端拒绝、重置、超时等套接字失败归为 `Retryable`，并给出重连前的等待建议；
    /// - 配置错误、已关闭与不兼容的 TLS 参数归为 `NonRetryable`；短写归为 `ResourceExhausted`。
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransportError::AddressResolutionFailed { .. } => retry_after(200),
            TransportError::SocketCreateFailed { source, .. } => match source.kind() {
                io::ErrorKind::OutOfMemory => ErrorCategory::ResourceExhausted,
                _ => ErrorCategory::NonRetryable,
            },
            TransportError::ConnectFailed { source, .. }
            | TransportError::SendFailed { source }
            | TransportError::ReadFailed { source } => socket_category(source),
            TransportError::TlsContextCreateFailed { .. } => ErrorCategory::NonRetryable,
            TransportError::TlsHandshakeFailed { source, .. } => match rustls_source(source) {
                Some(rustls_error) => handshake_category(rustls_error),
                None => socket_category(source),
            },
            TransportError::PartialWrite { .. } => ErrorCategory::ResourceExhausted,
            TransportError::DisconnectedByPeer => retry_after(60),
            TransportError::Closed => ErrorCategory::NonRetryable,
        }
    }

    pub(crate) fn tls_context(reason: impl Into<String>) -> Self {
        TransportError::TlsContextCreateFailed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn tls_context_with(
        reason: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        TransportError::TlsContextCreateFailed {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// 将 `rustls::Error` 包装为 `io::Error`，保持可被 [`TransportError::category`] 还原。
pub(crate) fn rustls_to_io(error: RustlsError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

/// 取出包装在 `io::Error` 内的 `rustls::Error`（两种后端都以这种方式上报 TLS 失败）。
fn rustls_source(error: &io::Error) -> Option<&RustlsError> {
    error.get_ref()?.downcast_ref::<RustlsError>()
}

fn handshake_category(error: &RustlsError) -> ErrorCategory {
    match error {
        RustlsError::InvalidCertificate(_)
        | RustlsError::NoCertificatesPresented
        | RustlsError::UnsupportedNameType => ErrorCategory::Security(SecurityClass::Authentication),
        RustlsError::AlertReceived(alert) => alert_category(*alert),
        RustlsError::PeerIncompatible(_) => ErrorCategory::NonRetryable,
        _ => ErrorCategory::Security(SecurityClass::Integrity),
    }
}

/// 服务端在握手中发来的告警。
fn alert_category(alert: AlertDescription) -> ErrorCategory {
    match alert {
        AlertDescription::BadCertificate
        | AlertDescription::UnsupportedCertificate
        | AlertDescription::CertificateRevoked
        | AlertDescription::CertificateExpired
        | AlertDescription::CertificateUnknown
        | AlertDescription::UnknownCA
        | AlertDescription::CertificateRequired => {
            ErrorCategory::Security(SecurityClass::Authentication)
        }
        AlertDescription::AccessDenied => ErrorCategory::Security(SecurityClass::Authorization),
        AlertDescription::ProtocolVersion | AlertDescription::InsufficientSecurity => {
            ErrorCategory::NonRetryable
        }
        _ => ErrorCategory::Security(SecurityClass::Integrity),
    }
}

/// 建连、收发阶段的套接字失败。
fn socket_category(error: &io::Error) -> ErrorCategory {
    match error.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => retry_after(200),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => retry_after(60),
        io::ErrorKind::OutOfMemory => ErrorCategory::ResourceExhausted,
        // 已建立会话上的 TLS 记录错误（解密失败、对端违规）。
        io::ErrorKind::InvalidData => match rustls_source(error) {
            Some(_) => ErrorCategory::Security(SecurityClass::Integrity),
            None => ErrorCategory::NonRetryable,
        },
        _ => ErrorCategory::NonRetryable,
    }
}

fn retry_after(millis: u64) -> ErrorCategory {
    ErrorCategory::Retryable(RetryAdvice::after(Duration::from_millis(millis)))
}
