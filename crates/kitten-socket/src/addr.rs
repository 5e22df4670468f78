use std::{
    fmt, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use socket2::Domain;
use tracing::debug;

use crate::error::TransportError;

/// 传输层统一地址枚举。
///
/// # 教案级说明
///
/// ## 意图（Why）
/// - 以带地址族标签的值类型取代按地址族重新解释原始内存的做法，IPv4/IPv6 的布局差异
///   在类型层面显式呈现；
/// - 作为错误与日志中的 `peer` 字段，保持输出格式稳定。
///
/// ## 契约（What）
/// - `V4 { addr, port }`：网络序字节数组；
/// - `V6 { addr, port }`：8 个 16 位段；
/// - `domain()` 给出创建套接字所需的地址族。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportSocketAddr {
    /// IPv4 地址。
    V4 { addr: [u8; 4], port: u16 },
    /// IPv6 地址。
    V6 { addr: [u16; 8], port: u16 },
}

impl TransportSocketAddr {
    pub const fn port(&self) -> u16 {
        match self {
            Self::V4 { port, .. } | Self::V6 { port, .. } => *port,
        }
    }

    /// 与地址族匹配的套接字域。
    pub fn domain(&self) -> Domain {
        match self {
            Self::V4 { .. } => Domain::IPV4,
            Self::V6 { .. } => Domain::IPV6,
        }
    }

    pub fn is_loopback(&self) -> bool {
        SocketAddr::from(*self).ip().is_loopback()
    }
}

impl fmt::Display for TransportSocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSocketAddr::V4 { addr, port } => {
                write!(
                    f,
                    "{}.{}.{}.{}:{}",
                    addr[0], addr[1], addr[2], addr[3], port
                )
            }
            TransportSocketAddr::V6 { addr, port } => {
                write!(f, "[{}]:{}", Ipv6Addr::from(*addr), port)
            }
        }
    }
}

impl From<SocketAddr> for TransportSocketAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::V4 {
                addr: v4.ip().octets(),
                port: v4.port(),
            },
            SocketAddr::V6(v6) => Self::V6 {
                addr: v6.ip().segments(),
                port: v6.port(),
            },
        }
    }
}

impl From<TransportSocketAddr> for SocketAddr {
    fn from(addr: TransportSocketAddr) -> Self {
        match addr {
            TransportSocketAddr::V4 { addr, port } => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::from(addr)), port)
            }
            TransportSocketAddr::V6 { addr, port } => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::from(addr)), port)
            }
        }
    }
}

/// 主机名解析。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - `"localhost"` 在不同系统上可能先解析出 `::1`，而服务端往往只监听 IPv4 回环；
///   统一改写为 `127.0.0.1` 可以得到确定的行为。
///
/// ## 逻辑（How）
/// - 改写别名后交给 `tokio::net::lookup_host`（流式套接字、TCP、任意地址族），取第一个结果；
/// - 解析失败或结果为空都报告为 `AddressResolutionFailed`。
///
/// ## 注意事项（Trade-offs）
/// - 只使用第一个地址，不做多地址轮询；连接失败的重试策略由调用方决定。
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressResolver;

impl AddressResolver {
    pub const LOOPBACK_ALIAS: &'static str = "localhost";
    pub const LOOPBACK_LITERAL: &'static str = "127.0.0.1";

    /// 别名改写后的实际解析目标。
    pub fn effective_host(host: &str) -> &str {
        if host.eq_ignore_ascii_case(Self::LOOPBACK_ALIAS) {
            Self::LOOPBACK_LITERAL
        } else {
            host
        }
    }

    pub async fn resolve(host: &str, port: u16) -> Result<TransportSocketAddr, TransportError> {
        let target = Self::effective_host(host);
        let mut candidates = tokio::net::lookup_host((target, port))
            .await
            .map_err(|source| TransportError::AddressResolutionFailed {
                host: host.to_owned(),
                port,
                source,
            })?;
        let resolved = candidates
            .next()
            .map(TransportSocketAddr::from)
            .ok_or_else(|| TransportError::AddressResolutionFailed {
                host: host.to_owned(),
                port,
                source: io::Error::new(io::ErrorKind::NotFound, "no address records"),
            })?;
        debug!(host, port, peer = %resolved, "resolved peer address");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_is_rewritten_to_ipv4_loopback() {
        assert_eq!(AddressResolver::effective_host("localhost"), "127.0.0.1");
        assert_eq!(AddressResolver::effective_host("LocalHost"), "127.0.0.1");
        assert_eq!(AddressResolver::effective_host("db.internal"), "db.internal");
    }

    #[test]
    fn display_matches_standard_socket_addr() {
        let v6: SocketAddr = "[2001:db8::1]:27017".parse().expect("合法 IPv6 地址");
        let addr = TransportSocketAddr::from(v6);
        assert_eq!(addr.to_string(), "[2001:db8::1]:27017");
        assert_eq!(SocketAddr::from(addr), v6);
        assert_eq!(addr.domain(), Domain::IPV6);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolves_localhost_to_loopback_v4() {
        let resolved = AddressResolver::resolve("localhost", 27017)
            .await
            .expect("localhost 必须可解析");
        assert_eq!(
            resolved,
            TransportSocketAddr::V4 {
                addr: [127, 0, 0, 1],
                port: 27017
            }
        );
        assert!(resolved.is_loopback());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unresolvable_host_is_reported() {
        let error = AddressResolver::resolve("no such host.invalid", 1)
            .await
            .expect_err("非法主机名不应解析成功");
        assert_eq!(error.kind(), crate::ErrorKind::AddressResolutionFailed);
    }
}
