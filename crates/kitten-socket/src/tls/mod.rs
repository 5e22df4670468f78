//! TLS 能力接口与两种实现。
//!
//! ## 角色定位（Why）
//! - 传输层只依赖 [`TlsBackend`] 这一能力接口：握手、加密读、加密写、关闭；
//!   具体实现的选择集中在 [`default_backend`] 与运行时注入两处，不在传输逻辑中散落条件分支。
//!
//! ## 两种实现（What）
//! - [`StreamBackend`]：`tokio-rustls` 的 `TlsConnector`，会话直接接管套接字；
//! - [`PumpBackend`]：裸 `rustls::ClientConnection`，由本 crate 在套接字读写半部之上
//!   手动泵送记录层数据；一次加密写可能只接受部分字节。
//!
//! ## 构建期默认（How）
//! - Apple 平台默认 `PumpBackend`，其余平台默认 `StreamBackend`；
//! - 通过 [`ConnectOptions::with_tls_backend`](crate::ConnectOptions::with_tls_backend) 可以覆盖。

use std::{fmt, io, sync::Arc};

use async_trait::async_trait;
use tokio::net::TcpStream;

mod context;
mod pump;
mod stream;

pub use context::{TlsContext, crypto_provider};
pub use pump::PumpBackend;
pub use stream::StreamBackend;

/// TLS 后端能力接口。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - `handshake` 取得 TCP 连接的所有权，握手成功后返回读写两半；失败时连接随之释放；
/// - 握手错误以 `io::Error` 返回，其中嵌套的 `rustls::Error`（若有）会被错误分类逻辑还原；
/// - 实现必须是无状态或内部同步的，同一实例会被多个连接并发使用。
#[async_trait]
pub trait TlsBackend: Send + Sync + fmt::Debug {
    /// 写入日志与错误的后端名称。
    fn name(&self) -> &'static str;

    async fn handshake(&self, stream: TcpStream, context: &TlsContext) -> io::Result<TlsSession>;
}

/// 会话的解密读半部。
#[async_trait]
pub trait TlsReader: Send {
    /// 读取至多 `buf.len()` 字节明文；返回 0 表示对端已发出 `close_notify`。
    async fn encrypted_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 会话的加密写半部。
#[async_trait]
pub trait TlsWriter: Send {
    /// 加密并发送 `data` 的前缀，返回被接受的明文字节数，可能小于 `data.len()`。
    async fn encrypted_write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// 发送 `close_notify` 并关闭底层连接的写方向。
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// 握手成功后的会话。
pub struct TlsSession {
    reader: Box<dyn TlsReader>,
    writer: Box<dyn TlsWriter>,
}

impl TlsSession {
    pub fn new(reader: impl TlsReader + 'static, writer: impl TlsWriter + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    pub fn into_parts(self) -> (Box<dyn TlsReader>, Box<dyn TlsWriter>) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSession").finish_non_exhaustive()
    }
}

/// 当前平台的默认后端。
pub fn default_backend() -> Arc<dyn TlsBackend> {
    if cfg!(target_vendor = "apple") {
        Arc::new(PumpBackend::new())
    } else {
        Arc::new(StreamBackend::new())
    }
}
