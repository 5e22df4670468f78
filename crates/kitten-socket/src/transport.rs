use std::{
    io,
    net::Shutdown,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use socket2::{Protocol, Socket, Type};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::{TcpSocket, TcpStream, tcp::OwnedWriteHalf},
    sync::Mutex as AsyncMutex,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    addr::{AddressResolver, TransportSocketAddr},
    dispatcher::{ReadDispatcher, ReadSource},
    error::TransportError,
    handler::ConnectionHandler,
    options::{ConnectOptions, WritePolicy},
    tls::{TlsContext, TlsWriter, default_backend},
};

/// 协作方眼中的字节传输：发送、关闭、存活探测。
///
/// 文档/命令编码层只依赖本 trait，便于在测试中替换为内存实现。
#[async_trait]
pub trait ByteTransport: Send + Sync {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

enum Writer {
    Plain(OwnedWriteHalf),
    Tls(Box<dyn TlsWriter>),
}

/// 单条 TCP（可选 TLS）连接。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 独占一个套接字及其可选的 TLS 会话，负责建连、发送、关闭与存活探测；
/// - 读路径交给 [`ReadDispatcher`] 在独立任务上推送，发送路径在调用方的任务上执行。
///
/// ## 逻辑 (How)
/// - `connect`：解析地址 → 以 socket2 创建与地址族匹配的流式套接字 → 异步 `connect` 并检查结果
///   → 可选 TLS 握手 → 拆分读写两半，读半部交给分发器；
/// - 另保留一个复制出的描述符作为“探针”，供 `is_connected` 读取 `SO_ERROR`、供 `close` 执行
///   `shutdown(Both)`；
/// - `send`：写半部位于异步互斥锁之后，同一连接上的发送严格串行，两次发送的字节不会交错。
///
/// ## 契约 (What)
/// - TLS 会话先于描述符关闭；`close` 幂等，重复调用直接返回 `Ok(())`；
/// - `close` 之后的 `send` 返回 `Closed`；
/// - 丢弃传输对象时若尚未关闭，读任务被中止，描述符随各持有者释放。
///
/// ## 注意事项 (Trade-offs)
/// - 握手没有超时，与建连一样由调用方按需在外层加 `tokio::time::timeout`；
/// - 发送直接借用调用方的切片，不做额外复制，调用方在 `send` 返回前无法修改它。
pub struct SocketTransport {
    peer: TransportSocketAddr,
    tls_backend: Option<&'static str>,
    write_policy: WritePolicy,
    writer: AsyncMutex<Option<Writer>>,
    control: Socket,
    closed: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl SocketTransport {
    /// 建立连接并启动读分发器。
    pub async fn connect(
        host: &str,
        port: u16,
        options: ConnectOptions,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, TransportError> {
        let peer = AddressResolver::resolve(host, port).await?;
        let tls_context = if options.ssl_enabled {
            Some(TlsContext::from_options(host, &options)?)
        } else {
            None
        };

        let (stream, control) = open_stream(peer, &options).await?;

        let (source, writer, tls_backend) = match tls_context {
            Some(context) => {
                let backend = options
                    .tls_backend()
                    .cloned()
                    .unwrap_or_else(default_backend);
                debug!(peer = %peer, backend = backend.name(), "starting tls handshake");
                let session = backend.handshake(stream, &context).await.map_err(|source| {
                    TransportError::TlsHandshakeFailed {
                        peer,
                        backend: backend.name(),
                        source,
                    }
                })?;
                let (reader, writer) = session.into_parts();
                (
                    ReadSource::Tls(reader),
                    Writer::Tls(writer),
                    Some(backend.name()),
                )
            }
            None => {
                let (reader, writer) = stream.into_split();
                (ReadSource::Plain(reader), Writer::Plain(writer), None)
            }
        };

        let dispatcher = ReadDispatcher::new(source, handler, peer).spawn();
        info!(
            peer = %peer,
            tls = tls_backend.is_some(),
            backend = tls_backend.unwrap_or("none"),
            "connected"
        );

        Ok(Self {
            peer,
            tls_backend,
            write_policy: options.write_policy,
            writer: AsyncMutex::new(Some(writer)),
            control,
            closed: AtomicBool::new(false),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    pub fn peer(&self) -> TransportSocketAddr {
        self.peer
    }

    pub fn is_tls(&self) -> bool {
        self.tls_backend.is_some()
    }

    /// 握手所用 TLS 后端的名称；明文连接为 `None`。
    pub fn tls_backend(&self) -> Option<&'static str> {
        self.tls_backend
    }

    /// 发送 `data` 的全部字节。
    ///
    /// - TLS：循环调用加密写，直到全部明文被接受；
    /// - 明文：按 [`WritePolicy`] 循环或只写一次；
    /// - 任何无法补全的短写都报告为 `PartialWrite`，绝不当作成功。
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        let result = match writer {
            Writer::Tls(writer) => write_encrypted(writer.as_mut(), data).await,
            Writer::Plain(stream) => write_plain(stream, data, self.write_policy).await,
        };
        if let Err(error) = &result {
            warn!(
                peer = %self.peer,
                code = error.code(),
                category = ?error.category(),
                %error,
                "send failed"
            );
        }
        result
    }

    /// 关闭连接：停止读任务 → TLS `close_notify` → 关闭套接字。
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(dispatcher) = self.take_dispatcher() {
            dispatcher.abort();
            let _ = dispatcher.await;
        }

        let writer = self.writer.lock().await.take();
        if let Some(Writer::Tls(mut writer)) = writer
            && let Err(error) = writer.shutdown().await
        {
            debug!(peer = %self.peer, %error, "tls shutdown failed");
        }

        if let Err(error) = self.control.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(peer = %self.peer, %error, "socket shutdown failed");
        }
        debug!(peer = %self.peer, "closed");
        Ok(())
    }

    /// 非破坏性的存活探测：读取 `SO_ERROR`，不消费任何数据。
    ///
    /// 已关闭、读循环已退出或套接字报告错误时返回 `false`。
    pub fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let reading = match self.dispatcher.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|handle| !handle.is_finished()),
            Err(poisoned) => poisoned
                .into_inner()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
        };
        if !reading {
            return false;
        }
        match self.control.take_error() {
            Ok(None) => true,
            Ok(Some(error)) => {
                debug!(peer = %self.peer, %error, "socket reports an error");
                false
            }
            Err(_) => false,
        }
    }

    fn take_dispatcher(&self) -> Option<JoinHandle<()>> {
        match self.dispatcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.take_dispatcher() {
            dispatcher.abort();
        }
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.control.shutdown(Shutdown::Both);
        }
    }
}

#[async_trait]
impl ByteTransport for SocketTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        SocketTransport::send(self, data).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        SocketTransport::close(self).await
    }

    fn is_connected(&self) -> bool {
        SocketTransport::is_connected(self)
    }
}

/// 创建、配置并连接套接字，返回 Tokio 流与探针描述符。
async fn open_stream(
    peer: TransportSocketAddr,
    options: &ConnectOptions,
) -> Result<(TcpStream, Socket), TransportError> {
    let create_failed = |source: io::Error| TransportError::SocketCreateFailed { peer, source };

    let socket =
        Socket::new(peer.domain(), Type::STREAM, Some(Protocol::TCP)).map_err(create_failed)?;
    #[cfg(target_vendor = "apple")]
    socket.set_nosigpipe(true).map_err(create_failed)?;
    socket.set_nonblocking(true).map_err(create_failed)?;
    let control = socket.try_clone().map_err(create_failed)?;

    let tcp = TcpSocket::from_std_stream(socket.into());
    let stream = tcp
        .connect(peer.into())
        .await
        .map_err(|source| TransportError::ConnectFailed { peer, source })?;
    stream
        .set_nodelay(options.tcp_nodelay)
        .map_err(|source| TransportError::ConnectFailed { peer, source })?;
    Ok((stream, control))
}

async fn write_encrypted(writer: &mut dyn TlsWriter, data: &[u8]) -> Result<(), TransportError> {
    let mut written = 0;
    while written < data.len() {
        match writer.encrypted_write(&data[written..]).await {
            Ok(0) => {
                return Err(TransportError::PartialWrite {
                    written,
                    expected: data.len(),
                });
            }
            Ok(accepted) => written += accepted,
            Err(source) => return Err(TransportError::SendFailed { source }),
        }
    }
    Ok(())
}

async fn write_plain<W>(
    stream: &mut W,
    data: &[u8],
    policy: WritePolicy,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < data.len() {
        match stream.write(&data[written..]).await {
            Ok(0) => {
                return Err(TransportError::PartialWrite {
                    written,
                    expected: data.len(),
                });
            }
            Ok(accepted) => written += accepted,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(TransportError::SendFailed { source }),
        }
        if policy == WritePolicy::SinglePass && written < data.len() {
            return Err(TransportError::PartialWrite {
                written,
                expected: data.len(),
            });
        }
    }
    Ok(())
}
