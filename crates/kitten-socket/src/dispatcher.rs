use std::{io, sync::Arc};

use tokio::{io::AsyncReadExt, net::tcp::OwnedReadHalf, task::JoinHandle};
use tracing::{debug, trace, warn};

use crate::{
    addr::TransportSocketAddr, buffer::ByteBuffer, error::TransportError,
    handler::ConnectionHandler, tls::TlsReader,
};

/// 读分发器的数据来源：明文读半部或 TLS 会话的解密读半部。
pub(crate) enum ReadSource {
    Plain(OwnedReadHalf),
    Tls(Box<dyn TlsReader>),
}

impl ReadSource {
    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReadSource::Plain(stream) => stream.read(buf).await,
            ReadSource::Tls(reader) => reader.encrypted_read(buf).await,
        }
    }
}

/// 每个连接一个的后台读任务。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 读路径与调用方完全解耦：数据在分发器自己的任务上等待、接收并推送给回调；
/// - 每个连接独占一块 [`ByteBuffer`]，接收循环反复复用它。
///
/// ## 逻辑 (How)
/// 1. 等待可读并执行一次接收（TLS 连接经由解密读，内部可能多次读套接字）；
/// 2. 收到 `n` 字节：记录已用长度，同步调用 `on_read(&buffer[..n])`；
/// 3. `n == 0`：同样以空切片调用一次 `on_read`，随后以 `DisconnectedByPeer` 调用 `on_error` 并退出；
///    TLS 对端未发 `close_notify` 直接断开（`UnexpectedEof`）按同样方式处理；
/// 4. 接收出错：以 `ReadFailed` 调用 `on_error` 并退出，不做重连。
///
/// ## 契约 (What)
/// - 回调按接收顺序串行执行，永不并发；
/// - 任务被中止（`close`）时只会停在等待点上，正在执行的回调总能完整返回。
pub struct ReadDispatcher {
    source: ReadSource,
    handler: Arc<dyn ConnectionHandler>,
    peer: TransportSocketAddr,
    buffer: ByteBuffer,
}

impl ReadDispatcher {
    pub(crate) fn new(
        source: ReadSource,
        handler: Arc<dyn ConnectionHandler>,
        peer: TransportSocketAddr,
    ) -> Self {
        Self {
            source,
            handler,
            peer,
            buffer: ByteBuffer::new(),
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            let outcome = self.source.receive(self.buffer.spare_mut()).await;
            let received = match outcome {
                Ok(received) => received,
                Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => 0,
                Err(source) => {
                    let error = TransportError::ReadFailed { source };
                    warn!(
                        peer = %self.peer,
                        code = error.code(),
                        category = ?error.category(),
                        %error,
                        "read loop stopped"
                    );
                    self.handler.on_error(error);
                    return;
                }
            };

            self.buffer.commit(received);
            trace!(peer = %self.peer, bytes = received, "delivering received bytes");
            self.handler.on_read(self.buffer.filled());

            if received == 0 {
                let error = TransportError::DisconnectedByPeer;
                debug!(peer = %self.peer, code = error.code(), "peer closed the connection");
                self.handler.on_error(error);
                return;
            }
        }
    }
}
