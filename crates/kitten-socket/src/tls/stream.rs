use std::io;

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};
use tokio_rustls::{TlsConnector, client::TlsStream};

use super::{TlsBackend, TlsContext, TlsReader, TlsSession, TlsWriter};

/// 基于 `tokio-rustls` 的后端：TLS 流直接接管套接字。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// - `TlsConnector::connect` 完成握手后，用 `tokio::io::split` 拆成读写两半，读半部交给读分发器，
///   写半部留在发送锁之后；
/// - 每次加密写之后立即 `flush`，保证返回时密文已经交给内核。
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamBackend;

impl StreamBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TlsBackend for StreamBackend {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn handshake(&self, stream: TcpStream, context: &TlsContext) -> io::Result<TlsSession> {
        let connector = TlsConnector::from(context.config());
        let tls = connector.connect(context.server_name(), stream).await?;
        let (reader, writer) = tokio::io::split(tls);
        Ok(TlsSession::new(
            StreamReader { inner: reader },
            StreamWriter { inner: writer },
        ))
    }
}

struct StreamReader {
    inner: ReadHalf<TlsStream<TcpStream>>,
}

#[async_trait]
impl TlsReader for StreamReader {
    async fn encrypted_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).await
    }
}

struct StreamWriter {
    inner: WriteHalf<TlsStream<TcpStream>>,
}

#[async_trait]
impl TlsWriter for StreamWriter {
    async fn encrypted_write(&mut self, data: &[u8]) -> io::Result<usize> {
        let accepted = self.inner.write(data).await?;
        self.inner.flush().await?;
        Ok(accepted)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
