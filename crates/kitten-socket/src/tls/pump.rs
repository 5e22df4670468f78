use std::{
    io::{self, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use rustls::ClientConnection;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex as AsyncMutex,
};

use super::{TlsBackend, TlsContext, TlsReader, TlsSession, TlsWriter};
use crate::error::rustls_to_io;

/// 单次从套接字读取的密文上限。
///
/// 与 rustls 默认的明文接收上限相同：每轮读取前明文队列已被取空，一轮密文解出的明文不会超过上限。
const SCRATCH_SIZE: usize = 16 * 1024;

/// 手动泵送记录层的后端。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 与 [`StreamBackend`](super::StreamBackend) 走完全不同的集成路径：rustls 只负责状态机，
///   套接字读写由本后端显式驱动，相当于为 TLS 库提供自定义 I/O 回调；
/// - 这条路径暴露了“加密写只接受部分字节”的真实语义，发送方必须循环。
///
/// ## 逻辑 (How)
/// - 握手：循环执行“取出待发记录 → 写套接字 → 读套接字 → `read_tls` + `process_new_packets`”，
///   直到 `is_handshaking()` 为假，再冲刷最后一批记录（TLS 1.3 的客户端 Finished）；
///   处理失败时尽力把告警记录发给对端；
/// - 读：优先从 rustls 的明文队列取数据，队列为空（`WouldBlock`）时才读套接字；
/// - 写：持有套接字写锁，把明文交给 `writer()`（可能只接受一部分），再把产生的记录全部写出。
///
/// ## 契约 (What)
/// - `ClientConnection` 位于同步互斥锁内，锁从不跨越 `.await` 持有；
/// - 待发记录一律在持有套接字写锁时才从 rustls 取出：读路径产生的记录（如密钥更新应答）
///   与写路径的记录按 rustls 的生成顺序上线，不会交错。
#[derive(Clone, Copy, Debug, Default)]
pub struct PumpBackend;

impl PumpBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TlsBackend for PumpBackend {
    fn name(&self) -> &'static str {
        "pump"
    }

    async fn handshake(&self, stream: TcpStream, context: &TlsContext) -> io::Result<TlsSession> {
        let mut connection = ClientConnection::new(context.config(), context.server_name())
            .map_err(rustls_to_io)?;
        let (mut read_half, mut write_half) = stream.into_split();
        let mut scratch = vec![0u8; SCRATCH_SIZE].into_boxed_slice();

        while connection.is_handshaking() {
            let outgoing = take_outgoing(&mut connection)?;
            if !outgoing.is_empty() {
                write_half.write_all(&outgoing).await?;
            }
            if !connection.is_handshaking() || !connection.wants_read() {
                continue;
            }
            let received = read_half.read(&mut scratch).await?;
            if received == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection during the tls handshake",
                ));
            }
            if let Err(error) = absorb(&mut connection, &scratch[..received]) {
                if let Ok(alert) = take_outgoing(&mut connection)
                    && !alert.is_empty()
                {
                    let _ = write_half.write_all(&alert).await;
                }
                return Err(error);
            }
        }

        let outgoing = take_outgoing(&mut connection)?;
        if !outgoing.is_empty() {
            write_half.write_all(&outgoing).await?;
        }

        let shared = Arc::new(PumpShared {
            connection: Mutex::new(connection),
            socket: AsyncMutex::new(write_half),
        });
        Ok(TlsSession::new(
            PumpReader {
                shared: Arc::clone(&shared),
                socket: read_half,
                scratch,
            },
            PumpWriter { shared },
        ))
    }
}

struct PumpShared {
    connection: Mutex<ClientConnection>,
    socket: AsyncMutex<OwnedWriteHalf>,
}

impl PumpShared {
    fn connection(&self) -> MutexGuard<'_, ClientConnection> {
        match self.connection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 在套接字写锁内取出并写出待发记录。
    ///
    /// 记录只在持有写锁时取出，取出顺序即上线顺序，与写路径的记录不会交错。
    async fn flush_pending(&self) -> io::Result<usize> {
        let mut socket = self.socket.lock().await;
        let outgoing = take_outgoing(&mut self.connection())?;
        if !outgoing.is_empty() {
            socket.write_all(&outgoing).await?;
        }
        Ok(outgoing.len())
    }
}

struct PumpReader {
    shared: Arc<PumpShared>,
    socket: OwnedReadHalf,
    scratch: Box<[u8]>,
}

#[async_trait]
impl TlsReader for PumpReader {
    async fn encrypted_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.shared.connection().reader().read(buf) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
                Err(error) => return Err(error),
            }

            let received = self.socket.read(&mut self.scratch).await?;
            let has_pending = {
                let mut connection = self.shared.connection();
                if received == 0 {
                    // 通知 rustls 传输层已到 EOF，随后 reader() 会给出 Ok(0) 或 UnexpectedEof。
                    connection.read_tls(&mut io::empty())?;
                } else {
                    absorb(&mut connection, &self.scratch[..received])?;
                }
                connection.wants_write()
            };
            if has_pending {
                self.shared.flush_pending().await?;
            }
        }
    }
}

struct PumpWriter {
    shared: Arc<PumpShared>,
}

#[async_trait]
impl TlsWriter for PumpWriter {
    async fn encrypted_write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut socket = self.shared.socket.lock().await;
        let (accepted, outgoing) = {
            let mut connection = self.shared.connection();
            let accepted = connection.writer().write(data)?;
            (accepted, take_outgoing(&mut connection)?)
        };
        socket.write_all(&outgoing).await?;
        Ok(accepted)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        let mut socket = self.shared.socket.lock().await;
        let outgoing = {
            let mut connection = self.shared.connection();
            connection.send_close_notify();
            take_outgoing(&mut connection)?
        };
        socket.write_all(&outgoing).await?;
        socket.shutdown().await
    }
}

/// 取出 rustls 当前待发送的全部记录。
fn take_outgoing(connection: &mut ClientConnection) -> io::Result<Vec<u8>> {
    let mut outgoing = Vec::new();
    while connection.wants_write() {
        connection.write_tls(&mut outgoing)?;
    }
    Ok(outgoing)
}

/// 把一段密文全部交给 rustls 并处理。
fn absorb(connection: &mut ClientConnection, mut ciphertext: &[u8]) -> io::Result<()> {
    while !ciphertext.is_empty() {
        connection.read_tls(&mut ciphertext)?;
        connection.process_new_packets().map_err(rustls_to_io)?;
    }
    Ok(())
}
