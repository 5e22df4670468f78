//! 集成测试共用的夹具：日志初始化、回显服务端、自签名证书与收集型回调。

#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, Once},
    time::Duration,
};

use kitten_socket::{ConnectionHandler, ErrorKind, TransportError};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::Notify,
};
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::EnvFilter;

/// 等待回调的上限；超时意味着测试失败而不是挂起。
pub const WAIT: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// 确保 AWS-LC 作为 rustls 的进程级默认提供者，服务端配置依赖它。
pub fn ensure_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("AWS-LC provider 注册失败，请检查 rustls 特性开关");
    });
}

/// 回调收到的全部内容的快照。
#[derive(Clone, Debug, Default)]
pub struct Collected {
    pub data: Vec<u8>,
    pub reads: Vec<usize>,
    pub errors: Vec<ErrorKind>,
}

/// 把每次回调追加到内存中的处理器。
#[derive(Debug, Default)]
pub struct Collector {
    state: Mutex<Collected>,
    notify: Notify,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Collected {
        self.state.lock().expect("收集器锁").clone()
    }

    /// 等待直到快照满足 `predicate`，超时则 panic。
    pub async fn wait_until(&self, predicate: impl Fn(&Collected) -> bool) -> Collected {
        let waiting = async {
            loop {
                let notified = self.notify.notified();
                let snapshot = self.snapshot();
                if predicate(&snapshot) {
                    return snapshot;
                }
                notified.await;
            }
        };
        tokio::time::timeout(WAIT, waiting)
            .await
            .expect("等待回调超时")
    }

    pub async fn wait_for_bytes(&self, expected: usize) -> Collected {
        self.wait_until(|collected| collected.data.len() >= expected)
            .await
    }

    pub async fn wait_for_error(&self) -> Collected {
        self.wait_until(|collected| !collected.errors.is_empty())
            .await
    }
}

impl ConnectionHandler for Collector {
    fn on_read(&self, data: &[u8]) {
        {
            let mut state = self.state.lock().expect("收集器锁");
            state.data.extend_from_slice(data);
            state.reads.push(data.len());
        }
        self.notify.notify_waiters();
    }

    fn on_error(&self, error: TransportError) {
        self.state.lock().expect("收集器锁").errors.push(error.kind());
        self.notify.notify_waiters();
    }
}

/// 启动明文回显服务端，返回监听端口。
pub async fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定回显端口");
    let port = listener.local_addr().expect("读取监听地址").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(echo(stream));
        }
    });
    port
}

/// 接受连接后立即关闭的服务端，用于观察对端断开。
pub async fn spawn_hangup_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定端口");
    let port = listener.local_addr().expect("读取监听地址").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    port
}

/// 接受连接后以 `SO_LINGER = 0` 关闭的服务端：对端收到 RST 而不是 FIN。
pub async fn spawn_reset_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定端口");
    let port = listener.local_addr().expect("读取监听地址").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            socket2::SockRef::from(&stream)
                .set_linger(Some(Duration::ZERO))
                .expect("设置 SO_LINGER");
            drop(stream);
        }
    });
    port
}

/// 返回一个当前无人监听的端口。
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定端口");
    listener.local_addr().expect("读取监听地址").port()
}

async fn echo<S>(mut stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                if stream.write_all(&buf[..read]).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = stream.shutdown().await;
}

/// 自签名证书及其 PEM 文件。
pub struct SelfSigned {
    pub config: Arc<rustls::ServerConfig>,
    pub ca_file: PathBuf,
}

impl Drop for SelfSigned {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.ca_file);
    }
}

/// 为 `common_name` 签发自签名证书，并把证书 PEM 写入临时文件作为 `CAFile`。
pub fn self_signed(common_name: &str, tag: &str) -> SelfSigned {
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
    use rustls::{
        ServerConfig,
        pki_types::{CertificateDer, PrivateKeyDer},
    };

    ensure_crypto_provider();

    let mut params = CertificateParams::new(vec![common_name.to_string()]).expect("构造证书参数");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate().expect("生成证书私钥");
    let certificate = params.self_signed(&key_pair).expect("签发自签名证书");

    let ca_file = std::env::temp_dir().join(format!(
        "kitten-socket-it-{}-{tag}.pem",
        std::process::id()
    ));
    std::fs::write(&ca_file, certificate.pem()).expect("写入 CAFile");

    let cert_der = CertificateDer::from(certificate.der().to_vec());
    let private_key = PrivateKeyDer::try_from(key_pair.serialize_der()).expect("解析私钥");
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], private_key)
        .expect("构建服务端 TLS 配置");

    SelfSigned {
        config: Arc::new(config),
        ca_file,
    }
}

/// 启动 TLS 回显服务端；握手失败的连接被直接丢弃。
pub async fn spawn_tls_echo_server(config: Arc<rustls::ServerConfig>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定 TLS 端口");
    let port = listener.local_addr().expect("读取监听地址").port();
    let acceptor = TlsAcceptor::from(config);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    echo(tls).await;
                }
            });
        }
    });
    port
}
