#![deny(unsafe_code)]
#![doc = r#"
# kitten-socket

## 设计动机（Why）
- **定位**：为文档数据库驱动提供最底层的字节传输：一条 TCP 连接，可选 TLS，推送式读回调。
- **架构角色**：位于命令编解码层之下；上层只通过 [`SocketTransport`]（或 [`ByteTransport`]）
  发送完整的线协议帧，并在 [`ConnectionHandler`] 中接收原始字节，帧的切分与解析不在本 crate。
- **设计理念**：TLS 被抽象为 [`TlsBackend`] 能力接口，两种实现（`tokio-rustls` 流式与手动泵送）
  共用同一套传输逻辑，平台默认值在构建期确定，运行时仍可注入。

## 核心契约（What）
- **建连**：`localhost` 一律改写为 `127.0.0.1`；地址族跟随解析结果；`connect` 的结果被检查，
  失败报告为 `ConnectFailed`；
- **发送**：同一连接上的发送串行化，短写要么被补全要么报告为 `PartialWrite`，绝不静默截断；
- **读取**：每个连接一个后台读任务，回调串行执行；对端关闭时先以空切片回调一次 `on_read`，
  再以 `DisconnectedByPeer` 回调 `on_error`；
- **关闭**：TLS 会话先于套接字关闭，`close` 幂等。

## 实现策略（How）
- 套接字由 `socket2` 创建，以便在连接前设置平台相关选项，再交给 Tokio 驱动；
- 错误统一为 [`TransportError`]，附带稳定错误码与 [`ErrorCategory`] 分类，TLS 告警会被
  还原为安全类错误；
- 配置来自 [`ConnectOptions`]：可由构建器、JSON 键值表或 TOML 文档得到。

## 风险与考量（Trade-offs）
- 不做连接池、重连、超时与消息分帧，这些属于上层职责；
- 启用证书校验时必须提供 `CAFile`，本 crate 不附带公共信任库。
"#]

mod addr;
mod buffer;
mod dispatcher;
mod error;
mod handler;
mod options;
pub mod tls;
mod transport;

pub use addr::{AddressResolver, TransportSocketAddr};
pub use buffer::{ByteBuffer, DEFAULT_CAPACITY};
pub use dispatcher::ReadDispatcher;
pub use error::{ErrorCategory, ErrorKind, RetryAdvice, SecurityClass, TransportError};
pub use handler::{ConnectionHandler, FnHandler, handler_fn};
pub use options::{
    ConnectOptions, KEY_CA_FILE, KEY_INVALID_CERTIFICATE_ALLOWED, KEY_SSL_ENABLED,
    KEY_TCP_NO_DELAY, KEY_WRITE_POLICY, OptionsError, WritePolicy,
};
pub use tls::{PumpBackend, StreamBackend, TlsBackend, TlsContext, default_backend};
pub use transport::{ByteTransport, SocketTransport};
