use std::fmt;

use crate::error::TransportError;

/// 连接的读/错误回调。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 读路径是推送式的：数据到达后由读分发器在自己的任务上调用 `on_read`，调用方的上下文
///   永远不会被读阻塞；需要同步语义的调用方自行在回调外包一层等待。
///
/// ## 契约 (What)
/// - `on_read` 收到的切片只在本次调用期间有效，下一次接收会覆盖其内容；
/// - 同一连接上的回调严格按接收顺序串行调用，彼此不会并发，也不会与该连接的 `close` 并发；
/// - `on_error` 被调用后不会再有任何 `on_read`。
///
/// ## 注意事项 (Trade-offs)
/// - 回调运行在 Tokio 工作线程上，不应执行长时间阻塞的操作，否则会拖慢同一运行时上的其他连接。
pub trait ConnectionHandler: Send + Sync + 'static {
    fn on_read(&self, data: &[u8]);

    fn on_error(&self, error: TransportError);
}

/// 以两个闭包组成的 [`ConnectionHandler`]。
pub struct FnHandler<R, E> {
    on_read: R,
    on_error: E,
}

impl<R, E> FnHandler<R, E>
where
    R: Fn(&[u8]) + Send + Sync + 'static,
    E: Fn(TransportError) + Send + Sync + 'static,
{
    pub fn new(on_read: R, on_error: E) -> Self {
        Self { on_read, on_error }
    }
}

impl<R, E> ConnectionHandler for FnHandler<R, E>
where
    R: Fn(&[u8]) + Send + Sync + 'static,
    E: Fn(TransportError) + Send + Sync + 'static,
{
    fn on_read(&self, data: &[u8]) {
        (self.on_read)(data)
    }

    fn on_error(&self, error: TransportError) {
        (self.on_error)(error)
    }
}

impl<R, E> fmt::Debug for FnHandler<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// 便捷构造：`handler_fn(|bytes| ..., |error| ...)`。
pub fn handler_fn<R, E>(on_read: R, on_error: E) -> FnHandler<R, E>
where
    R: Fn(&[u8]) + Send + Sync + 'static,
    E: Fn(TransportError) + Send + Sync + 'static,
{
    FnHandler::new(on_read, on_error)
}
