use bytes::{Bytes, BytesMut};

/// 接收缓冲的默认容量：64 KiB。
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// 固定容量、可复用的接收缓冲。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 读分发器对每个连接只持有一块缓冲，每次接收都复用它，避免按消息分配；
/// - 以有界切片取代裸指针运算：消费者只能看到 `filled()`，已用长度之外的旧内容不可达。
///
/// ## 契约 (What)
/// - 容量在创建时确定且不再变化；
/// - `used <= capacity` 恒成立，[`ByteBuffer::commit`] 会把越界长度截断到容量；
/// - `filled()` 的内容在下一次接收前有效。
#[derive(Debug)]
pub struct ByteBuffer {
    storage: BytesMut,
    used: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: BytesMut::zeroed(capacity),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 最近一次接收写入的字节数。
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// 供下一次接收写入的整块区域。
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.storage[..]
    }

    /// 记录本次接收写入的字节数。
    pub fn commit(&mut self, received: usize) {
        self.used = received.min(self.capacity());
    }

    /// 最近一次接收的有效内容。
    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.used]
    }

    /// 复制出有效内容，供需要跨回调保留数据的调用方使用。
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.filled())
    }

    pub fn clear(&mut self) {
        self.used = 0;
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
