use core::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use bytes::Bytes;

/// 不可变、可排序、可哈希的字节串，作为文本/键的规范表示。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 文档模型中的键与文本字段最终都以字节形式落盘或上线路，统一为 `KittenBytes`
///   可以避免在每次比较、哈希时重复进行 UTF-8 编码；
/// - 底层复用 [`Bytes`]，克隆只增加引用计数，适合在转换过程中大量传递。
///
/// ## 契约 (What)
/// - **相等**：逐字节比较；
/// - **排序**：按字节字典序；当一方是另一方的严格前缀时，较短者在前（与两段文本的
///   字符串比较结果一致），因此构成严格全序；
/// - **哈希**：[`KittenBytes::stable_hash`] 以乘数 31 做多项式累加（环绕运算），空串为 0；
///   `a == b` 必然推出哈希相等；
/// - 创建后不可变。
///
/// ## 注意事项 (Trade-offs)
/// - `Hash` 实现只喂入稳定哈希值，与 `[u8]` 的哈希不同，因此刻意不实现 `Borrow<[u8]>`。
#[derive(Clone, Default)]
pub struct KittenBytes {
    bytes: Bytes,
}

impl KittenBytes {
    /// 以任意可转换为 [`Bytes`] 的数据构造。
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { bytes: data.into() }
    }

    /// 零拷贝地引用静态字节。
    pub const fn from_static(data: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::from_static(data),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 交出底层 [`Bytes`]。
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// 严格按 UTF-8 解码；非法序列返回 `None`。
    pub fn to_text(&self) -> Option<String> {
        core::str::from_utf8(&self.bytes).ok().map(str::to_owned)
    }

    /// 多项式累加哈希（乘数 31，环绕运算）。
    ///
    /// 该值跨进程稳定，可直接用作线上协议或缓存中的键摘要。
    pub fn stable_hash(&self) -> i64 {
        stable_hash_of(&self.bytes)
    }
}

/// 对任意字节切片计算与 [`KittenBytes::stable_hash`] 相同的哈希，无需先构造 `KittenBytes`。
pub(crate) fn stable_hash_of(bytes: &[u8]) -> i64 {
    bytes.iter().fold(0i64, |hash, byte| {
        hash.wrapping_mul(31).wrapping_add(i64::from(*byte))
    })
}

impl PartialEq for KittenBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for KittenBytes {}

impl Hash for KittenBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.stable_hash());
    }
}

impl Ord for KittenBytes {
    fn cmp(&self, other: &Self) -> Ordering {
        for (left, right) in self.bytes.iter().zip(other.bytes.iter()) {
            match left.cmp(right) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        // 公共前缀完全相同：严格前缀排在前面。
        self.bytes.len().cmp(&other.bytes.len())
    }
}

impl PartialOrd for KittenBytes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for KittenBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KittenBytes")
            .field(&String::from_utf8_lossy(&self.bytes))
            .finish()
    }
}

impl fmt::Display for KittenBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl AsRef<[u8]> for KittenBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&str> for KittenBytes {
    fn from(value: &str) -> Self {
        Self::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for KittenBytes {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for KittenBytes {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for KittenBytes {
    fn from(value: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for KittenBytes {
    fn from(value: Bytes) -> Self {
        Self { bytes: value }
    }
}

/// 能够给出自身规范字节表示的文本类值。
pub trait KittenString {
    fn kitten_bytes(&self) -> KittenBytes;
}

impl KittenString for str {
    fn kitten_bytes(&self) -> KittenBytes {
        KittenBytes::from(self)
    }
}

impl KittenString for String {
    fn kitten_bytes(&self) -> KittenBytes {
        KittenBytes::from(self.as_str())
    }
}

impl KittenString for KittenBytes {
    fn kitten_bytes(&self) -> KittenBytes {
        self.clone()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for KittenBytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.bytes.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for KittenBytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Vec<u8> as serde::Deserialize>::deserialize(deserializer).map(KittenBytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hash_matches_polynomial_accumulation() {
        assert_eq!(KittenBytes::from("").stable_hash(), 0);
        assert_eq!(KittenBytes::from("a").stable_hash(), 97);
        assert_eq!(KittenBytes::from("ab").stable_hash(), 97 * 31 + 98);
    }

    #[test]
    fn strict_prefix_sorts_first() {
        let short = KittenBytes::from("kit");
        let long = KittenBytes::from("kitten");
        let other = KittenBytes::from("kiwi");

        assert!(short < long);
        assert!(long < other);
        assert!(short < other);
        assert_eq!(short.cmp(&short.clone()), Ordering::Equal);
    }

    #[test]
    fn equal_values_collapse_in_hash_sets() {
        let mut set = HashSet::new();
        set.insert(KittenBytes::from("_id"));
        set.insert("_id".kitten_bytes());
        set.insert(String::from("name").kitten_bytes());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalid_utf8_has_no_text_form() {
        let raw = KittenBytes::from(vec![0xff, 0xfe]);
        assert_eq!(raw.to_text(), None);
        assert_eq!(KittenBytes::from("ok").to_text().as_deref(), Some("ok"));
    }
}
