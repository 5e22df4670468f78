use std::collections::HashMap;

use crate::{
    bytes::{KittenBytes, stable_hash_of},
    convert::DataType,
    value::{Shape, Value},
};

/// 有序文档：键为 [`KittenBytes`]，重复键以后写入者为准但保留首次出现的位置。
///
/// 条目按插入顺序存放，另以键的稳定哈希建立位置索引，`insert`/`get` 均为均摊常数时间，
/// 逐条构建含 `n` 个键的文档为线性代价。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    entries: Vec<(KittenBytes, Value)>,
    index: HashMap<i64, Vec<usize>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 插入或覆盖，返回被覆盖的旧值。
    pub fn insert(&mut self, key: impl Into<KittenBytes>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(position) = self.position(key.as_slice()) {
            return Some(std::mem::replace(&mut self.entries[position].1, value));
        }
        self.index
            .entry(key.stable_hash())
            .or_default()
            .push(self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key.as_bytes())
            .map(|position| &self.entries[position].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key.as_bytes()).is_some()
    }

    fn position(&self, key: &[u8]) -> Option<usize> {
        self.index
            .get(&stable_hash_of(key))?
            .iter()
            .copied()
            .find(|position| self.entries[*position].0.as_slice() == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KittenBytes> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KittenBytes, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}

impl FromIterator<(KittenBytes, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (KittenBytes, Value)>>(iter: I) -> Self {
        let mut document = Document::new();
        for (key, value) in iter {
            document.insert(key, value);
        }
        document
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Object(
            document
                .entries
                .into_iter()
                .map(|(key, value)| (Value::Bytes(key), value))
                .collect(),
        )
    }
}

/// 参考目标模型：按常见 BSON 类文档的能力建模。
///
/// # 契约说明
/// - 原生标量：布尔、32/64 位有符号整数、双精度、文本、字节串、时间戳与 null；
///   其余整数宽度都会经由窄化阶梯落入 `Int32`/`Int64`，放不下时依次退到 `Double`、`Text`；
/// - 键窄化为 `Bytes`，因此文本键可用，数字等其他键会被丢弃；
/// - 对象转换结果为 `Value::Object`（键为 `Value::Bytes`），序列为 `Value::Array`。
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentModel;

const DOCUMENT_SHAPES: [Shape; 8] = [
    Shape::Bool,
    Shape::Int32,
    Shape::Int64,
    Shape::Double,
    Shape::Text,
    Shape::Bytes,
    Shape::Timestamp,
    Shape::Null,
];

impl DataType for DocumentModel {
    type Key = KittenBytes;
    type Value = Value;
    type Object = Document;
    type Sequence = Vec<Value>;

    fn key_shape() -> Shape {
        Shape::Bytes
    }

    fn supported_shapes() -> &'static [Shape] {
        &DOCUMENT_SHAPES
    }

    fn make_key(key: Value) -> Option<KittenBytes> {
        match key {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn make_scalar(value: Value) -> Option<Value> {
        Some(value)
    }

    fn make_object(object: Document) -> Value {
        Value::from(object)
    }

    fn make_sequence(sequence: Vec<Value>) -> Value {
        Value::Array(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_keep_first_position_and_last_value() {
        let document: Document = [
            (KittenBytes::from("a"), Value::Int32(1)),
            (KittenBytes::from("b"), Value::Int32(2)),
            (KittenBytes::from("a"), Value::Int32(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(document.len(), 2);
        assert_eq!(document.get("a"), Some(&Value::Int32(3)));
        let keys: Vec<String> = document.keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn document_becomes_object_value() {
        let mut document = Document::new();
        document.insert("x", 1i32);
        assert_eq!(
            Value::from(document),
            Value::Object(vec![(Value::Bytes(KittenBytes::from("x")), Value::Int32(1))])
        );
    }

    #[test]
    fn colliding_hashes_stay_distinct_keys() {
        // "Aa" 与 "BB" 的多项式哈希相同。
        assert_eq!(
            KittenBytes::from("Aa").stable_hash(),
            KittenBytes::from("BB").stable_hash()
        );
        let mut document = Document::new();
        assert_eq!(document.insert("Aa", 1i32), None);
        assert_eq!(document.insert("BB", 2i32), None);
        assert_eq!(document.insert("Aa", 3i32), Some(Value::Int32(1)));

        assert_eq!(document.len(), 2);
        assert_eq!(document.get("Aa"), Some(&Value::Int32(3)));
        assert_eq!(document.get("BB"), Some(&Value::Int32(2)));
        assert!(!document.contains_key("Ab"));
    }

    #[test]
    fn large_documents_keep_insertion_order() {
        let document: Document = (0..10_000)
            .chain(0..10_000)
            .map(|index| (KittenBytes::from(format!("k{index}")), Value::Int64(index)))
            .collect();

        assert_eq!(document.len(), 10_000);
        assert_eq!(document.get("k9999"), Some(&Value::Int64(9999)));
        assert!(
            document
                .keys()
                .zip(0..)
                .all(|(key, index)| key.as_slice() == format!("k{index}").as_bytes())
        );
    }
}
