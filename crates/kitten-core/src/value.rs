use core::fmt;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::bytes::KittenBytes;

/// 目标表示可以请求的“形状”。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 以封闭枚举取代“运行时询问目标类型”的做法：源值与目标之间的每一种组合都能在
///   `match` 中被穷举检查，新增形状时编译器会指出所有未处理的分支；
/// - 整数宽度显式区分 8/16/32/64 位与指针宽度（`Int`/`UInt`），窄化阶梯据此逐级尝试。
///
/// ## 契约 (What)
/// - 标量形状之外，`Array`/`Object` 仅用于描述复合值自身的形状，不作为标量转换目标。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    /// 指针宽度的有符号整数。
    Int,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// 指针宽度的无符号整数。
    UInt,
    Double,
    Text,
    Bytes,
    Timestamp,
    Null,
    Array,
    Object,
}

impl Shape {
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Shape::Int8 | Shape::Int16 | Shape::Int32 | Shape::Int64 | Shape::Int
        )
    }

    pub const fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Shape::UInt8 | Shape::UInt16 | Shape::UInt32 | Shape::UInt64 | Shape::UInt
        )
    }

    pub const fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub const fn is_composite(self) -> bool {
        matches!(self, Shape::Array | Shape::Object)
    }

    /// 稳定的小写名称，用于日志与调试输出。
    pub const fn name(self) -> &'static str {
        match self {
            Shape::Bool => "bool",
            Shape::Int8 => "int8",
            Shape::Int16 => "int16",
            Shape::Int32 => "int32",
            Shape::Int64 => "int64",
            Shape::Int => "int",
            Shape::UInt8 => "uint8",
            Shape::UInt16 => "uint16",
            Shape::UInt32 => "uint32",
            Shape::UInt64 => "uint64",
            Shape::UInt => "uint",
            Shape::Double => "double",
            Shape::Text => "text",
            Shape::Bytes => "bytes",
            Shape::Timestamp => "timestamp",
            Shape::Null => "null",
            Shape::Array => "array",
            Shape::Object => "object",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 可参与转换的值：§ 数据模型中列举的有限种类。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 调用方在构建文档时不需要知道目标模型的具体类型，只需把字段值装入 `Value`，
///   再由 [`Convertible`](crate::Convertible) 协议协商出目标表示；
/// - 每个整数变体都保留原始宽度，窄化/放宽由 [`NumericRangeSelector`](crate::NumericRangeSelector)
///   显式完成，避免隐式截断。
///
/// ## 契约 (What)
/// - `Array` 保留元素顺序；`Object` 以 `(键, 值)` 列表保存源迭代顺序，键本身也是 `Value`，
///   转换时再协商为目标键形状；
/// - `Timestamp` 使用 UTC 时间点，文本形式为 RFC 3339。
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int(isize),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt(usize),
    Double(f64),
    Text(String),
    Bytes(KittenBytes),
    Timestamp(DateTime<Utc>),
    Null,
    Array(Vec<Value>),
    Object(Vec<(Value, Value)>),
}

impl Value {
    /// 以任意键值对迭代器构造 `Object`，保留迭代顺序。
    pub fn object<K, V, I>(pairs: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// 以任意元素迭代器构造 `Array`。
    pub fn array<T, I>(items: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Bool(_) => Shape::Bool,
            Value::Int8(_) => Shape::Int8,
            Value::Int16(_) => Shape::Int16,
            Value::Int32(_) => Shape::Int32,
            Value::Int64(_) => Shape::Int64,
            Value::Int(_) => Shape::Int,
            Value::UInt8(_) => Shape::UInt8,
            Value::UInt16(_) => Shape::UInt16,
            Value::UInt32(_) => Shape::UInt32,
            Value::UInt64(_) => Shape::UInt64,
            Value::UInt(_) => Shape::UInt,
            Value::Double(_) => Shape::Double,
            Value::Text(_) => Shape::Text,
            Value::Bytes(_) => Shape::Bytes,
            Value::Timestamp(_) => Shape::Timestamp,
            Value::Null => Shape::Null,
            Value::Array(_) => Shape::Array,
            Value::Object(_) => Shape::Object,
        }
    }

    /// 任意整数变体的精确数值；非整数返回 `None`。
    ///
    /// `i128` 能同时容纳 `i64` 与 `u64` 的全部取值，比较与区间检查因此不会溢出。
    pub fn integer(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::Int(v) => i128::try_from(v).ok(),
            Value::UInt8(v) => Some(i128::from(v)),
            Value::UInt16(v) => Some(i128::from(v)),
            Value::UInt32(v) => Some(i128::from(v)),
            Value::UInt64(v) => Some(i128::from(v)),
            Value::UInt(v) => i128::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&KittenBytes> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `description` 风格的文本化，作为转换的最后兜底。
    ///
    /// 仅标量参与；`Null`、复合值与非 UTF-8 字节串没有文本兜底。
    pub fn describe(&self) -> Option<String> {
        match self {
            Value::Bool(v) => Some(v.to_string()),
            Value::Int8(v) => Some(v.to_string()),
            Value::Int16(v) => Some(v.to_string()),
            Value::Int32(v) => Some(v.to_string()),
            Value::Int64(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::UInt8(v) => Some(v.to_string()),
            Value::UInt16(v) => Some(v.to_string()),
            Value::UInt32(v) => Some(v.to_string()),
            Value::UInt64(v) => Some(v.to_string()),
            Value::UInt(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Text(text) => Some(text.clone()),
            Value::Bytes(bytes) => bytes.to_text(),
            Value::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bytes(bytes) => write!(f, "{bytes}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(pairs) => {
                f.write_str("[")?;
                for (index, (key, value)) in pairs.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("]")
            }
            scalar => match scalar.describe() {
                Some(text) => f.write_str(&text),
                None => f.write_str("<unprintable>"),
            },
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    isize => Int,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    usize => UInt,
    f64 => Double,
    String => Text,
    KittenBytes => Bytes,
    DateTime<Utc> => Timestamp,
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Double(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<SystemTime> for Value {
    fn from(value: SystemTime) -> Self {
        Value::Timestamp(DateTime::<Utc>::from(value))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_follows_variant() {
        assert_eq!(Value::from(7u16).shape(), Shape::UInt16);
        assert_eq!(Value::from("x").shape(), Shape::Text);
        assert_eq!(Value::from(None::<i32>).shape(), Shape::Null);
        assert_eq!(Value::from(vec![1i32, 2]).shape(), Shape::Array);
    }

    #[test]
    fn integers_widen_without_loss() {
        assert_eq!(Value::UInt64(u64::MAX).integer(), Some(i128::from(u64::MAX)));
        assert_eq!(Value::Int8(-128).integer(), Some(-128));
        assert_eq!(Value::Double(1.0).integer(), None);
    }

    #[test]
    fn describe_covers_scalars_only() {
        let ts = DateTime::<Utc>::from_timestamp(0, 0).expect("纪元时间合法");
        assert_eq!(
            Value::Timestamp(ts).describe().as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
        assert_eq!(Value::Bool(true).describe().as_deref(), Some("true"));
        assert_eq!(Value::Null.describe(), None);
        assert_eq!(Value::array([1i32]).describe(), None);
    }

    #[test]
    fn display_renders_composites() {
        let value = Value::object([("a", Value::from(1i32)), ("b", Value::array(["x"]))]);
        assert_eq!(value.to_string(), "[a: 1, b: [x]]");
    }
}
