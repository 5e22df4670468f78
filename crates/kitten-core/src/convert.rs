use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use chrono::{DateTime, Utc};

use crate::{
    bytes::KittenBytes,
    number::{NumericRangeSelector, SIGNED_PRIORITY, UNSIGNED_PRIORITY},
    value::{Shape, Value},
};

/// 文本源值的协商顺序：字节串编码优先，其次按数值形状逐一解析。
const TEXT_PRIORITY: [Shape; 12] = [
    Shape::Bytes,
    Shape::Double,
    Shape::Int,
    Shape::UInt,
    Shape::UInt64,
    Shape::UInt32,
    Shape::UInt16,
    Shape::UInt8,
    Shape::Int64,
    Shape::Int32,
    Shape::Int16,
    Shape::Int8,
];

const DOUBLE_PRIORITY: [Shape; 11] = [
    Shape::Int8,
    Shape::Int16,
    Shape::Int32,
    Shape::Int64,
    Shape::Int,
    Shape::UInt8,
    Shape::UInt16,
    Shape::UInt32,
    Shape::UInt64,
    Shape::UInt,
    Shape::Text,
];

const TIMESTAMP_PRIORITY: [Shape; 7] = [
    Shape::Int8,
    Shape::Int16,
    Shape::Int32,
    Shape::Int64,
    Shape::Int,
    Shape::Double,
    Shape::Text,
];

const BYTES_PRIORITY: [Shape; 1] = [Shape::Text];
const BOOL_PRIORITY: [Shape; 1] = [Shape::Text];

/// 目标文档模型。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 源值在构建时并不知道最终落入哪种文档模型（线协议文档、调试树、配置快照……），
///   目标模型通过本 trait 描述“我能原生存储哪些形状、键长什么样、如何组装对象与序列”；
/// - 协商逻辑集中在 [`Convertible`] 的实现里，目标模型只负责最后一步的装箱。
///
/// ## 契约 (What)
/// - `supported_shapes`：模型原生存储的标量形状，按偏好排序；
/// - `key_shape`：对象键必须窄化到的形状；
/// - `make_key`/`make_scalar`：入参已经是 `key_shape`/受支持形状，返回 `None` 表示拒绝；
/// - `key_from_value`：键无法直接窄化时的最后一步，把已转换为目标值的键再解释为键，默认拒绝；
/// - `make_object`/`make_sequence`：装箱复合值，不会失败。
pub trait DataType {
    type Key: Eq + Hash;
    type Value;
    type Object: FromIterator<(Self::Key, Self::Value)>;
    type Sequence: FromIterator<Self::Value>;

    fn key_shape() -> Shape;

    fn supported_shapes() -> &'static [Shape];

    fn make_key(key: Value) -> Option<Self::Key>;

    fn make_scalar(value: Value) -> Option<Self::Value>;

    fn make_object(object: Self::Object) -> Self::Value;

    fn make_sequence(sequence: Self::Sequence) -> Self::Value;

    fn key_from_value(_value: Self::Value) -> Option<Self::Key> {
        None
    }
}

/// 可以尝试转换为任意目标模型的值。
///
/// 失败以 `None` 表达，绝不会在本层以错误或 panic 的形式逃逸。
pub trait Convertible {
    fn convert<DT: DataType>(&self) -> Option<DT::Value>;
}

impl Value {
    /// 源值专属的窄化：文本编码为字节串/解析为数字、数字在宽度间精确迁移、时间戳转秒数等。
    ///
    /// 不包含“形状已一致”与“文本兜底”两步，二者由 [`Value::convert_scalar`] 负责。
    pub fn narrow_to(&self, target: Shape) -> Option<Value> {
        match self {
            Value::Text(text) => narrow_text(text, target),
            Value::Bytes(bytes) => match target {
                Shape::Text => bytes.to_text().map(Value::Text),
                _ => None,
            },
            Value::Double(double) => NumericRangeSelector::represent_double(*double, target),
            Value::Timestamp(ts) => narrow_timestamp(ts, target),
            Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
            integer => integer
                .integer()
                .and_then(|wide| NumericRangeSelector::represent(wide, target)),
        }
    }

    /// 面向单一目标形状的标量转换。
    ///
    /// 派发顺序固定：
    /// 1. 形状已一致，原样返回；
    /// 2. 源值专属窄化（[`Value::narrow_to`]）；
    /// 3. 目标为 `Text` 时的 `description` 兜底；
    /// 4. 否则失败。
    pub fn convert_scalar(&self, target: Shape) -> Option<Value> {
        if self.shape() == target {
            return Some(self.clone());
        }
        if let Some(narrowed) = self.narrow_to(target) {
            return Some(narrowed);
        }
        if target == Shape::Text {
            return self.describe().map(Value::Text);
        }
        None
    }

    /// 该源值在协商时依次尝试的目标形状。
    pub fn negotiation_order(&self) -> &'static [Shape] {
        match self {
            Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) | Value::Int(_) => {
                &SIGNED_PRIORITY
            }
            Value::UInt8(_)
            | Value::UInt16(_)
            | Value::UInt32(_)
            | Value::UInt64(_)
            | Value::UInt(_) => &UNSIGNED_PRIORITY,
            Value::Double(_) => &DOUBLE_PRIORITY,
            Value::Text(_) => &TEXT_PRIORITY,
            Value::Bytes(_) => &BYTES_PRIORITY,
            Value::Timestamp(_) => &TIMESTAMP_PRIORITY,
            Value::Bool(_) => &BOOL_PRIORITY,
            Value::Null | Value::Array(_) | Value::Object(_) => &[],
        }
    }
}

fn narrow_text(text: &str, target: Shape) -> Option<Value> {
    match target {
        Shape::Bytes => Some(Value::Bytes(KittenBytes::from(text))),
        Shape::Double => text.parse().ok().map(Value::Double),
        Shape::Int8 => text.parse().ok().map(Value::Int8),
        Shape::Int16 => text.parse().ok().map(Value::Int16),
        Shape::Int32 => text.parse().ok().map(Value::Int32),
        Shape::Int64 => text.parse().ok().map(Value::Int64),
        Shape::Int => text.parse().ok().map(Value::Int),
        Shape::UInt8 => text.parse().ok().map(Value::UInt8),
        Shape::UInt16 => text.parse().ok().map(Value::UInt16),
        Shape::UInt32 => text.parse().ok().map(Value::UInt32),
        Shape::UInt64 => text.parse().ok().map(Value::UInt64),
        Shape::UInt => text.parse().ok().map(Value::UInt),
        _ => None,
    }
}

fn narrow_timestamp(ts: &DateTime<Utc>, target: Shape) -> Option<Value> {
    match target {
        Shape::Double => {
            let seconds = ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9;
            Some(Value::Double(seconds))
        }
        // 与源模型一致：时间戳只进入有符号阶梯，按整秒计。
        shape if shape.is_signed_integer() => {
            NumericRangeSelector::represent(i128::from(ts.timestamp()), shape)
        }
        _ => None,
    }
}

/// 在目标模型支持的形状中协商出一个标量表示。
fn negotiate_scalar<DT: DataType>(value: &Value) -> Option<DT::Value> {
    let supported = DT::supported_shapes();
    if supported.contains(&value.shape()) {
        return DT::make_scalar(value.clone());
    }
    value
        .negotiation_order()
        .iter()
        .filter(|shape| supported.contains(*shape))
        .find_map(|shape| value.convert_scalar(*shape))
        .and_then(DT::make_scalar)
}

/// 键的三段式转换：形状已一致 → 标量窄化 → 通用转换后再解释为键。
fn convert_key<DT: DataType>(key: &Value) -> Option<DT::Key> {
    let shape = DT::key_shape();
    if key.shape() == shape {
        return DT::make_key(key.clone());
    }
    if let Some(narrowed) = key.convert_scalar(shape) {
        return DT::make_key(narrowed);
    }
    key.convert::<DT>().and_then(DT::key_from_value)
}

/// 逐对转换对象；键或值无法转换的条目被静默丢弃，不影响其余条目。
pub fn convert_object<'a, DT, K, V, I>(pairs: I) -> DT::Object
where
    DT: DataType,
    K: Borrow<Value>,
    V: Convertible + 'a,
    I: IntoIterator<Item = (K, &'a V)>,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| {
            let key = convert_key::<DT>(key.borrow())?;
            let value = value.convert::<DT>()?;
            Some((key, value))
        })
        .collect()
}

/// 逐个转换序列元素；失败的元素被丢弃，其余元素保持原有顺序。
pub fn convert_sequence<'a, DT, T, I>(items: I) -> DT::Sequence
where
    DT: DataType,
    T: Convertible + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .filter_map(|item| item.convert::<DT>())
        .collect()
}

/// 丢弃键，仅把对象的值转换为目标序列。
pub fn object_values<DT: DataType>(pairs: &[(Value, Value)]) -> DT::Sequence {
    convert_sequence::<DT, _, _>(pairs.iter().map(|(_, value)| value))
}

impl Convertible for Value {
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        match self {
            Value::Array(items) => Some(DT::make_sequence(convert_sequence::<DT, _, _>(items))),
            Value::Object(pairs) => Some(DT::make_object(convert_object::<DT, _, _, _>(
                pairs.iter().map(|(key, value)| (key, value)),
            ))),
            scalar => negotiate_scalar::<DT>(scalar),
        }
    }
}

macro_rules! convertible_via_value {
    ($($source:ty),* $(,)?) => {
        $(
            impl Convertible for $source {
                fn convert<DT: DataType>(&self) -> Option<DT::Value> {
                    Value::from(self.clone()).convert::<DT>()
                }
            }
        )*
    };
}

convertible_via_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    KittenBytes,
    DateTime<Utc>,
);

impl Convertible for str {
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        Value::from(self).convert::<DT>()
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        match self {
            Some(value) => value.convert::<DT>(),
            None => Value::Null.convert::<DT>(),
        }
    }
}

impl<T: Convertible> Convertible for [T] {
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        Some(DT::make_sequence(convert_sequence::<DT, _, _>(self)))
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        self.as_slice().convert::<DT>()
    }
}

impl<K, V, S> Convertible for HashMap<K, V, S>
where
    K: Clone + Into<Value>,
    V: Convertible,
    S: BuildHasher,
{
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        Some(DT::make_object(convert_object::<DT, _, _, _>(
            self.iter().map(|(key, value)| (Into::<Value>::into(key.clone()), value)),
        )))
    }
}

impl<K, V> Convertible for BTreeMap<K, V>
where
    K: Clone + Into<Value>,
    V: Convertible,
{
    fn convert<DT: DataType>(&self) -> Option<DT::Value> {
        Some(DT::make_object(convert_object::<DT, _, _, _>(
            self.iter().map(|(key, value)| (Into::<Value>::into(key.clone()), value)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_scalar_prefers_same_shape() {
        let value = Value::from("007");
        assert_eq!(value.convert_scalar(Shape::Text), Some(value.clone()));
        assert_eq!(value.convert_scalar(Shape::Int8), Some(Value::Int8(7)));
    }

    #[test]
    fn unsigned_values_enter_signed_widths_when_they_fit() {
        assert_eq!(
            Value::UInt8(200).convert_scalar(Shape::Int16),
            Some(Value::Int16(200))
        );
        assert_eq!(Value::UInt8(200).convert_scalar(Shape::Int8), None);
        assert_eq!(Value::Int8(-1).convert_scalar(Shape::UInt64), None);
    }

    #[test]
    fn text_fallback_only_for_text_targets() {
        assert_eq!(
            Value::Bool(true).convert_scalar(Shape::Text),
            Some(Value::from("true"))
        );
        assert_eq!(Value::Bool(true).convert_scalar(Shape::Int8), None);
        assert_eq!(Value::Null.convert_scalar(Shape::Text), None);
    }

    #[test]
    fn composites_have_no_scalar_negotiation() {
        assert!(Value::array([1i32]).negotiation_order().is_empty());
        assert_eq!(Value::array([1i32]).convert_scalar(Shape::Text), None);
    }
}
