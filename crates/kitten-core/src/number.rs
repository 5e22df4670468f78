//! 整数宽度阶梯与精确区间检查。
//!
//! ## 角色定位（Why）
//! - 文档模型往往只原生支持少数整数宽度（例如 32/64 位有符号），而调用方手里可能是任意宽度的
//!   有符号/无符号整数；本模块负责挑选“最窄且能精确表示”的宽度，并确认往返无损；
//! - 所有区间检查都通过 `TryFrom` 完成，越界值绝不会被某个宽度接受。
//!
//! ## 阶梯顺序（What）
//! - 有符号：8 → 16 → 32 → 64 → 指针宽度，协商中不进入无符号阶梯；
//! - 无符号：8 → 16 → 32 → 64 → 指针宽度，之后再尝试有符号阶梯（无符号值不超过该宽度的
//!   最大值时即可被接受，例如 `u8` 可进入 `i16`）；
//! - 整数阶梯之后依次是 `Double`（仅在精确可表示时）与 `Text`。

use crate::value::{Shape, Value};

/// 整数宽度。`Native` 对应平台指针宽度。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Native,
}

impl IntWidth {
    /// 由窄到宽的尝试顺序。
    pub const LADDER: [IntWidth; 5] = [
        IntWidth::W8,
        IntWidth::W16,
        IntWidth::W32,
        IntWidth::W64,
        IntWidth::Native,
    ];

    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::Native => usize::BITS,
        }
    }

    pub const fn signed_shape(self) -> Shape {
        match self {
            IntWidth::W8 => Shape::Int8,
            IntWidth::W16 => Shape::Int16,
            IntWidth::W32 => Shape::Int32,
            IntWidth::W64 => Shape::Int64,
            IntWidth::Native => Shape::Int,
        }
    }

    pub const fn unsigned_shape(self) -> Shape {
        match self {
            IntWidth::W8 => Shape::UInt8,
            IntWidth::W16 => Shape::UInt16,
            IntWidth::W32 => Shape::UInt32,
            IntWidth::W64 => Shape::UInt64,
            IntWidth::Native => Shape::UInt,
        }
    }

    /// 反查整数形状的宽度；非整数形状返回 `None`。
    pub const fn of_shape(shape: Shape) -> Option<IntWidth> {
        match shape {
            Shape::Int8 | Shape::UInt8 => Some(IntWidth::W8),
            Shape::Int16 | Shape::UInt16 => Some(IntWidth::W16),
            Shape::Int32 | Shape::UInt32 => Some(IntWidth::W32),
            Shape::Int64 | Shape::UInt64 => Some(IntWidth::W64),
            Shape::Int | Shape::UInt => Some(IntWidth::Native),
            _ => None,
        }
    }
}

/// 有符号源值的协商顺序：有符号阶梯 → 浮点 → 文本。
///
/// 协商永远不会把有符号源值放进无符号形状，即便目标模型只支持无符号宽度。
pub const SIGNED_PRIORITY: [Shape; 7] = [
    Shape::Int8,
    Shape::Int16,
    Shape::Int32,
    Shape::Int64,
    Shape::Int,
    Shape::Double,
    Shape::Text,
];

/// 无符号源值的协商顺序：无符号阶梯 → 有符号阶梯 → 浮点 → 文本。
pub const UNSIGNED_PRIORITY: [Shape; 12] = [
    Shape::UInt8,
    Shape::UInt16,
    Shape::UInt32,
    Shape::UInt64,
    Shape::UInt,
    Shape::Int8,
    Shape::Int16,
    Shape::Int32,
    Shape::Int64,
    Shape::Int,
    Shape::Double,
    Shape::Text,
];

/// 2^64：所有整数宽度的绝对值上界（开区间）。
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// 最窄整数宽度选择器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 每次转换调用都重新计算，不做缓存：输入只是一个整数，计算成本远低于缓存查找；
/// - 以 `i128` 作为统一的中间表示，既能容纳 `u64::MAX` 也能容纳 `i64::MIN`。
///
/// ## 契约 (What)
/// - `narrowest_*`：返回阶梯中第一个区间包含该值的宽度；
/// - `represent`：把整数精确放入指定形状，越界或形状不是整数/浮点时返回 `None`；
/// - `round_trips`：确认窄化结果解码后与原值完全相等。
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericRangeSelector;

impl NumericRangeSelector {
    /// 有符号阶梯中第一个能容纳 `value` 的宽度。
    pub fn narrowest_signed(value: i128) -> Option<IntWidth> {
        IntWidth::LADDER
            .into_iter()
            .find(|width| Self::represent(value, width.signed_shape()).is_some())
    }

    /// 无符号阶梯中第一个能容纳 `value` 的宽度；负数没有无符号宽度。
    pub fn narrowest_unsigned(value: i128) -> Option<IntWidth> {
        IntWidth::LADDER
            .into_iter()
            .find(|width| Self::represent(value, width.unsigned_shape()).is_some())
    }

    /// 以最窄的有符号宽度表示 `value`。`i64` 总能落在 64 位以内。
    pub fn narrow_signed(value: i64) -> Value {
        let wide = i128::from(value);
        Self::narrowest_signed(wide)
            .and_then(|width| Self::represent(wide, width.signed_shape()))
            .unwrap_or(Value::Int64(value))
    }

    /// 以最窄的无符号宽度表示 `value`。
    pub fn narrow_unsigned(value: u64) -> Value {
        let wide = i128::from(value);
        Self::narrowest_unsigned(wide)
            .and_then(|width| Self::represent(wide, width.unsigned_shape()))
            .unwrap_or(Value::UInt64(value))
    }

    /// 将整数精确放入 `target`。
    ///
    /// - 整数形状：`TryFrom` 精确区间检查；
    /// - `Double`：仅当转换为 `f64` 后能够无损还原；
    /// - 其他形状：`None`。
    pub fn represent(value: i128, target: Shape) -> Option<Value> {
        match target {
            Shape::Int8 => i8::try_from(value).ok().map(Value::Int8),
            Shape::Int16 => i16::try_from(value).ok().map(Value::Int16),
            Shape::Int32 => i32::try_from(value).ok().map(Value::Int32),
            Shape::Int64 => i64::try_from(value).ok().map(Value::Int64),
            Shape::Int => isize::try_from(value).ok().map(Value::Int),
            Shape::UInt8 => u8::try_from(value).ok().map(Value::UInt8),
            Shape::UInt16 => u16::try_from(value).ok().map(Value::UInt16),
            Shape::UInt32 => u32::try_from(value).ok().map(Value::UInt32),
            Shape::UInt64 => u64::try_from(value).ok().map(Value::UInt64),
            Shape::UInt => usize::try_from(value).ok().map(Value::UInt),
            Shape::Double => {
                let double = value as f64;
                (double.is_finite() && double as i128 == value).then_some(Value::Double(double))
            }
            _ => None,
        }
    }

    /// 浮点到整数：仅接受有限、无小数部分且位于整数宽度范围内的值。
    pub fn represent_double(value: f64, target: Shape) -> Option<Value> {
        if !target.is_integer() {
            return None;
        }
        if !value.is_finite() || value.fract() != 0.0 || value.abs() >= TWO_POW_64 {
            return None;
        }
        Self::represent(value as i128, target)
    }

    /// 窄化结果是否能解码回原值。
    pub fn round_trips(original: i128, narrowed: &Value) -> bool {
        match narrowed {
            Value::Double(double) => double.is_finite() && *double as i128 == original,
            other => other.integer() == Some(original),
        }
    }
}
