#![deny(unsafe_code)]
#![doc = r#"
# kitten-core

## 设计动机（Why）
- **定位**：驱动层构建文档时，字段值在编写处并不知道最终落入哪种目标表示；本 crate
  提供一套“源值 → 目标模型”的协商式转换底座。
- **架构角色**：与 `kitten-socket` 平级；传输层只搬运字节，文档编解码层借助本 crate 把
  任意标量、序列与映射转换为线协议需要的形状。
- **设计理念**：源值是封闭的 [`Value`] 枚举，目标形状是封闭的 [`Shape`] 枚举，每一种
  `(源, 目标)` 组合都由 `match` 穷举，不存在运行时类型探测。

## 核心契约（What）
- **失败即缺省**：转换结果一律是 `Option`，无法表示时返回 `None`，不会 panic；
- **逐项丢弃**：对象/序列中无法转换的条目被跳过，不会让整个复合值失败；
- **精确窄化**：[`NumericRangeSelector`] 通过 `TryFrom` 做区间检查，越界值绝不会被某个
  宽度接受；
- **规范字节串**：[`KittenBytes`] 提供逐字节相等、前缀优先的全序与跨进程稳定的哈希。

## 实现策略（How）
- 标量转换按固定顺序派发：形状一致 → 源值专属窄化 → 文本兜底 → 失败；
- 目标模型实现 [`DataType`]，声明原生支持的形状与键形状；源值按各自的优先级列表逐一
  尝试，首个被目标接受的形状胜出；
- [`DocumentModel`] 是随附的参考目标，可直接用于测试或调试输出。

## 风险与考量（Trade-offs）
- 协商每次都重新计算，不做缓存；对热路径而言计算量只是几次整数比较；
- 映射目标不保证保留源迭代顺序（取决于 `DataType::Object` 的实现），序列目标保证保留。
"#]

mod bytes;
mod convert;
mod document;
mod number;
mod value;

pub use bytes::{KittenBytes, KittenString};
pub use convert::{Convertible, DataType, convert_object, convert_sequence, object_values};
pub use document::{Document, DocumentModel};
pub use number::{IntWidth, NumericRangeSelector, SIGNED_PRIORITY, UNSIGNED_PRIORITY};
pub use value::{Shape, Value};
