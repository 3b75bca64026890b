//! # SQL 基础类型与值表示模块
//!
//! 本模块提供引擎层面的**原始数据类型**与**值表示**，供解析、表引擎与
//! 执行阶段复用。
//!
//! ## 主要组成
//! - `DataType`：受限的原始 SQL 类型枚举（`Boolean`/`Integer`/`Float`/`String`）。
//!   实现 `Display` 以标准 SQL 大写形式输出（如 `INTEGER`）。
//! - `Value`：SQL 值的统一承载（`Null`/`Boolean(bool)`/`Integer(i64)`/
//!   `Float(f64)`/`String(String)`）。
//!   - **宽松等价语义**：`Integer` 与 `Float` 按数值等价比较与哈希
//!     （`-0.0` 归一为正号，保证索引桶查找的一致性）；
//!     `Null` 仅与 `Null` 等价；其余按变体严格比较。
//!   - **比较语义**：`compare()` 仅对同为数值、同为字符串、同为布尔的
//!     组合给出全序；`Null` 或跨类别组合不可比（返回 `None`）。
//!   - **序列化规则**：serde 采用 untagged 表示，JSON 形态即原生的
//!     null/bool/number/string，与持久化文件格式一致。
//! - `Row`：一行数据，列名到值的有序映射。
//!
//! ## 备注
//! - 本模块**不**实现 SQL 三值逻辑；`NULL` 参与的比较在谓词求值时
//!   直接判否。
//! - 词法层不会产生 `NaN`/`Infinity`，浮点哈希按位处理即可。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// 原始的 SQL 数据类型。为简化实现，仅支持少量标量类型（不支持复合类型）。
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 布尔类型：true/false
    Boolean,
    /// 64bit有符号整形
    Integer,
    /// 浮点类型
    Float,
    /// UTF-8编码的字符串
    String,
}

/// 实现格式化打印
impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::String => write!(f, "STRING"),
        }
    }
}

impl DataType {
    /// 类型检查：判断一个值是否能落入该类型的列
    ///
    /// - `Null` 总是通过类型检查（是否允许为空由列的约束决定）
    /// - `INTEGER` 列接受任意整值数字（含小数部分为零的浮点）
    /// - `FLOAT` 列接受任意数字
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Boolean(_) => *self == DataType::Boolean,
            Value::Integer(_) => matches!(self, DataType::Integer | DataType::Float),
            Value::Float(f) => match self {
                DataType::Float => true,
                DataType::Integer => f.fract() == 0.0,
                _ => false,
            },
            Value::String(_) => *self == DataType::String,
        }
    }
}

/// 一行数据：列名到值的有序映射
pub type Row = BTreeMap<String, Value>;

/// SQL 值
///
/// serde 采用 untagged 表示，变体按反序列化尝试顺序排列：
/// 整值数字先命中 `Integer`，带小数的才落入 `Float`。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// 浮点数的规范化位表示：-0.0 与 -NaN 归一为正号
fn float_bits(f: f64) -> u64 {
    let f = if f == 0.0 {
        0.0
    } else if f.is_nan() {
        f64::NAN
    } else {
        f
    };
    f.to_bits()
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 返回值对应的数据类型；`Null` 无类型，返回 `None`
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
        }
    }

    /// 宽松比较：仅同类别（数值/字符串/布尔）给出全序
    ///
    /// `Null` 或跨类别组合不可比，谓词求值时按不匹配处理。
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// 宽松等价：数值按数值等价，Null 仅等价于 Null
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => {
                float_bits(*a as f64) == float_bits(*b)
            }
            (Float(a), Float(b)) => float_bits(*a) == float_bits(*b),
            (String(a), String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// 哈希语义与宽松等价保持一致：
/// `Integer(1)` 与 `Float(1.0)` 必须落入同一个索引桶
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // 数值统一用同一个标记字节加规范化位表示
            Value::Integer(i) => {
                2u8.hash(state);
                float_bits(*i as f64).hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                float_bits(*f).hash(state);
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// 以接近 SQL 的字面量展示
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
