use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::types::{Column, Row, Value};

/// 一条解析完成的语句，六种变体各自只携带与之相关的字段
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// 建表语句
    /// - name: 表名
    /// - columns: 列定义（表级 PRIMARY KEY 约束已折叠进对应列的标记）
    CreateTable { name: String, columns: Vec<Column> },

    /// 插入语句
    /// - table: 表名
    /// - values: 按列序排列的字面量，个数由执行器校验
    Insert { table: String, values: Vec<Value> },

    /// 查询语句
    /// - table: 来源表
    /// - projection: 投影列（通配或列名集合）
    /// - join: 可选的单个内连接
    /// - r#where: 可选的单条件过滤
    Select {
        table: String,
        projection: Projection,
        join: Option<JoinClause>,
        r#where: Option<WhereClause>,
    },

    /// 更新语句
    /// - table: 表名
    /// - set: 待更新的列和字面量
    /// - r#where: 可选的单条件过滤
    Update {
        table: String,
        set: BTreeMap<String, Value>,
        r#where: Option<WhereClause>,
    },

    /// 从指定表里删除数据
    Delete {
        table: String,
        r#where: Option<WhereClause>,
    },

    /// 删除表语句
    DropTable { name: String },
}

/// 查询投影：通配符或列名集合（列名已剥离 `table.` 限定前缀）
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

/// 比较运算符，固定的六种
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterThan => ">",
            CompareOp::LessThan => "<",
            CompareOp::GreaterThanOrEqual => ">=",
            CompareOp::LessThanOrEqual => "<=",
        })
    }
}

/// 单条件过滤：一组 (列, 运算符, 字面量)，不支持 AND/OR 组合
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub operator: CompareOp,
    pub value: Value,
}

impl WhereClause {
    /// 对一行数据求值
    ///
    /// 等值与不等按宽松等价判断；序关系比较对 `Null` 或跨类别
    /// 组合一律判否。
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(&self.column).unwrap_or(&Value::Null);
        match self.operator {
            CompareOp::Equal => value == &self.value,
            CompareOp::NotEqual => value != &self.value,
            CompareOp::GreaterThan => value.compare(&self.value) == Some(Ordering::Greater),
            CompareOp::LessThan => value.compare(&self.value) == Some(Ordering::Less),
            CompareOp::GreaterThanOrEqual => matches!(
                value.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::LessThanOrEqual => matches!(
                value.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// 内连接：右表名加一组等值列对，只支持等值内连接
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// 右表名
    pub table: String,
    /// 左表参与等值比较的列
    pub left_column: String,
    /// 右表参与等值比较的列
    pub right_column: String,
}
