use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db_error::Result;
use crate::errdata;
use crate::types::DataType;

/// 表的模式，指定其数据结构和约束。
///
/// 表在创建后无法更改。没有 ALTER TABLE 也没有 CREATE/DROP INDEX，
/// 只能使用 CREATE TABLE 和 DROP TABLE。
/// 主键列和唯一列各自拥有一个哈希索引，索引在加载时由行数据重建。
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Schema {
    /// 表名,不可为空
    pub name: String,
    /// 列集合,至少一个
    pub columns: Vec<Column>,
    /// 主键列名，最多一个
    pub primary_key: Option<String>,
    /// 唯一列名集合（包含主键列）
    pub unique_columns: BTreeSet<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Column {
    /// 列名 不可为空
    pub name: String,

    /// 列类型
    pub data_type: DataType,

    /// 是否为主键列。主键列隐含非空且唯一。
    pub primary_key: bool,

    /// 是否允许为空
    pub nullable: bool,

    /// 是否该列只允许唯一值（忽略 NULL）。需要索引支持。
    pub unique: bool,
}

impl Schema {
    /// 由解析得到的列定义构建表模式
    ///
    /// 归一化规则：主键列强制非空且唯一；唯一列集合包含主键列。
    pub fn new(name: String, mut columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(errdata!("table {name} must have at least one column"));
        }
        // 1、列名查重
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.clone()) {
                return Err(errdata!("duplicate column {} in table {name}", column.name));
            }
        }
        // 2、主键最多一个，并做约束归一化
        let mut primary_key = None;
        for column in &mut columns {
            if column.primary_key {
                if primary_key.is_some() {
                    return Err(errdata!("table {name} has multiple primary keys"));
                }
                primary_key = Some(column.name.clone());
                column.nullable = false;
                column.unique = true;
            }
        }
        // 3、唯一列集合（含主键）
        let unique_columns = columns
            .iter()
            .filter(|c| c.unique)
            .map(|c| c.name.clone())
            .collect();
        Ok(Self {
            name,
            columns,
            primary_key,
            unique_columns,
        })
    }

    /// 按列名查找列定义
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 需要维护索引的列：主键列和唯一列，按模式中的列序返回
    pub fn indexed_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| self.unique_columns.contains(&c.name))
            .collect()
    }

    /// 索引命名规则：`<table>_<column>_idx`
    pub fn index_name(&self, column: &str) -> String {
        format!("{}_{}_idx", self.name, column)
    }

    /// 索引标签：`<table>_<column>_idx (PRIMARY KEY|UNIQUE)`
    pub fn index_label(&self, column: &Column) -> String {
        let kind = if column.primary_key {
            "PRIMARY KEY"
        } else {
            "UNIQUE"
        };
        format!("{} ({})", self.index_name(&column.name), kind)
    }
}

impl Column {
    /// 一个普通列：可空、无约束
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            nullable: true,
            unique: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(name: &str, data_type: DataType) -> Column {
        Column {
            primary_key: true,
            ..Column::new(name, data_type)
        }
    }

    #[test]
    fn test_schema_normalization() -> Result<()> {
        let schema = Schema::new(
            "users".to_string(),
            vec![
                pk("id", DataType::Integer),
                Column {
                    unique: true,
                    ..Column::new("email", DataType::String)
                },
                Column::new("age", DataType::Integer),
            ],
        )?;
        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        // 主键列被归一化为非空且唯一
        let id = schema.column("id").unwrap();
        assert!(!id.nullable);
        assert!(id.unique);
        assert_eq!(
            schema.unique_columns,
            BTreeSet::from(["id".to_string(), "email".to_string()])
        );
        assert_eq!(
            schema
                .indexed_columns()
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            vec!["id", "email"]
        );
        Ok(())
    }

    #[test]
    fn test_multiple_primary_keys_rejected() {
        let result = Schema::new(
            "t".to_string(),
            vec![pk("a", DataType::Integer), pk("b", DataType::Integer)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = Schema::new(
            "t".to_string(),
            vec![
                Column::new("a", DataType::Integer),
                Column::new("a", DataType::String),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_index_labels() -> Result<()> {
        let schema = Schema::new(
            "users".to_string(),
            vec![
                pk("id", DataType::Integer),
                Column {
                    unique: true,
                    ..Column::new("email", DataType::String)
                },
            ],
        )?;
        assert_eq!(
            schema.index_label(schema.column("id").unwrap()),
            "users_id_idx (PRIMARY KEY)"
        );
        assert_eq!(
            schema.index_label(schema.column("email").unwrap()),
            "users_email_idx (UNIQUE)"
        );
        Ok(())
    }
}
