use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::db_error::{Error, Result};
use crate::errdata;
use crate::sql::parser::ast::{JoinClause, Projection, Statement, WhereClause};
use crate::sql::parser::Parser;
use crate::sql::table::{project, Table};
use crate::storage::Storage;
use crate::types::{Column, Row, Schema, Value};

/// 一条语句的统一执行结果
///
/// 无论成功失败都以该结构返回给调用方；错误只体现在 `success`
/// 与 `error` 字段上，绝不向外抛出。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// 查询语句的结果行
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    /// 变更语句影响的行数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<usize>,
    /// 人类可读的结果说明
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 失败时的错误文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 语句执行耗时，毫秒
    pub execution_time_ms: f64,
    /// 访问过的行数（查询与连接路径填写）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_scanned: Option<usize>,
    /// 命中的索引名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_used: Option<String>,
}

impl ExecutionResult {
    fn message(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            ..Self::default()
        }
    }

    fn affected(count: usize, message: String) -> Self {
        Self {
            success: true,
            rows_affected: Some(count),
            message: Some(message),
            ..Self::default()
        }
    }

    fn rows(rows: Vec<Row>, rows_scanned: usize, index_used: Option<String>) -> Self {
        Self {
            success: true,
            rows: Some(rows),
            rows_scanned: Some(rows_scanned),
            index_used,
            ..Self::default()
        }
    }

    fn failure(error: Error) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// 数据库上下文：表注册表加持久化句柄
///
/// 显式构造一次、传递给所有调用方，没有环境级单例。执行模型
/// 完全同步：一条语句从解析、校验、变更到落盘跑完才接受下一条，
/// 引擎内部没有锁与事务，多调用方的互斥由宿主保证。
pub struct Database {
    tables: BTreeMap<String, Table>,
    storage: Box<dyn Storage>,
}

impl Database {
    /// 打开数据库：枚举持久化层的所有表快照并重建每张表
    ///
    /// 索引由行数据重建，不从桶文件回读。
    pub fn open(storage: Box<dyn Storage>) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for name in storage.list_tables()? {
            if let Some(snapshot) = storage.load_table(&name)? {
                tables.insert(name, Table::from_snapshot(snapshot));
            }
        }
        info!(tables = tables.len(), "database opened");
        Ok(Self { tables, storage })
    }

    /// 唯一的执行入口，同时也是唯一的错误边界
    ///
    /// 解析和执行过程中抛出的任何错误都被收敛为结构化的失败
    /// 结果；耗时统一在这里计量。
    pub fn execute(&mut self, statement_text: &str) -> ExecutionResult {
        let started = Instant::now();
        let mut result = match self.run(statement_text) {
            Ok(result) => result,
            Err(err) => {
                debug!(statement = statement_text, error = %err, "statement failed");
                ExecutionResult::failure(err)
            }
        };
        result.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        result
    }

    fn run(&mut self, statement_text: &str) -> Result<ExecutionResult> {
        let statement = Parser::new(statement_text).parse()?;
        match statement {
            Statement::CreateTable { name, columns } => self.create_table(name, columns),
            Statement::Insert { table, values } => {
                let (table, storage) = self.table_and_storage(&table)?;
                let count = table.insert(values, storage)?;
                Ok(ExecutionResult::affected(count, "1 row inserted".to_string()))
            }
            Statement::Select {
                table,
                projection,
                join: Some(join),
                r#where,
            } => self.select_join(&table, &projection, &join, r#where.as_ref()),
            Statement::Select {
                table,
                projection,
                join: None,
                r#where,
            } => {
                let table = self.table(&table)?;
                let outcome = table.select(&projection, r#where.as_ref())?;
                Ok(ExecutionResult::rows(
                    outcome.rows,
                    outcome.rows_scanned,
                    outcome.index_used,
                ))
            }
            Statement::Update {
                table,
                set,
                r#where,
            } => {
                let (table, storage) = self.table_and_storage(&table)?;
                let count = table.update(&set, r#where.as_ref(), storage)?;
                Ok(ExecutionResult::affected(
                    count,
                    format!("{count} row(s) updated"),
                ))
            }
            Statement::Delete { table, r#where } => {
                let (table, storage) = self.table_and_storage(&table)?;
                let count = table.delete(r#where.as_ref(), storage)?;
                Ok(ExecutionResult::affected(
                    count,
                    format!("{count} row(s) deleted"),
                ))
            }
            Statement::DropTable { name } => self.drop_table(&name),
        }
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| errdata!("table {name} does not exist"))
    }

    /// 同时借出表和存储句柄，供变更路径写穿透
    fn table_and_storage(&mut self, name: &str) -> Result<(&mut Table, &mut dyn Storage)> {
        match self.tables.get_mut(name) {
            Some(table) => Ok((table, self.storage.as_mut())),
            None => Err(errdata!("table {name} does not exist")),
        }
    }

    fn create_table(&mut self, name: String, columns: Vec<Column>) -> Result<ExecutionResult> {
        if self.tables.contains_key(&name) {
            return Err(errdata!("table {name} already exists"));
        }
        let schema = Schema::new(name.clone(), columns)?;
        let table = Table::new(schema);
        // 建表即落盘，空表也占有自己的快照文件
        table.persist(self.storage.as_mut())?;
        self.tables.insert(name.clone(), table);
        Ok(ExecutionResult::message(format!("table {name} created")))
    }

    fn drop_table(&mut self, name: &str) -> Result<ExecutionResult> {
        let Some(table) = self.tables.remove(name) else {
            return Err(errdata!("table {name} does not exist"));
        };
        // 同时摘除持久化的表快照和全部索引桶文件
        self.storage.delete_table(name)?;
        for column in table.schema().indexed_columns() {
            self.storage.delete_index(name, &column.name)?;
        }
        Ok(ExecutionResult::message(format!("table {name} dropped")))
    }

    /// 等值内连接：左右表全量叉积
    ///
    /// 扫描计数等于 |左| × |右|，不走索引也不做哈希连接。保留的
    /// 行对合并成一行：每列同时以裸名（同名冲突时左表取胜）和
    /// `表.列` 限定名各出现一次；非通配投影在合并之后按键精确
    /// 匹配施加。
    fn select_join(
        &self,
        left_name: &str,
        projection: &Projection,
        join: &JoinClause,
        filter: Option<&WhereClause>,
    ) -> Result<ExecutionResult> {
        let left = self.table(left_name)?;
        let right = self.table(&join.table)?;
        let left_rows = left.get_all_rows();
        let right_rows = right.get_all_rows();
        let rows_scanned = left_rows.len() * right_rows.len();

        let mut rows = Vec::new();
        for left_row in &left_rows {
            for right_row in &right_rows {
                let left_value = left_row.get(&join.left_column).unwrap_or(&Value::Null);
                let right_value = right_row.get(&join.right_column).unwrap_or(&Value::Null);
                if left_value != right_value {
                    continue;
                }
                let merged = merge_rows(left_name, left_row, &join.table, right_row);
                // 单条件过滤对合并行同样生效
                if !filter.map_or(true, |clause| clause.matches(&merged)) {
                    continue;
                }
                rows.push(project(&merged, projection));
            }
        }
        Ok(ExecutionResult::rows(rows, rows_scanned, None))
    }

    /// 已注册的表名集合
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// 按名取表模式
    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        self.tables.get(name).map(|table| table.schema())
    }

    /// 按名取索引标签集合，形如 `users_id_idx (PRIMARY KEY)`
    pub fn get_indexes(&self, name: &str) -> Option<Vec<String>> {
        self.tables.get(name).map(|table| table.index_labels())
    }
}

/// 合并一对连接行：先放右表再放左表，裸名冲突时左表取胜；
/// 两侧的每一列都另以 `表.列` 限定名暴露一次
fn merge_rows(left_table: &str, left_row: &Row, right_table: &str, right_row: &Row) -> Row {
    let mut merged = Row::new();
    for (name, value) in right_row {
        merged.insert(name.clone(), value.clone());
        merged.insert(format!("{right_table}.{name}"), value.clone());
    }
    for (name, value) in left_row {
        merged.insert(name.clone(), value.clone());
        merged.insert(format!("{left_table}.{name}"), value.clone());
    }
    merged
}
