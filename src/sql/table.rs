use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::db_error::Result;
use crate::errdata;
use crate::sql::parser::ast::{CompareOp, Projection, WhereClause};
use crate::storage::{Storage, TableSnapshot};
use crate::types::{Row, Schema, Value};

/// 哈希索引：值到行号列表的映射
///
/// 主键列和唯一列各有一个。`Null` 值不入桶（唯一性约束忽略 NULL）。
pub struct Index {
    /// 索引名：`<table>_<column>_idx`
    name: String,
    /// 被索引的列
    column: String,
    /// 桶：一个值对应持有该值的行号有序列表
    buckets: HashMap<Value, Vec<u64>>,
}

impl Index {
    fn new(name: String, column: String) -> Self {
        Self {
            name,
            column,
            buckets: HashMap::new(),
        }
    }

    fn add(&mut self, value: &Value, id: u64) {
        if value.is_null() {
            return;
        }
        self.buckets.entry(value.clone()).or_default().push(id);
    }

    /// 从桶里摘除一个行号，桶空即删
    fn remove(&mut self, value: &Value, id: u64) {
        if value.is_null() {
            return;
        }
        if let Some(bucket) = self.buckets.get_mut(value) {
            bucket.retain(|&entry| entry != id);
            if bucket.is_empty() {
                self.buckets.remove(value);
            }
        }
    }

    fn lookup(&self, value: &Value) -> &[u64] {
        self.buckets.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 导出桶列表用于持久化（落盘内容仅供参考，加载时不回读）
    fn bucket_list(&self) -> Vec<(Value, Vec<u64>)> {
        self.buckets
            .iter()
            .map(|(value, ids)| (value.clone(), ids.clone()))
            .collect()
    }
}

/// 查询结果与扫描统计
#[derive(Debug)]
pub struct SelectOutcome {
    pub rows: Vec<Row>,
    /// 访问过的行数：索引路径为桶大小，扫描路径为全表行数
    pub rows_scanned: usize,
    /// 命中的索引名
    pub index_used: Option<String>,
}

/// 一张表：模式、行存储与索引集合
///
/// 行号稳定且单调递增，与物理位置无关，删除不会移动幸存行，
/// 因此桶里的行号永远指向正确的行。每次成功变更后同步写穿透
/// 到持久化层。
pub struct Table {
    schema: Schema,
    rows: BTreeMap<u64, Row>,
    next_id: u64,
    indexes: Vec<Index>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        let indexes = schema
            .indexed_columns()
            .iter()
            .map(|c| Index::new(schema.index_name(&c.name), c.name.clone()))
            .collect();
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: 0,
            indexes,
        }
    }

    /// 从持久化快照重建
    ///
    /// 索引一律由行数据重建，绝不信任落盘的桶文件；下一个行号
    /// 取现存最大行号加一。
    pub fn from_snapshot(snapshot: TableSnapshot) -> Self {
        let mut table = Self::new(snapshot.schema);
        table.next_id = snapshot.rows.keys().next_back().map_or(0, |id| id + 1);
        for (id, row) in &snapshot.rows {
            for index in &mut table.indexes {
                let value = row.get(&index.column).unwrap_or(&Value::Null);
                index.add(value, *id);
            }
        }
        table.rows = snapshot.rows;
        table
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 索引标签集合，形如 `users_id_idx (PRIMARY KEY)`
    pub fn index_labels(&self) -> Vec<String> {
        self.schema
            .indexed_columns()
            .iter()
            .map(|c| self.schema.index_label(c))
            .collect()
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            schema: self.schema.clone(),
            rows: self.rows.clone(),
        }
    }

    /// 全量落盘：表快照加所有索引桶
    pub fn persist(&self, storage: &mut dyn Storage) -> Result<()> {
        storage.save_table(&self.snapshot())?;
        for index in &self.indexes {
            storage.save_index(&self.schema.name, &index.column, &index.bucket_list())?;
        }
        Ok(())
    }

    fn index_for(&self, column: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.column == column)
    }

    /// WHERE 引用的列必须在模式里
    fn check_filter(&self, filter: Option<&WhereClause>) -> Result<()> {
        if let Some(clause) = filter {
            if self.schema.column(&clause.column).is_none() {
                return Err(errdata!(
                    "unknown column {} in where clause",
                    clause.column
                ));
            }
        }
        Ok(())
    }

    /// 插入一行
    ///
    /// 校验顺序：列数 → 按模式列序逐列做非空与类型检查 → 主键与
    /// 唯一列经索引桶查重（代价是桶大小而非全表）。任一失败都发生
    /// 在任何变更之前，表保持原样。
    pub fn insert(&mut self, values: Vec<Value>, storage: &mut dyn Storage) -> Result<usize> {
        // 1、列数必须与模式一致
        if values.len() != self.schema.columns.len() {
            return Err(errdata!(
                "table {} expects {} values, got {}",
                self.schema.name,
                self.schema.columns.len(),
                values.len()
            ));
        }
        // 2、按模式列序组行并逐列校验
        let mut row = Row::new();
        for (column, value) in self.schema.columns.iter().zip(values) {
            if value.is_null() && !column.nullable {
                return Err(errdata!("column {} cannot be null", column.name));
            }
            if !column.data_type.matches(&value) {
                return Err(errdata!(
                    "invalid value {value} for column {} ({})",
                    column.name,
                    column.data_type
                ));
            }
            row.insert(column.name.clone(), value);
        }
        // 3、查重
        for index in &self.indexes {
            let value = row.get(&index.column).unwrap_or(&Value::Null);
            if !value.is_null() && !index.lookup(value).is_empty() {
                let kind = if self.schema.primary_key.as_deref() == Some(index.column.as_str()) {
                    "primary key"
                } else {
                    "unique"
                };
                return Err(errdata!(
                    "duplicate value {value} for {kind} column {}",
                    index.column
                ));
            }
        }
        // 4、提交：行落在下一个顺序行号上，索引随行更新，写穿透落盘
        let id = self.next_id;
        self.next_id += 1;
        for index in &mut self.indexes {
            let value = row.get(&index.column).unwrap_or(&Value::Null);
            index.add(value, id);
        }
        self.rows.insert(id, row);
        self.persist(storage)?;
        debug!(table = %self.schema.name, id, "row inserted");
        Ok(1)
    }

    /// 查询
    ///
    /// 等值条件落在被索引列上走索引路径：直接取桶，扫描计数等于
    /// 桶大小。其余谓词（非等值，或等值但列无索引）走全表线性扫描。
    /// 投影在过滤之后按键精确匹配施加。
    pub fn select(
        &self,
        projection: &Projection,
        filter: Option<&WhereClause>,
    ) -> Result<SelectOutcome> {
        self.check_filter(filter)?;
        // NULL 字面量不入桶，等值找 NULL 的谓词只能走扫描
        let (rows, rows_scanned, index_used) = match filter {
            Some(clause) if clause.operator == CompareOp::Equal && !clause.value.is_null() => {
                match self.index_for(&clause.column) {
                    Some(index) => {
                        let ids = index.lookup(&clause.value);
                        let rows = ids
                            .iter()
                            .filter_map(|id| self.rows.get(id).cloned())
                            .collect();
                        (rows, ids.len(), Some(index.name.clone()))
                    }
                    None => self.scan(filter),
                }
            }
            _ => self.scan(filter),
        };
        let rows = rows.iter().map(|row| project(row, projection)).collect();
        Ok(SelectOutcome {
            rows,
            rows_scanned,
            index_used,
        })
    }

    /// 全表线性扫描，无论是否命中，每访问一行计数加一
    fn scan(&self, filter: Option<&WhereClause>) -> (Vec<Row>, usize, Option<String>) {
        let mut rows = Vec::new();
        let mut scanned = 0;
        for row in self.rows.values() {
            scanned += 1;
            if filter.map_or(true, |clause| clause.matches(row)) {
                rows.push(row.clone());
            }
        }
        (rows, scanned, None)
    }

    /// 更新匹配行，永远全表扫描（无索引收窄路径）
    ///
    /// SET 子句先对模式整体做前置校验（未知列、类型不符、非空），
    /// 因此校验失败的语句零净效应。变更列的桶维护：旧值出桶（空桶
    /// 即删），新值入桶。有任何行变更则整体落盘一次。
    pub fn update(
        &mut self,
        set: &BTreeMap<String, Value>,
        filter: Option<&WhereClause>,
        storage: &mut dyn Storage,
    ) -> Result<usize> {
        // 1、SET 子句前置校验
        for (name, value) in set {
            let Some(column) = self.schema.column(name) else {
                return Err(errdata!("unknown column {name} in set clause"));
            };
            if value.is_null() && !column.nullable {
                return Err(errdata!("column {name} cannot be null"));
            }
            if !column.data_type.matches(value) {
                return Err(errdata!(
                    "invalid value {value} for column {name} ({})",
                    column.data_type
                ));
            }
        }
        self.check_filter(filter)?;
        // 2、扫描并逐行套用变更
        let mut updated = 0;
        let ids: Vec<u64> = self.rows.keys().copied().collect();
        for id in ids {
            let Some(row) = self.rows.get_mut(&id) else {
                continue;
            };
            if !filter.map_or(true, |clause| clause.matches(row)) {
                continue;
            }
            for (name, value) in set {
                let old = row.insert(name.clone(), value.clone()).unwrap_or(Value::Null);
                if &old != value {
                    if let Some(index) = self.indexes.iter_mut().find(|i| i.column == *name) {
                        index.remove(&old, id);
                        index.add(value, id);
                    }
                }
            }
            updated += 1;
        }
        // 3、有行变更则落盘一次
        if updated > 0 {
            self.persist(storage)?;
            debug!(table = %self.schema.name, updated, "rows updated");
        }
        Ok(updated)
    }

    /// 删除匹配行
    ///
    /// 全表扫描收集匹配行号后逐个摘除；行号稳定，删除不会移动
    /// 幸存行。被删行的桶条目与插入对称地清理。
    pub fn delete(
        &mut self,
        filter: Option<&WhereClause>,
        storage: &mut dyn Storage,
    ) -> Result<usize> {
        self.check_filter(filter)?;
        // 1、收集匹配行号
        let matched: Vec<u64> = self
            .rows
            .iter()
            .filter(|(_, row)| filter.map_or(true, |clause| clause.matches(row)))
            .map(|(id, _)| *id)
            .collect();
        // 2、摘除行并清理桶
        for id in &matched {
            if let Some(row) = self.rows.remove(id) {
                for index in &mut self.indexes {
                    let value = row.get(&index.column).unwrap_or(&Value::Null);
                    index.remove(value, *id);
                }
            }
        }
        if !matched.is_empty() {
            self.persist(storage)?;
            debug!(table = %self.schema.name, deleted = matched.len(), "rows deleted");
        }
        Ok(matched.len())
    }

    /// 返回全部行的防御性拷贝，按行号顺序；只有连接路径使用
    pub fn get_all_rows(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }
}

/// 投影：通配返回整行，列名集合按键精确匹配挑选（缺失的键跳过）
pub(crate) fn project(row: &Row, projection: &Projection) -> Row {
    match projection {
        Projection::All => row.clone(),
        Projection::Columns(columns) => columns
            .iter()
            .filter_map(|name| row.get(name).map(|value| (name.clone(), value.clone())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{Column, DataType};

    fn users_table() -> Table {
        let schema = Schema::new(
            "users".to_string(),
            vec![
                Column {
                    primary_key: true,
                    ..Column::new("id", DataType::Integer)
                },
                Column {
                    nullable: false,
                    ..Column::new("name", DataType::String)
                },
                Column::new("age", DataType::Integer),
            ],
        )
        .unwrap();
        Table::new(schema)
    }

    fn seed(table: &mut Table, storage: &mut MemoryStorage) {
        table
            .insert(
                vec![Value::Integer(1), Value::from("alice"), Value::Integer(30)],
                storage,
            )
            .unwrap();
        table
            .insert(
                vec![Value::Integer(2), Value::from("bob"), Value::Null],
                storage,
            )
            .unwrap();
    }

    fn eq(column: &str, value: Value) -> WhereClause {
        WhereClause {
            column: column.to_string(),
            operator: CompareOp::Equal,
            value,
        }
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        let result = table.insert(vec![Value::Integer(1)], &mut storage);
        assert!(result.is_err());
        assert_eq!(table.row_count(), 0);
    }

    /// 类型不符的插入失败且表保持原样
    #[test]
    fn test_insert_type_rejected() {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        let result = table.insert(
            vec![Value::from("oops"), Value::from("alice"), Value::Null],
            &mut storage,
        );
        assert!(result.is_err());
        assert_eq!(table.row_count(), 0);
        // 整值浮点可以落入 INTEGER 列
        table
            .insert(
                vec![Value::Float(3.0), Value::from("carol"), Value::Null],
                &mut storage,
            )
            .unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_insert_not_null_violation() {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        let result = table.insert(
            vec![Value::Integer(1), Value::Null, Value::Null],
            &mut storage,
        );
        assert!(result.is_err());
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_duplicate_primary_key() {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);
        let result = table.insert(
            vec![Value::Integer(1), Value::from("mallory"), Value::Null],
            &mut storage,
        );
        assert!(result.is_err());
        assert_eq!(table.row_count(), 2);
    }

    /// 等值条件走索引：扫描数为桶大小；非索引列走全扫描
    #[test]
    fn test_select_index_vs_scan() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);

        let by_index = table.select(&Projection::All, Some(&eq("id", Value::Integer(1))))?;
        assert_eq!(by_index.rows.len(), 1);
        assert_eq!(by_index.rows_scanned, 1);
        assert_eq!(by_index.index_used.as_deref(), Some("users_id_idx"));

        let by_scan = table.select(&Projection::All, Some(&eq("age", Value::Integer(30))))?;
        assert_eq!(by_scan.rows.len(), 1);
        assert_eq!(by_scan.rows_scanned, 2);
        assert_eq!(by_scan.index_used, None);

        // 两条路径返回的行内容一致
        assert_eq!(by_index.rows[0].get("name"), by_scan.rows[0].get("name"));
        Ok(())
    }

    #[test]
    fn test_select_projection() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);
        let outcome = table.select(
            &Projection::Columns(vec!["name".to_string()]),
            Some(&eq("id", Value::Integer(2))),
        )?;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].len(), 1);
        assert_eq!(outcome.rows[0].get("name"), Some(&Value::from("bob")));
        Ok(())
    }

    #[test]
    fn test_select_unknown_where_column() {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);
        let result = table.select(&Projection::All, Some(&eq("nope", Value::Integer(1))));
        assert!(result.is_err());
    }

    /// 更新后索引桶随变更列同步维护
    #[test]
    fn test_update_maintains_indexes() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);

        let set = BTreeMap::from([("id".to_string(), Value::Integer(9))]);
        let updated = table.update(&set, Some(&eq("id", Value::Integer(1))), &mut storage)?;
        assert_eq!(updated, 1);

        // 旧值出桶，新值入桶
        let old = table.select(&Projection::All, Some(&eq("id", Value::Integer(1))))?;
        assert!(old.rows.is_empty());
        assert_eq!(old.rows_scanned, 0);
        let new = table.select(&Projection::All, Some(&eq("id", Value::Integer(9))))?;
        assert_eq!(new.rows.len(), 1);
        Ok(())
    }

    /// SET 子句校验失败的更新零净效应
    #[test]
    fn test_update_validation_zero_effect() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);

        let bad_type = BTreeMap::from([("age".to_string(), Value::from("old"))]);
        assert!(table.update(&bad_type, None, &mut storage).is_err());
        let unknown = BTreeMap::from([("nope".to_string(), Value::Integer(1))]);
        assert!(table.update(&unknown, None, &mut storage).is_err());

        let outcome = table.select(&Projection::All, None)?;
        assert_eq!(outcome.rows[0].get("age"), Some(&Value::Integer(30)));
        Ok(())
    }

    /// 删除释放的主键值可以再次插入；行号不会复用已分配过的
    #[test]
    fn test_delete_then_reinsert() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);

        let deleted = table.delete(Some(&eq("id", Value::Integer(1))), &mut storage)?;
        assert_eq!(deleted, 1);
        assert_eq!(table.row_count(), 1);

        table.insert(
            vec![Value::Integer(1), Value::from("alice2"), Value::Null],
            &mut storage,
        )?;
        let outcome = table.select(&Projection::All, Some(&eq("id", Value::Integer(1))))?;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].get("name"), Some(&Value::from("alice2")));
        Ok(())
    }

    /// 从快照重建后索引可用，且新行号接在最大行号之后
    #[test]
    fn test_from_snapshot_rebuilds_indexes() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let mut table = users_table();
        seed(&mut table, &mut storage);

        let snapshot = storage.load_table("users")?.unwrap();
        let rebuilt = Table::from_snapshot(snapshot);
        assert_eq!(rebuilt.row_count(), 2);
        let outcome = rebuilt.select(&Projection::All, Some(&eq("id", Value::Integer(2))))?;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.index_used.as_deref(), Some("users_id_idx"));
        Ok(())
    }

    #[test]
    fn test_index_labels() {
        let table = users_table();
        assert_eq!(table.index_labels(), vec!["users_id_idx (PRIMARY KEY)"]);
    }
}
