use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db_error::Result;
use crate::types::{Row, Schema, Value};

/// 一张表的持久化快照：模式加全部行数据
///
/// 行数据是持久化的唯一事实来源；索引另有各自的桶文件，但那些
/// 文件只做参考，加载时索引一律由行数据重建。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub schema: Schema,
    pub rows: BTreeMap<u64, Row>,
}

/// Storage trait
/// 定义持久化层的通用行为
///
/// 表引擎在每次成功变更后同步调用（写穿透），不做批量、不做
/// 预写日志、不保证崩溃原子性。
pub trait Storage: Send {
    /// 写入一张表的快照，覆盖已有内容
    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()>;

    /// 读取一张表的快照，不存在时返回 None
    fn load_table(&self, name: &str) -> Result<Option<TableSnapshot>>;

    /// 删除一张表的快照
    fn delete_table(&mut self, name: &str) -> Result<()>;

    /// 枚举所有已持久化的表名
    fn list_tables(&self) -> Result<Vec<String>>;

    /// 写入一个索引的桶列表（值到行号集合的映射，仅供参考）
    fn save_index(&mut self, table: &str, column: &str, buckets: &[(Value, Vec<u64>)])
        -> Result<()>;

    /// 删除一个索引的桶列表
    fn delete_index(&mut self, table: &str, column: &str) -> Result<()>;

    /// 检查表是否已持久化
    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.load_table(name)?.is_some())
    }
}
