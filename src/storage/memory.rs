use std::collections::BTreeMap;

use crate::db_error::Result;
use crate::storage::engine::{Storage, TableSnapshot};
use crate::types::Value;

/// 实现内存持久化引擎
///
/// 与文件引擎行为一致但不落盘，供测试和临时库使用。
#[derive(Default)]
pub struct MemoryStorage {
    tables: BTreeMap<String, TableSnapshot>,
    indexes: BTreeMap<(String, String), Vec<(Value, Vec<u64>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()> {
        self.tables
            .insert(snapshot.schema.name.clone(), snapshot.clone());
        Ok(())
    }

    fn load_table(&self, name: &str) -> Result<Option<TableSnapshot>> {
        Ok(self.tables.get(name).cloned())
    }

    fn delete_table(&mut self, name: &str) -> Result<()> {
        self.tables.remove(name);
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn save_index(
        &mut self,
        table: &str,
        column: &str,
        buckets: &[(Value, Vec<u64>)],
    ) -> Result<()> {
        self.indexes
            .insert((table.to_string(), column.to_string()), buckets.to_vec());
        Ok(())
    }

    fn delete_index(&mut self, table: &str, column: &str) -> Result<()> {
        self.indexes
            .remove(&(table.to_string(), column.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Schema};

    #[test]
    fn test_memory_round_trip() -> Result<()> {
        let mut storage = MemoryStorage::new();
        let schema = Schema::new(
            "t".to_string(),
            vec![Column::new("id", DataType::Integer)],
        )?;
        let snapshot = TableSnapshot {
            schema,
            rows: BTreeMap::new(),
        };
        storage.save_table(&snapshot)?;
        assert!(storage.table_exists("t")?);
        assert_eq!(storage.list_tables()?, vec!["t".to_string()]);
        storage.delete_table("t")?;
        assert!(!storage.table_exists("t")?);
        Ok(())
    }
}
