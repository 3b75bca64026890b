use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::db_error::{Error, Result};
use crate::storage::engine::{Storage, TableSnapshot};
use crate::types::Value;

/// 表快照文件的固定后缀
const TABLE_SUFFIX: &str = ".table.json";
/// 索引桶文件的固定后缀
const INDEX_SUFFIX: &str = ".idx.json";
/// 索引文件所在的子目录
const INDEX_DIR: &str = "indexes";
/// 数据目录锁文件
const LOCK_FILE: &str = "LOCK";

/// 文件持久化引擎
///
/// 目录布局：
/// - `<dir>/<table>.table.json` 每表一个快照（模式 + 行数据）
/// - `<dir>/indexes/<table>_<column>.idx.json` 每索引一个桶列表
/// - `<dir>/LOCK` 排他锁文件，存续期间阻止其他进程打开同一目录
///
/// 所有写入都是整文件覆盖，无批量、无日志、无崩溃原子性保证。
pub struct FileStorage {
    dir: PathBuf,
    /// 持有数据目录的排他锁，随存储实例一起释放
    _lock: File,
}

impl FileStorage {
    /// 打开（必要时创建）一个数据目录并取得排他锁
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        // 1、准备目录结构
        fs::create_dir_all(dir.join(INDEX_DIR))?;
        // 2、锁定数据目录，单写者由宿主层面保证
        let lock = File::create(dir.join(LOCK_FILE))?;
        if !lock.try_lock_exclusive()? {
            return Err(Error::IO(format!(
                "database directory {} is locked by another process",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), "file storage opened");
        Ok(Self { dir, _lock: lock })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{TABLE_SUFFIX}"))
    }

    fn index_path(&self, table: &str, column: &str) -> PathBuf {
        self.dir
            .join(INDEX_DIR)
            .join(format!("{table}_{column}{INDEX_SUFFIX}"))
    }

    /// 删除一个文件，文件本就不存在时不报错
    fn remove_if_exists(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Storage for FileStorage {
    fn save_table(&mut self, snapshot: &TableSnapshot) -> Result<()> {
        let path = self.table_path(&snapshot.schema.name);
        fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
        trace!(table = %snapshot.schema.name, rows = snapshot.rows.len(), "table snapshot saved");
        Ok(())
    }

    fn load_table(&self, name: &str) -> Result<Option<TableSnapshot>> {
        let content = match fs::read_to_string(self.table_path(name)) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn delete_table(&mut self, name: &str) -> Result<()> {
        Self::remove_if_exists(&self.table_path(name))?;
        debug!(table = name, "table snapshot deleted");
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(TABLE_SUFFIX) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn save_index(
        &mut self,
        table: &str,
        column: &str,
        buckets: &[(Value, Vec<u64>)],
    ) -> Result<()> {
        let path = self.index_path(table, column);
        fs::write(&path, serde_json::to_string_pretty(&buckets)?)?;
        trace!(table, column, buckets = buckets.len(), "index buckets saved");
        Ok(())
    }

    fn delete_index(&mut self, table: &str, column: &str) -> Result<()> {
        Self::remove_if_exists(&self.index_path(table, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Schema};
    use std::collections::BTreeMap;

    fn snapshot(name: &str) -> Result<TableSnapshot> {
        let schema = Schema::new(
            name.to_string(),
            vec![
                Column {
                    primary_key: true,
                    ..Column::new("id", DataType::Integer)
                },
                Column::new("name", DataType::String),
            ],
        )?;
        let mut rows = BTreeMap::new();
        rows.insert(
            0,
            BTreeMap::from([
                ("id".to_string(), Value::Integer(1)),
                ("name".to_string(), Value::String("a".to_string())),
            ]),
        );
        Ok(TableSnapshot { schema, rows })
    }

    #[test]
    fn test_table_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut storage = FileStorage::open(dir.path())?;
        let snapshot = snapshot("users")?;
        storage.save_table(&snapshot)?;

        assert_eq!(storage.load_table("users")?, Some(snapshot));
        assert_eq!(storage.load_table("missing")?, None);
        assert_eq!(storage.list_tables()?, vec!["users".to_string()]);

        storage.delete_table("users")?;
        assert_eq!(storage.load_table("users")?, None);
        assert!(storage.list_tables()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_index_blob_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut storage = FileStorage::open(dir.path())?;
        let buckets = vec![(Value::Integer(1), vec![0u64]), (Value::Integer(2), vec![1])];
        storage.save_index("users", "id", &buckets)?;
        let path = dir.path().join("indexes").join("users_id.idx.json");
        assert!(path.exists());

        // 桶文件内容是 (value, [rowIds...]) 的序列化列表
        let content: Vec<(Value, Vec<u64>)> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap())?;
        assert_eq!(content, buckets);

        storage.delete_index("users", "id")?;
        assert!(!path.exists());
        // 再删一次也不报错
        storage.delete_index("users", "id")?;
        Ok(())
    }

    /// 第二个进程打开同一目录会因目录锁失败
    #[test]
    fn test_directory_lock() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let _first = FileStorage::open(dir.path())?;
        assert!(FileStorage::open(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_reopen_after_drop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let first = FileStorage::open(dir.path())?;
        drop(first);
        assert!(FileStorage::open(dir.path()).is_ok());
        Ok(())
    }
}
