use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db_error::Result;

/// 配置文件的默认位置
pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigWrapper {
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// 存储路径：表快照和索引桶文件所在的数据目录
    pub storage_path: PathBuf,

    /// HTTP 服务的监听地址
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./db"),
            listen_addr: "127.0.0.1:6666".to_string(),
        }
    }
}

pub struct ConfigBuilder {
    pub inner: Config,
}

impl ConfigBuilder {
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner.storage_path = path.into();
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.inner
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            inner: Config::default(),
        }
    }

    /// 从 TOML 配置文件加载；文件不存在时退回默认配置
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        // 1、读取配置文件
        let content = std::fs::read_to_string(path)?;
        // 2、解析配置文件
        let wrapper: ConfigWrapper = toml::from_str(&content)?;
        // 3、返回实际的配置
        Ok(wrapper.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 单元测试：
    /// 测试配置模块的构建方法
    #[test]
    fn test_builder() {
        let config = Config::builder()
            .storage_path("./data")
            .listen_addr("0.0.0.0:7777")
            .build();
        assert_eq!(config.storage_path, PathBuf::from("./data"));
        assert_eq!(config.listen_addr, "0.0.0.0:7777");
    }

    /// 单元测试：
    /// 测试配置模块的加载方法
    #[test]
    fn test_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[config]\nstorage_path = \"/tmp/minisql\"\nlisten_addr = \"127.0.0.1:9999\"\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.storage_path, PathBuf::from("/tmp/minisql"));
        assert_eq!(config.listen_addr, "127.0.0.1:9999");
        Ok(())
    }

    /// 配置文件不存在时退回默认配置
    #[test]
    fn test_load_missing_falls_back_to_default() -> Result<()> {
        let config = Config::load(Path::new("./definitely-not-here.toml"))?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_load_invalid_toml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [[[")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }
}
