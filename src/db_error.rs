use serde::{Deserialize, Serialize};

/// 自定义错误信息
///
/// 语句执行过程中产生的所有错误最终都会被执行器收敛成
/// 结构化的失败结果，不会越过执行器向上传播。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// 无效数据：语义校验失败（类型不符、约束冲突、表不存在等）
    InvalidData(String),
    /// 无效查询语句：词法或语法解析失败
    ParserError(String),
    /// 文件IO错误
    IO(String),
    /// 序列化/反序列化错误
    Serialization(String),
    /// 配置错误
    ConfigError(String),
    /// Mutex 锁错误
    MutexError(String),
}

/// 自定义错误类型
pub type Result<T> = std::result::Result<T, Error>;

/// 实现标准库std::error::Error特征
impl std::error::Error for Error {}

/// 实现格式输出
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::ParserError(msg) => write!(f, "parser error: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
            Error::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Error::ConfigError(msg) => write!(f, "config error: {msg}"),
            Error::MutexError(msg) => write!(f, "mutex error: {msg}"),
        }
    }
}

/// 构建一个Error::InvalidData实例
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => {
        $crate::db_error::Error::InvalidData(format!($($args)*))
    };
}

/// 构建一个Err(Error::ParserError)实例
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => {
        Err($crate::db_error::Error::ParserError(format!($($args)*)))
    };
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::MutexError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errdata() {
        let err = errdata!("duplicate value {} for column {}", 1, "id");
        assert_eq!(
            err,
            Error::InvalidData("duplicate value 1 for column id".to_string())
        );
    }

    #[test]
    fn test_errinput() {
        let err: Result<()> = errinput!("unsupported statement: {}", "EXPLAIN");
        assert!(matches!(err, Err(Error::ParserError(_))));
    }

    #[test]
    fn test_display() {
        let err = Error::IO("file not found".to_string());
        assert_eq!(err.to_string(), "io error: file not found");
    }
}
