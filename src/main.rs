use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mini_sql::cfg::{Config, DEFAULT_CONFIG_PATH};
use mini_sql::init_tracing;
use mini_sql::sql::Database;
use mini_sql::storage::{FileStorage, MemoryStorage, Storage};
use mini_sql::{console, server};

#[derive(Parser)]
#[command(name = "mini-sql", about = "an embeddable mini relational engine")]
struct Cli {
    /// path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// data directory, overrides the config file
    #[arg(long)]
    data: Option<PathBuf>,

    /// keep everything in memory, nothing is persisted
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// interactive sql console
    Console,
    /// serve the engine over http
    Serve {
        /// listen address, overrides the config file
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> mini_sql::db_error::Result<()> {
    // 初始化日志
    init_tracing();
    let cli = Cli::parse();
    // 加载配置并套用命令行覆盖
    let mut config = Config::load(&cli.config)?;
    if let Some(data) = cli.data {
        config.storage_path = data;
    }
    // 打开数据库
    let storage: Box<dyn Storage> = if cli.in_memory {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(FileStorage::open(&config.storage_path)?)
    };
    let db = Database::open(storage)?;
    match cli.command {
        Command::Console => console::run(db),
        Command::Serve { listen } => {
            let addr = listen.unwrap_or(config.listen_addr);
            server::serve(db, &addr).await
        }
    }
}
