pub mod cfg;
pub mod console;
pub mod db_error;
pub mod server;
pub mod sql;
pub mod storage;
pub mod types;
pub mod utils;

pub use sql::{Database, ExecutionResult};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
