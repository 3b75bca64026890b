use std::io::{self, BufRead, Write};

use crate::db_error::Result;
use crate::sql::{Database, ExecutionResult};
use crate::utils::render_rows;

/// 交互式控制台
///
/// 一行一条语句，逐条交给引擎执行并渲染结果。`.tables` 与
/// `.schema <表名>` 两个自省命令以及 `exit`/`quit` 在本地处理，
/// 不经过引擎。
pub fn run(mut db: Database) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("mini-sql console (type 'exit' to quit)");
    loop {
        print!("sql> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if line == ".tables" {
            println!("{}", db.list_tables().join(" "));
            continue;
        }
        if let Some(name) = line.strip_prefix(".schema") {
            show_schema(&db, name.trim());
            continue;
        }
        render_result(&db.execute(line));
    }
    Ok(())
}

fn show_schema(db: &Database, name: &str) {
    let Some(schema) = db.get_schema(name) else {
        println!("table {name} does not exist");
        return;
    };
    println!("{name}:");
    for column in &schema.columns {
        let mut line = format!("  {} {}", column.name, column.data_type);
        if column.primary_key {
            line += " PRIMARY KEY";
        }
        if !column.nullable {
            line += " NOT NULL";
        }
        if column.unique && !column.primary_key {
            line += " UNIQUE";
        }
        println!("{line}");
    }
    for label in db.get_indexes(name).unwrap_or_default() {
        println!("  index: {label}");
    }
}

fn render_result(result: &ExecutionResult) {
    if !result.success {
        println!("error: {}", result.error.as_deref().unwrap_or("unknown error"));
        return;
    }
    if let Some(rows) = &result.rows {
        println!("{}", render_rows(rows));
        let mut stats = format!("{} row(s) in {:.2}ms", rows.len(), result.execution_time_ms);
        if let Some(scanned) = result.rows_scanned {
            stats += &format!(", {scanned} scanned");
        }
        if let Some(index) = &result.index_used {
            stats += &format!(", index {index}");
        }
        println!("{stats}");
        return;
    }
    if let Some(message) = &result.message {
        println!("{} ({:.2}ms)", message, result.execution_time_ms);
    }
}
