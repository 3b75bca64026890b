use itertools::Itertools;
use std::collections::BTreeSet;

use crate::types::{Row, Value};

/// 格式化打印输出
///
/// 把结果行渲染成等宽文本表格，供控制台展示。列集合取所有行
/// 键的并集（连接结果里不同行可能缺某些限定名键），按字典序排列。
pub fn render_rows(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "(0 rows)".to_string();
    }
    // 1、收集列名
    let columns: Vec<&String> = rows
        .iter()
        .flat_map(|row| row.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    // 2、计算每列宽度：表头与单元格取最宽者
    let widths: Vec<usize> = columns
        .iter()
        .map(|name| {
            rows.iter()
                .map(|row| cell(row, name).len())
                .max()
                .unwrap_or(0)
                .max(name.len())
        })
        .collect();
    // 3、拼装表头、分隔线与数据行
    let header = columns
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{name:<w$}", w = *width))
        .join(" | ");
    let separator = widths.iter().map(|width| "-".repeat(*width)).join("-+-");
    let body = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(&widths)
                .map(|(name, width)| format!("{:<w$}", cell(row, name), w = *width))
                .join(" | ")
        })
        .join("\n");
    format!("{header}\n{separator}\n{body}")
}

fn cell(row: &Row, column: &str) -> String {
    row.get(column).unwrap_or(&Value::Null).to_string()
}
