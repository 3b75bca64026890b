use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::db_error::{Error, Result};
use crate::errinput;
use crate::sql::parser::ast::{CompareOp, JoinClause, Projection, Statement, WhereClause};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::types::{Column, DataType, Value};

/// # 语法分析
///
/// 对一条语句做结构化解析：按首关键字把语句分类成六种变体之一，
/// 再按各自的文法抽取子句结构。解析器只做结构校验，不做语义校验
/// （表是否存在、列是否合法由执行器判断）。
pub struct Parser<'a> {
    input: &'a str,
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Parser<'a> {
        Self {
            input,
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// 解析一条语句，末尾允许一个可选的分号
    pub fn parse(mut self) -> Result<Statement> {
        let statement = match self.peek()? {
            Some(Token::Keyword(Keyword::Create)) => self.parse_create_table()?,
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert()?,
            Some(Token::Keyword(Keyword::Select)) => self.parse_select()?,
            Some(Token::Keyword(Keyword::Update)) => self.parse_update()?,
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete()?,
            Some(Token::Keyword(Keyword::Drop)) => self.parse_drop_table()?,
            _ => return self.unsupported(),
        };
        self.next_if_token(Token::Semicolon);
        if let Some(token) = self.peek()? {
            return errinput!("unexpected token {token} after statement");
        }
        Ok(statement)
    }

    /// 首关键字无法归类时的统一失败出口，错误信息携带原始语句文本
    fn unsupported<T>(&self) -> Result<T> {
        errinput!("unsupported statement: {}", self.input.trim())
    }

    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| Error::ParserError("unexpected end of statement".to_string()))
    }

    /// 仅当下一个 token 满足谓词时消费它
    fn next_if<F>(&mut self, predicate: F) -> Option<Token>
    where
        F: Fn(&Token) -> bool,
    {
        if !matches!(self.lexer.peek(), Some(Ok(token)) if predicate(token)) {
            return None;
        }
        self.lexer.next().and_then(|result| result.ok())
    }

    fn next_if_token(&mut self, token: Token) -> bool {
        self.next_if(|t| t == &token).is_some()
    }

    fn next_if_keyword(&mut self, keyword: Keyword) -> bool {
        self.next_if_token(Token::Keyword(keyword))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.next()?;
        if token != expected {
            return errinput!("expected {expected}, found {token}");
        }
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn next_identifier(&mut self) -> Result<String> {
        match self.next()? {
            Token::Identifier(name) => Ok(name),
            token => errinput!("expected identifier, found {token}"),
        }
    }

    /// 列名，允许携带一个 `table.` 限定前缀，前缀被剥离
    fn next_column_name(&mut self) -> Result<String> {
        let name = self.next_identifier()?;
        if self.next_if_token(Token::Period) {
            return self.next_identifier();
        }
        Ok(name)
    }

    /// 可选限定的名字：`name` 或 `qualifier.name`
    fn next_qualified_name(&mut self) -> Result<(Option<String>, String)> {
        let name = self.next_identifier()?;
        if self.next_if_token(Token::Period) {
            let column = self.next_identifier()?;
            return Ok((Some(name), column));
        }
        Ok((None, name))
    }

    /// CREATE TABLE name ( entry, ... )
    ///
    /// 括号内的每一项是下面三种之一：
    /// 1、表级 `PRIMARY KEY(col)`，col 必须指向已经出现过的列；
    /// 2、表级 `UNIQUE`/`FOREIGN KEY`/`CHECK` 约束，识别后静默丢弃；
    /// 3、列定义：列名 + 类型关键字 + 任意顺序的修饰符。
    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Create)?;
        if !self.next_if_keyword(Keyword::Table) {
            return self.unsupported();
        }
        let name = self.next_identifier()?;
        self.expect(Token::OpenParen)?;
        let mut columns: Vec<Column> = Vec::new();
        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::Primary)) => {
                    self.next()?;
                    self.expect_keyword(Keyword::Key)?;
                    self.expect(Token::OpenParen)?;
                    let column = self.next_identifier()?;
                    self.expect(Token::CloseParen)?;
                    match columns.iter_mut().find(|c| c.name == column) {
                        Some(def) => def.primary_key = true,
                        None => {
                            return errinput!("primary key references unknown column {column}")
                        }
                    }
                }
                Some(Token::Keyword(
                    Keyword::Unique | Keyword::Foreign | Keyword::Check,
                )) => {
                    self.next()?;
                    self.skip_table_constraint()?;
                }
                _ => columns.push(self.parse_column_definition()?),
            }
            if self.next_if_token(Token::Comma) {
                continue;
            }
            self.expect(Token::CloseParen)?;
            break;
        }
        Ok(Statement::CreateTable { name, columns })
    }

    /// 跳过一条表级约束的剩余 token，括号配平，
    /// 停在顶层的逗号或右括号之前
    fn skip_table_constraint(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                None => return errinput!("unexpected end of statement"),
                Some(Token::Comma | Token::CloseParen) if depth == 0 => return Ok(()),
                Some(Token::OpenParen) => {
                    depth += 1;
                    self.next()?;
                }
                Some(Token::CloseParen) => {
                    depth -= 1;
                    self.next()?;
                }
                Some(_) => {
                    self.next()?;
                }
            }
        }
    }

    fn parse_column_definition(&mut self) -> Result<Column> {
        let name = self.next_identifier()?;
        let data_type = match self.next()? {
            Token::Keyword(Keyword::Int | Keyword::Integer) => DataType::Integer,
            Token::Keyword(Keyword::Float | Keyword::Double) => DataType::Float,
            Token::Keyword(Keyword::Text | Keyword::String | Keyword::Varchar) => DataType::String,
            Token::Keyword(Keyword::Bool | Keyword::Boolean) => DataType::Boolean,
            token => return errinput!("unknown column type {token}"),
        };
        let mut column = Column::new(name, data_type);
        // 修饰符以任意顺序出现均可
        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::Primary)) => {
                    self.next()?;
                    self.expect_keyword(Keyword::Key)?;
                    column.primary_key = true;
                }
                Some(Token::Keyword(Keyword::Not)) => {
                    self.next()?;
                    self.expect_keyword(Keyword::Null)?;
                    column.nullable = false;
                }
                Some(Token::Keyword(Keyword::Unique)) => {
                    self.next()?;
                    column.unique = true;
                }
                Some(Token::Comma | Token::CloseParen) | None => break,
                Some(token) => {
                    return errinput!("unexpected token {token} in column definition")
                }
            }
        }
        Ok(column)
    }

    /// INSERT INTO name VALUES ( literal, ... )
    ///
    /// 字面量个数与模式列数是否相符由执行器校验，这里不管。
    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        if !self.next_if_keyword(Keyword::Into) {
            return self.unsupported();
        }
        let table = self.next_identifier()?;
        self.expect_keyword(Keyword::Values)?;
        self.expect(Token::OpenParen)?;
        let mut values = Vec::new();
        if !self.next_if_token(Token::CloseParen) {
            loop {
                values.push(self.parse_literal()?);
                if self.next_if_token(Token::Comma) {
                    continue;
                }
                self.expect(Token::CloseParen)?;
                break;
            }
        }
        Ok(Statement::Insert { table, values })
    }

    /// SELECT projection FROM name [JOIN t ON a.col = b.col] [WHERE ...]
    fn parse_select(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Select)?;
        let projection = if self.next_if_token(Token::Asterisk) {
            Projection::All
        } else {
            let mut columns = vec![self.next_column_name()?];
            while self.next_if_token(Token::Comma) {
                columns.push(self.next_column_name()?);
            }
            Projection::Columns(columns)
        };
        self.expect_keyword(Keyword::From)?;
        let table = self.next_identifier()?;
        let join = if self.next_if_keyword(Keyword::Join) {
            Some(self.parse_join(&table)?)
        } else {
            None
        };
        let r#where = if self.next_if_keyword(Keyword::Where) {
            Some(self.parse_where()?)
        } else {
            None
        };
        Ok(Statement::Select {
            table,
            projection,
            join,
            r#where,
        })
    }

    /// JOIN t ON a.col = b.col，只支持等值内连接
    ///
    /// 等值两侧按限定前缀归属到左右表；没有前缀时按书写顺序，
    /// 左列在前。
    fn parse_join(&mut self, left_table: &str) -> Result<JoinClause> {
        let table = self.next_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let (first_qualifier, first_column) = self.next_qualified_name()?;
        self.expect(Token::Equal)?;
        let (second_qualifier, second_column) = self.next_qualified_name()?;
        let swapped = first_qualifier.as_deref() == Some(table.as_str())
            || second_qualifier.as_deref() == Some(left_table);
        let (left_column, right_column) = if swapped {
            (second_column, first_column)
        } else {
            (first_column, second_column)
        };
        Ok(JoinClause {
            table,
            left_column,
            right_column,
        })
    }

    /// WHERE [table.]column OP literal
    ///
    /// 运算符限定为 `=` `!=` `>` `<` `>=` `<=` 六种；词法层保证
    /// 双字符运算符先于其单字符前缀被识别。
    fn parse_where(&mut self) -> Result<WhereClause> {
        let column = self.next_column_name()?;
        let operator = match self.next()? {
            Token::Equal => CompareOp::Equal,
            Token::NotEqual => CompareOp::NotEqual,
            Token::GreaterThanOrEqual => CompareOp::GreaterThanOrEqual,
            Token::LessThanOrEqual => CompareOp::LessThanOrEqual,
            Token::GreaterThan => CompareOp::GreaterThan,
            Token::LessThan => CompareOp::LessThan,
            token => return errinput!("unknown operator {token} in where clause"),
        };
        let value = self.parse_literal()?;
        Ok(WhereClause {
            column,
            operator,
            value,
        })
    }

    /// UPDATE name SET col = literal, ... [WHERE ...]
    fn parse_update(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.next_identifier()?;
        self.expect_keyword(Keyword::Set)?;
        let mut set = BTreeMap::new();
        loop {
            let column = self.next_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_literal()?;
            set.insert(column, value);
            if !self.next_if_token(Token::Comma) {
                break;
            }
        }
        let r#where = if self.next_if_keyword(Keyword::Where) {
            Some(self.parse_where()?)
        } else {
            None
        };
        Ok(Statement::Update {
            table,
            set,
            r#where,
        })
    }

    /// DELETE FROM name [WHERE ...]
    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        if !self.next_if_keyword(Keyword::From) {
            return self.unsupported();
        }
        let table = self.next_identifier()?;
        let r#where = if self.next_if_keyword(Keyword::Where) {
            Some(self.parse_where()?)
        } else {
            None
        };
        Ok(Statement::Delete { table, r#where })
    }

    /// DROP TABLE name
    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Drop)?;
        if !self.next_if_keyword(Keyword::Table) {
            return self.unsupported();
        }
        let name = self.next_identifier()?;
        Ok(Statement::DropTable { name })
    }

    /// 字面量强制转换，对 INSERT 的值、SET 的右侧和 WHERE 的右侧
    /// 一视同仁：
    /// - 引号包裹（单或双）→ 剥去引号后的字符串；
    /// - 大小写不敏感的 TRUE/FALSE → 布尔；NULL → 空；
    /// - 完整的数字字面量（允许一个前导负号）→ 整值归整数，否则浮点；
    /// - 裸单词 → 原始字符串。
    fn parse_literal(&mut self) -> Result<Value> {
        match self.next()? {
            Token::String(s) => Ok(Value::String(s)),
            Token::Number(n) => Self::parse_number(&n, false),
            Token::Minus => match self.next()? {
                Token::Number(n) => Self::parse_number(&n, true),
                token => errinput!("expected number after -, found {token}"),
            },
            Token::Keyword(Keyword::True) => Ok(Value::Boolean(true)),
            Token::Keyword(Keyword::False) => Ok(Value::Boolean(false)),
            Token::Keyword(Keyword::Null) => Ok(Value::Null),
            Token::Identifier(s) => Ok(Value::String(s)),
            token => errinput!("expected literal, found {token}"),
        }
    }

    /// 不含小数点与指数的数字按整数处理，溢出则退化为浮点
    fn parse_number(n: &str, negative: bool) -> Result<Value> {
        if !n.contains(['.', 'e', 'E']) {
            if let Ok(i) = n.parse::<i64>() {
                return Ok(Value::Integer(if negative { -i } else { i }));
            }
        }
        match n.parse::<f64>() {
            Ok(f) => Ok(Value::Float(if negative { -f } else { f })),
            Err(_) => errinput!("invalid number literal {n}"),
        }
    }
}
