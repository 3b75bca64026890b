use crate::errinput;
use std::fmt::Display;
use std::iter::Peekable;
use std::str::Chars;

/// 词法解析Token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(String),
    String(String),
    Identifier(String), // 普通标志符
    Keyword(Keyword),
    Period,             // .
    Equal,              // =
    NotEqual,           // !=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    LessThan,           // <
    LessThanOrEqual,    // <=
    Minus,              // -
    Asterisk,           // *
    Exclamation,        // !
    Comma,              // ,
    Semicolon,          // ;
    OpenParen,          // (
    CloseParen,         // )
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Number(n) => n,
            Self::String(s) => s,
            Self::Identifier(s) => s,
            Self::Keyword(k) => return Display::fmt(&k, f),
            Self::Period => ".",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Minus => "-",
            Self::Asterisk => "*",
            Self::Exclamation => "!",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::OpenParen => "(",
            Self::CloseParen => ")",
        })
    }
}

impl From<Keyword> for Token {
    fn from(key: Keyword) -> Self {
        Self::Keyword(key)
    }
}

/// 词法关键字
///
/// 只保留六类语句的文法所需的关键字。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    Bool,
    Boolean,
    Check,
    Create,
    Delete,
    Double,
    Drop,
    False,
    Float,
    Foreign,
    From,
    Insert,
    Int,
    Integer,
    Into,
    Join,
    Key,
    Not,
    Null,
    On,
    Primary,
    Select,
    Set,
    String,
    Table,
    Text,
    True,
    Unique,
    Update,
    Values,
    Varchar,
    Where,
}

impl TryFrom<&str> for Keyword {
    // Use a cheap static error string. This just indicates it's not a keyword.
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Only compare lowercase, which is enforced by the lexer. This avoids
        // allocating a string to change the case. Assert this.
        debug_assert!(
            value.chars().all(|c| !c.is_uppercase()),
            "keyword must be lowercase"
        );
        Ok(match value {
            "bool" => Self::Bool,
            "boolean" => Self::Boolean,
            "check" => Self::Check,
            "create" => Self::Create,
            "delete" => Self::Delete,
            "double" => Self::Double,
            "drop" => Self::Drop,
            "false" => Self::False,
            "float" => Self::Float,
            "foreign" => Self::Foreign,
            "from" => Self::From,
            "insert" => Self::Insert,
            "int" => Self::Int,
            "integer" => Self::Integer,
            "into" => Self::Into,
            "join" => Self::Join,
            "key" => Self::Key,
            "not" => Self::Not,
            "null" => Self::Null,
            "on" => Self::On,
            "primary" => Self::Primary,
            "select" => Self::Select,
            "set" => Self::Set,
            "string" => Self::String,
            "table" => Self::Table,
            "text" => Self::Text,
            "true" => Self::True,
            "unique" => Self::Unique,
            "update" => Self::Update,
            "values" => Self::Values,
            "varchar" => Self::Varchar,
            "where" => Self::Where,
            _ => return Err("not a keyword"),
        })
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bool => "BOOL",
            Self::Boolean => "BOOLEAN",
            Self::Check => "CHECK",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Double => "DOUBLE",
            Self::Drop => "DROP",
            Self::False => "FALSE",
            Self::Float => "FLOAT",
            Self::Foreign => "FOREIGN",
            Self::From => "FROM",
            Self::Insert => "INSERT",
            Self::Int => "INT",
            Self::Integer => "INTEGER",
            Self::Into => "INTO",
            Self::Join => "JOIN",
            Self::Key => "KEY",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::On => "ON",
            Self::Primary => "PRIMARY",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::String => "STRING",
            Self::Table => "TABLE",
            Self::Text => "TEXT",
            Self::True => "TRUE",
            Self::Unique => "UNIQUE",
            Self::Update => "UPDATE",
            Self::Values => "VALUES",
            Self::Varchar => "VARCHAR",
            Self::Where => "WHERE",
        })
    }
}

/// # 词法分析器
///
/// 逐字符扫描一条语句，产出 Token 流：
/// - 关键字与标识符大小写不敏感，统一转为小写；
/// - 字符串字面量由单引号或双引号包裹，引号内的逗号、空白
///   都是字符串内容（引号感知的分隔由此实现），引号自身以
///   连写两个表示转义；
/// - 双字符运算符（`>=`、`<=`、`!=`）先于其单字符前缀被识别。
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Iterator for Lexer<'_> {
    type Item = crate::db_error::Result<Token>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.scan_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .chars
                .peek()
                .map(|c| errinput!("unexpected character {c}")),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// 返回下一个字符，仅当它满足给定的谓词条件；
    /// 不满足则不消费字符，返回 `None`。
    fn next_char_predicate<F>(&mut self, predicate: F) -> Option<char>
    where
        F: Fn(&char) -> bool,
    {
        self.chars.peek().filter(|&c| predicate(c))?;
        self.chars.next()
    }

    fn next_is(&mut self, ch: char) -> bool {
        self.next_char_predicate(|c| ch.eq(c)).is_some()
    }

    fn next_map<F, T>(&mut self, map: F) -> Option<T>
    where
        F: Fn(&char) -> Option<T>,
    {
        let value = self.chars.peek().copied().and_then(|c| map(&c))?;
        self.chars.next();
        Some(value)
    }

    fn scan_symbol(&mut self) -> Option<Token> {
        let mut token = self.next_map(|c| {
            Some(match c {
                '.' => Token::Period,
                ',' => Token::Comma,
                '=' => Token::Equal,
                '>' => Token::GreaterThan,
                '<' => Token::LessThan,
                '-' => Token::Minus,
                '*' => Token::Asterisk,
                '!' => Token::Exclamation,
                ';' => Token::Semicolon,
                '(' => Token::OpenParen,
                ')' => Token::CloseParen,
                _ => return None,
            })
        })?;
        // 双字符运算符优先于单字符前缀
        token = match token {
            Token::Exclamation if self.next_is('=') => Token::NotEqual,
            Token::GreaterThan if self.next_is('=') => Token::GreaterThanOrEqual,
            Token::LessThan if self.next_is('=') => Token::LessThanOrEqual,
            token => token,
        };
        Some(token)
    }

    /// 扫描并返回下一个 `Token`（如果有的话）。
    ///
    /// 1、跳过空白；2、根据首字符分派到对应的扫描方法：
    /// 引号进入字符串扫描，数字进入数字扫描，字母进入
    /// 关键字/标识符扫描，其余走符号扫描。
    fn scan_token(&mut self) -> crate::db_error::Result<Option<Token>> {
        self.skip_whitespace();
        let Some(c) = self.chars.peek() else {
            return Ok(None);
        };
        match c {
            '\'' => self.scan_string('\''),
            '"' => self.scan_string('"'),
            '0'..='9' => Ok(self.scan_number()),
            c if c.is_alphabetic() => Ok(self.scan_keyword_or_identifier()),
            _ => Ok(self.scan_symbol()),
        }
    }

    /// 扫描一个未加引号的标识符或关键字，统一转小写。
    /// 命中关键字表则返回关键字 token，否则返回普通标识符。
    fn scan_keyword_or_identifier(&mut self) -> Option<Token> {
        let mut result = self
            .next_char_predicate(|c| c.is_alphabetic())?
            .to_lowercase()
            .to_string();

        while let Some(c) = self.next_char_predicate(|c| c.is_alphanumeric() || '_'.eq(c)) {
            result.extend(c.to_lowercase());
        }

        if let Ok(keyword) = Keyword::try_from(result.as_str()) {
            return Some(Token::Keyword(keyword));
        }
        Some(Token::Identifier(result))
    }

    /// 字符串扫描规则：由 `quote`（单引号或双引号）包裹，
    /// 引号连写两个表示转义，扫描到闭合引号跳出循环。
    fn scan_string(&mut self, quote: char) -> crate::db_error::Result<Option<Token>> {
        if !self.next_is(quote) {
            return Ok(None);
        }
        let mut result_str = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote && self.next_is(quote) => result_str.push(quote),
                Some(c) if c == quote => break,
                Some(c) => result_str.push(c),
                None => return errinput!("unexpected end of string literal"),
            }
        }
        Ok(Some(Token::String(result_str)))
    }

    /// 扫描一个数字字面量：整数部分 + 可选小数部分 + 可选指数部分
    fn scan_number(&mut self) -> Option<Token> {
        // 整数部分
        let mut number = self
            .next_char_predicate(|c| c.is_ascii_digit())?
            .to_string();
        while let Some(c) = self.next_char_predicate(|c| c.is_ascii_digit()) {
            number.push(c);
        }
        // 小数部分
        if self.next_is('.') {
            number.push('.');
            while let Some(n) = self.next_char_predicate(|c| c.is_ascii_digit()) {
                number.push(n);
            }
        }
        // 指数部分
        if let Some(exp) = self.next_char_predicate(|c| 'e'.eq(c) || 'E'.eq(c)) {
            number.push(exp);
            if let Some(sign) = self.next_char_predicate(|c| '+'.eq(c) || '-'.eq(c)) {
                number.push(sign);
            }
            while let Some(ch) = self.next_char_predicate(|c| c.is_ascii_digit()) {
                number.push(ch);
            }
        }
        Some(Token::Number(number))
    }

    /// 消耗掉空白字符
    fn skip_whitespace(&mut self) {
        while self.next_char_predicate(|c| c.is_whitespace()).is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> crate::db_error::Result<Vec<Token>> {
        Lexer::new(input).collect()
    }

    #[test]
    fn test_scan_create() -> crate::db_error::Result<()> {
        let tokens = scan("CREATE TABLE users (id INT PRIMARY KEY);")?;
        assert_eq!(
            tokens,
            vec![
                Keyword::Create.into(),
                Keyword::Table.into(),
                Token::Identifier("users".to_string()),
                Token::OpenParen,
                Token::Identifier("id".to_string()),
                Keyword::Int.into(),
                Keyword::Primary.into(),
                Keyword::Key.into(),
                Token::CloseParen,
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    /// 引号内的逗号是字符串内容，不会被当作分隔符
    #[test]
    fn test_quote_aware_commas() -> crate::db_error::Result<()> {
        let tokens = scan("('a,b', \"c,d\")")?;
        assert_eq!(
            tokens,
            vec![
                Token::OpenParen,
                Token::String("a,b".to_string()),
                Token::Comma,
                Token::String("c,d".to_string()),
                Token::CloseParen,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_quote_escape() -> crate::db_error::Result<()> {
        let tokens = scan("'it''s'")?;
        assert_eq!(tokens, vec![Token::String("it's".to_string())]);
        Ok(())
    }

    #[test]
    fn test_unterminated_string() {
        assert!(scan("'oops").is_err());
    }

    /// 双字符运算符先于其单字符前缀被识别
    #[test]
    fn test_operator_scan_order() -> crate::db_error::Result<()> {
        let tokens = scan(">= <= != = > <")?;
        assert_eq!(
            tokens,
            vec![
                Token::GreaterThanOrEqual,
                Token::LessThanOrEqual,
                Token::NotEqual,
                Token::Equal,
                Token::GreaterThan,
                Token::LessThan,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_scan_numbers() -> crate::db_error::Result<()> {
        let tokens = scan("42 3.14 6.02e23")?;
        assert_eq!(
            tokens,
            vec![
                Token::Number("42".to_string()),
                Token::Number("3.14".to_string()),
                Token::Number("6.02e23".to_string()),
            ]
        );
        Ok(())
    }

    /// 关键字与标识符大小写不敏感
    #[test]
    fn test_case_insensitive() -> crate::db_error::Result<()> {
        let tokens = scan("SeLeCt Name FROM Users")?;
        assert_eq!(
            tokens,
            vec![
                Keyword::Select.into(),
                Token::Identifier("name".to_string()),
                Keyword::From.into(),
                Token::Identifier("users".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unexpected_character() {
        assert!(scan("select @").is_err());
    }
}
