use std::fmt;

use tracing::trace;

use crate::error::{Diagnostic, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Const, Var, Procedure, Function, Begin, End,
    If, Then, Else, While, Do, Break, Continue,
    Odd, Asm,
    /// Reserved; no statement starts with it.
    Call,
}

impl Keyword {
    /// Exact (already lowercased) spelling lookup.
    pub fn lookup(word: &str) -> Option<Self> {
        let keyword = match word {
            "const" => Keyword::Const,
            "var" => Keyword::Var,
            "procedure" => Keyword::Procedure,
            "function" => Keyword::Function,
            "begin" => Keyword::Begin,
            "end" => Keyword::End,
            "if" => Keyword::If,
            "then" => Keyword::Then,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "odd" => Keyword::Odd,
            "asm" => Keyword::Asm,
            "call" => Keyword::Call,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Const => "const",
            Keyword::Var => "var",
            Keyword::Procedure => "procedure",
            Keyword::Function => "function",
            Keyword::Begin => "begin",
            Keyword::End => "end",
            Keyword::If => "if",
            Keyword::Then => "then",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Odd => "odd",
            Keyword::Asm => "asm",
            Keyword::Call => "call",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,          // +
    Sub,          // -
    Mul,          // *
    Div,          // /
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    NotEqual,     // <>
    Equal,        // =
    Assign,       // :=
}

impl Operator {
    pub fn lookup(text: &str) -> Option<Self> {
        let op = match text {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "<" => Operator::Less,
            "<=" => Operator::LessEqual,
            ">" => Operator::Greater,
            ">=" => Operator::GreaterEqual,
            "<>" => Operator::NotEqual,
            "=" => Operator::Equal,
            ":=" => Operator::Assign,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::NotEqual => "<>",
            Operator::Equal => "=",
            Operator::Assign => ":=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    End,
    Error,
    Identifier(String),
    Integer(i32),
    Keyword(Keyword),
    Operator(Operator),
    Char(char),
}

/// A classified token and the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '+' | '-' | '*' | '/' | '<' | '=' | '>' | ':')
}

fn is_line_break(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

/// Pull-based scanner over one source buffer.
pub struct Scanner {
    chars: Vec<char>,
    position: usize,
    line: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Rescans `source` from line 1 with the error counter cleared.
    pub fn reset(&mut self, source: &str) {
        trace!(len = source.len(), "scanner reset");
        self.chars = source.chars().collect();
        self.position = 0;
        self.line = 1;
        self.diagnostics.clear();
    }

    pub fn current_line(&self) -> usize {
        self.line
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            while let Some(ch) = self.peek() {
                if !ch.is_whitespace() || is_line_break(ch) {
                    break;
                }
                self.bump();
            }

            let line = self.line;
            let Some(ch) = self.peek() else {
                return Token { kind: TokenKind::End, line };
            };

            let kind = match ch {
                '{' => {
                    self.skip_comment();
                    continue;
                }
                '\n' | '\r' => {
                    self.skip_line_break();
                    continue;
                }
                c if c.is_ascii_alphabetic() => self.scan_word(),
                c if c.is_ascii_digit() || c == '$' => self.scan_number(),
                c if is_operator_char(c) => self.scan_operator(),
                c => {
                    self.bump();
                    TokenKind::Char(c)
                }
            };
            return Token { kind, line };
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    fn skip_line_break(&mut self) {
        if self.bump() == Some('\r') && self.peek() == Some('\n') {
            self.bump();
        }
        self.line += 1;
    }

    fn skip_comment(&mut self) {
        self.bump(); // consume '{'
        while let Some(ch) = self.peek() {
            if ch == '}' {
                self.bump();
                return;
            }
            if is_line_break(ch) {
                self.skip_line_break();
            } else {
                self.bump();
            }
        }
    }

    fn take_alphanumeric(&mut self, text: &mut String) {
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_alphanumeric() {
                break;
            }
            text.push(ch);
            self.bump();
        }
    }

    fn scan_word(&mut self) -> TokenKind {
        let mut word = String::new();
        self.take_alphanumeric(&mut word);
        let word = word.to_ascii_lowercase();
        match Keyword::lookup(&word) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(word),
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let hex = self.peek() == Some('$');
        if hex {
            self.bump();
        }
        let mut digits = String::new();
        self.take_alphanumeric(&mut digits);

        let value = if hex {
            // full 32-bit patterns such as $FFFFFFFF are allowed
            u32::from_str_radix(&digits, 16).ok().map(|v| v as i32)
        } else if digits.len() > 1 && digits.starts_with('0') {
            None
        } else {
            digits.parse::<i32>().ok()
        };

        match value {
            Some(v) => TokenKind::Integer(v),
            None => self.error("invalid number"),
        }
    }

    fn scan_operator(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !is_operator_char(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }
        match Operator::lookup(&text) {
            Some(op) => TokenKind::Operator(op),
            None => self.error("unknown operator"),
        }
    }

    fn error(&mut self, message: &str) -> TokenKind {
        let diag = Diagnostic::new(Stage::Lexer, self.line, message);
        diag.emit();
        self.diagnostics.push(diag);
        TokenKind::Error
    }
}

/// Scans the whole buffer, `End` token included.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token();
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}
