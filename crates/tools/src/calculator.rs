//! Calculator tool: evaluates mathematical expressions.
//!
//! Supports `+ - * / %`, `^` (or `**`), parentheses, unary signs, the
//! functions `sqrt pow sin cos tan log log10 exp` and the constants `pi e`.
//! Percentages are rewritten before parsing: `15% of 80` becomes
//! `(15/100)*80` and a bare `15%` becomes `(15/100)`.
//! Uses a recursive-descent parser; nothing is ever `eval`ed.

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use talkbot_core::error::ToolError;
use talkbot_core::provider::ToolParameter;
use talkbot_core::tool::Tool;

use crate::args;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Calculate a mathematical expression. Supports: +, -, *, /, ^, %, sqrt(), pow(), sin(), cos(), tan(), log(), log10(), exp(), pi, e"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::string("expression", "The mathematical expression to evaluate").required()]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let expr = args::text(args::lookup(arguments, &["expression", "expr"]));
        if expr.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'expression' argument".into()));
        }

        Ok(match evaluate(&rewrite_percentages(&expr)) {
            Ok(value) => format_number(value),
            Err(e) => format!("Error: {e}"),
        })
    }
}

static PERCENT_OF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*of\s*(\d+(?:\.\d+)?)").ok());
static PERCENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok());

/// Rewrite `X% of Y` and `X%` into plain arithmetic.
pub fn rewrite_percentages(expr: &str) -> String {
    let mut out = expr.to_string();
    if let Some(re) = PERCENT_OF.as_ref() {
        out = re.replace_all(&out, "(${1}/100)*${2}").into_owned();
    }
    if let Some(re) = PERCENT.as_ref() {
        out = re.replace_all(&out, "(${1}/100)").into_owned();
    }
    out
}

/// Whole numbers print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        ));
    }
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' if chars.get(i + 1) == Some(&'*') => { tokens.push(Token::Caret); i += 2; }
            '*' | '×' => { tokens.push(Token::Star); i += 1; }
            '/' | '÷' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '^' => { tokens.push(Token::Caret); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect::<String>().to_lowercase()));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Token::Minus => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Token::Slash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left /= right;
                }
                Token::Percent => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Modulo by zero".into());
                    }
                    left = left.rem_euclid(right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('^' unary)?   (right-associative, binds tighter than unary minus on its left)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(val)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let args = self.parse_args()?;
                    call_function(name, &args)
                } else {
                    constant(name)
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }

    // args = expr (',' expr)*   (after '(' up to and including ')')
    fn parse_args(&mut self) -> Result<Vec<f64>, String> {
        let mut args = vec![self.parse_expr()?];
        while let Some(Token::Comma) = self.peek() {
            self.consume();
            args.push(self.parse_expr()?);
        }
        self.expect_rparen()?;
        Ok(args)
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err("Expected closing parenthesis".into()),
        }
    }
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(format!("name '{other}' is not defined")),
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, String> {
    let domain = |ok: bool, v: f64| if ok { Ok(v) } else { Err("math domain error".to_string()) };
    match (name, args) {
        ("sqrt", [x]) => domain(*x >= 0.0, x.sqrt()),
        ("pow", [x, y]) => Ok(x.powf(*y)),
        ("sin", [x]) => Ok(x.sin()),
        ("cos", [x]) => Ok(x.cos()),
        ("tan", [x]) => Ok(x.tan()),
        ("log", [x]) => domain(*x > 0.0, x.ln()),
        ("log", [x, base]) => domain(*x > 0.0 && *base > 0.0 && *base != 1.0, x.log(*base)),
        ("log10", [x]) => domain(*x > 0.0, x.log10()),
        ("exp", [x]) => Ok(x.exp()),
        ("sqrt" | "pow" | "sin" | "cos" | "tan" | "log" | "log10" | "exp", _) => Err(format!(
            "{name}() got the wrong number of arguments ({})",
            args.len()
        )),
        (other, _) => Err(format!("name '{other}' is not defined")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
