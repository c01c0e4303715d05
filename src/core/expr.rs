//! 参数表达式求值
//!
//! 支持数字字面量、标识符（参数名，可包含 `.` 与 `#`）、`+ - * / ^`、括号、一元正负号，
//! 以及少量内置函数（`sin cos tan sqrt exp abs ln log10 floor ceil min max`）。
//! 标识符交给调用者提供的作用域解析。

use super::error::{KernelError, KernelResult};

/// 括号、一元符号与乘方链的最大嵌套层数
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> KernelResult<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let v = text
                .parse::<f64>()
                .map_err(|_| KernelError::Expression(format!("bad number `{text}`")))?;
            out.push(Token::Num(v));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.' | '#'))
            {
                i += 1;
            }
            out.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let tok = match c {
                '+' | '-' | '*' | '/' | '^' => Token::Op(c),
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                other => {
                    return Err(KernelError::Expression(format!(
                        "unexpected character `{other}` in `{src}`"
                    )));
                }
            };
            out.push(tok);
            i += 1;
        }
    }
    Ok(out)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    scope: &'a dyn Fn(&str) -> Option<f64>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Token) -> KernelResult<()> {
        match self.next() {
            Some(t) if t == want => Ok(()),
            other => Err(KernelError::Expression(format!(
                "expected {want:?}, found {other:?}"
            ))),
        }
    }

    fn expr(&mut self) -> KernelResult<f64> {
        let mut acc = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> KernelResult<f64> {
        let mut acc = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = if op == '*' { acc * rhs } else { acc / rhs };
        }
        Ok(acc)
    }

    fn unary(&mut self) -> KernelResult<f64> {
        if self.depth >= MAX_NESTING {
            return Err(KernelError::Expression(format!(
                "expression nested deeper than {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        let v = self.unary_inner();
        self.depth -= 1;
        v
    }

    fn unary_inner(&mut self) -> KernelResult<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> KernelResult<f64> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> KernelResult<f64> {
        match self.next() {
            Some(Token::Num(v)) => Ok(v),
            Some(Token::LParen) => {
                let v = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(v)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        args.push(self.expr()?);
                        while let Some(Token::Comma) = self.peek() {
                            self.pos += 1;
                            args.push(self.expr()?);
                        }
                    }
                    self.expect(Token::RParen)?;
                    call(&name, &args)
                } else {
                    self.ident(&name)
                }
            }
            other => Err(KernelError::Expression(format!(
                "unexpected token {other:?}"
            ))),
        }
    }

    fn ident(&self, name: &str) -> KernelResult<f64> {
        if let Some(v) = (self.scope)(name) {
            return Ok(v);
        }
        match name {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            _ => Err(KernelError::Expression(format!("unknown name `{name}`"))),
        }
    }
}

fn call(name: &str, args: &[f64]) -> KernelResult<f64> {
    let one = |f: fn(f64) -> f64| -> KernelResult<f64> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(KernelError::Expression(format!(
                "`{name}` takes one argument, got {}",
                args.len()
            ))),
        }
    };
    match name {
        "sin" => one(f64::sin),
        "cos" => one(f64::cos),
        "tan" => one(f64::tan),
        "sqrt" => one(f64::sqrt),
        "exp" => one(f64::exp),
        "abs" => one(f64::abs),
        "ln" => one(f64::ln),
        "log10" => one(f64::log10),
        "floor" => one(f64::floor),
        "ceil" => one(f64::ceil),
        "min" | "max" if !args.is_empty() => {
            let init = args[0];
            Ok(args[1..].iter().fold(init, |a, b| {
                if name == "min" { a.min(*b) } else { a.max(*b) }
            }))
        }
        _ => Err(KernelError::Expression(format!("unknown function `{name}`"))),
    }
}

/// 求值表达式；标识符先交给 `scope`，再尝试内置常量 `pi`、`e`
pub fn evaluate(src: &str, scope: &dyn Fn(&str) -> Option<f64>) -> KernelResult<f64> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(KernelError::Expression("empty expression".to_string()));
    }
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
        scope,
    };
    let v = p.expr()?;
    if p.pos != p.tokens.len() {
        return Err(KernelError::Expression(format!(
            "trailing input in `{src}`"
        )));
    }
    if !v.is_finite() {
        return Err(KernelError::Expression(format!(
            "`{src}` evaluates to a non-finite value"
        )));
    }
    Ok(v)
}

/// 不含任何标识符的常量表达式
pub fn evaluate_constant(src: &str) -> KernelResult<f64> {
    evaluate(src, &|_| None)
}
