use crate::context::EvalContext;
use crate::error::EngineError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate an inline label expression against the evaluation context.
pub fn evaluate(source: &str, ctx: &EvalContext<'_>) -> Result<Value, EngineError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(EngineError::Syntax("empty expression".to_string()));
    }

    let mut parser = ExprParser::new(tokens);
    let expr = parser.parse_expr(0)?;
    if !parser.at_end() {
        return Err(EngineError::Syntax(
            "unexpected tokens after expression".to_string(),
        ));
    }

    eval(&expr, ctx)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    True,
    False,
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpAmp,
    PipePipe,
    Bang,
    Question,
    Colon,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, EngineError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,

            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| EngineError::Syntax(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }

            '"' => {
                i += 1;
                let mut text = String::new();
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(EngineError::Syntax(
                                "unterminated string literal".to_string(),
                            ));
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            i += 1;
                            match chars.get(i) {
                                Some('n') => text.push('\n'),
                                Some('t') => text.push('\t'),
                                Some('"') => text.push('"'),
                                Some('\\') => text.push('\\'),
                                other => {
                                    return Err(EngineError::Syntax(format!(
                                        "invalid escape '\\{}'",
                                        other.map(|c| c.to_string()).unwrap_or_default()
                                    )));
                                }
                            }
                            i += 1;
                        }
                        Some(&c) => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::StringLit(text));
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(match name.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(name),
                });
            }

            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }

            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::BangEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AmpAmp);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::PipePipe);
                i += 2;
            }

            other => {
                return Err(EngineError::Syntax(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    StringLit(String),
    Boolean(bool),
    Binding(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        true_branch: Box<Expr>,
        false_branch: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy)]
enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    And,
    Or,
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

// Binding powers (precedence). Higher = tighter binding.
const BP_CONDITIONAL: u8 = 2; // ? :
const BP_OR: u8 = 4; // ||
const BP_AND: u8 = 6; // &&
const BP_EQUALITY: u8 = 8; // == !=
const BP_COMPARISON: u8 = 10; // < > <= >=
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / %
const BP_UNARY: u8 = 16; // ! -

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn new(tokens: Vec<Token>) -> Self {
        ExprParser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect(&mut self, token: Token) -> Result<(), EngineError> {
        match self.advance() {
            Some(t) if t == token => Ok(()),
            _ => Err(EngineError::Syntax(format!("expected {:?}", token))),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, EngineError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some(token) = self.peek() else { break };
            let Some((l_bp, r_bp)) = infix_bp(token) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            // Conditional: condition ? true_branch : false_branch
            if matches!(token, Token::Question) {
                self.advance();
                let true_branch = self.parse_expr(0)?;
                self.expect(Token::Colon)?;
                let false_branch = self.parse_expr(BP_CONDITIONAL)?;
                left = Expr::Conditional {
                    condition: Box::new(left),
                    true_branch: Box::new(true_branch),
                    false_branch: Box::new(false_branch),
                };
                continue;
            }

            let op = match self.advance().unwrap() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                Token::EqEq => BinaryOp::Equal,
                Token::BangEq => BinaryOp::NotEqual,
                Token::Gt => BinaryOp::Greater,
                Token::Lt => BinaryOp::Less,
                Token::GtEq => BinaryOp::GreaterEqual,
                Token::LtEq => BinaryOp::LessEqual,
                Token::AmpAmp => BinaryOp::And,
                Token::PipePipe => BinaryOp::Or,
                other => {
                    return Err(EngineError::Syntax(format!(
                        "unexpected operator {:?}",
                        other
                    )));
                }
            };

            let right = self.parse_expr(r_bp)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, EngineError> {
        let token = self
            .advance()
            .ok_or_else(|| EngineError::Syntax("unexpected end of expression".to_string()))?;

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::StringLit(s) => Ok(Expr::StringLit(s)),
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::Ident(name) => Ok(Expr::Binding(name)),

            Token::Bang => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Token::Minus => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }

            Token::LParen => {
                let expr = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            other => Err(EngineError::Syntax(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }
}

/// Left and right binding power of an infix token. Left-associative
/// operators bind tighter on the right.
fn infix_bp(token: &Token) -> Option<(u8, u8)> {
    let bp = match token {
        Token::Question => (BP_CONDITIONAL, BP_CONDITIONAL),
        Token::PipePipe => (BP_OR, BP_OR + 1),
        Token::AmpAmp => (BP_AND, BP_AND + 1),
        Token::EqEq | Token::BangEq => (BP_EQUALITY, BP_EQUALITY + 1),
        Token::Gt | Token::Lt | Token::GtEq | Token::LtEq => (BP_COMPARISON, BP_COMPARISON + 1),
        Token::Plus | Token::Minus => (BP_ADDITIVE, BP_ADDITIVE + 1),
        Token::Star | Token::Slash | Token::Percent => {
            (BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1)
        }
        _ => return None,
    };
    Some(bp)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, EngineError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::StringLit(s) => Ok(Value::String(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),

        Expr::Binding(name) => ctx
            .resolve(name)
            .ok_or_else(|| EngineError::UndefinedBinding(name.clone())),

        Expr::Unary { op, operand } => {
            let value = eval(operand, ctx)?;
            match (op, value) {
                (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (UnaryOp::Negate, other) => Err(type_error("number", &other)),
                (UnaryOp::Not, other) => Err(type_error("boolean", &other)),
            }
        }

        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),

        Expr::Conditional {
            condition,
            true_branch,
            false_branch,
        } => match eval(condition, ctx)? {
            Value::Boolean(true) => eval(true_branch, ctx),
            Value::Boolean(false) => eval(false_branch, ctx),
            other => Err(type_error("boolean", &other)),
        },
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext<'_>,
) -> Result<Value, EngineError> {
    // Logical operators short-circuit.
    if op == BinaryOp::And || op == BinaryOp::Or {
        let lhs = match eval(left, ctx)? {
            Value::Boolean(b) => b,
            other => return Err(type_error("boolean", &other)),
        };
        if (op == BinaryOp::And && !lhs) || (op == BinaryOp::Or && lhs) {
            return Ok(Value::Boolean(lhs));
        }
        return match eval(right, ctx)? {
            Value::Boolean(b) => Ok(Value::Boolean(b)),
            other => Err(type_error("boolean", &other)),
        };
    }

    let lhs = eval(left, ctx)?;
    let rhs = eval(right, ctx)?;

    match op {
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            // String concatenation when either side is a string.
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", lhs, rhs)))
            }
            _ => Err(type_error("number or string", &rhs)),
        },

        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
            let (a, b) = numbers(&lhs, &rhs)?;
            match op {
                BinaryOp::Subtract => Ok(Value::Number(a - b)),
                BinaryOp::Multiply => Ok(Value::Number(a * b)),
                BinaryOp::Divide => {
                    if b == 0.0 {
                        Err(EngineError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }
                BinaryOp::Modulo => {
                    if b == 0.0 {
                        Err(EngineError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a % b))
                    }
                }
                _ => unreachable!(),
            }
        }

        BinaryOp::Equal => Ok(Value::Boolean(lhs == rhs)),
        BinaryOp::NotEqual => Ok(Value::Boolean(lhs != rhs)),

        BinaryOp::Greater | BinaryOp::Less | BinaryOp::GreaterEqual | BinaryOp::LessEqual => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => {
                    return Err(EngineError::TypeError {
                        expected: format!("two {}s", lhs.type_name()),
                        got: rhs.type_name().to_string(),
                    });
                }
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Boolean(false));
            };
            let result = match op {
                BinaryOp::Greater => ordering.is_gt(),
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::GreaterEqual => ordering.is_ge(),
                BinaryOp::LessEqual => ordering.is_le(),
                _ => unreachable!(),
            };
            Ok(Value::Boolean(result))
        }

        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

fn numbers(lhs: &Value, rhs: &Value) -> Result<(f64, f64), EngineError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (Value::Number(_), other) | (other, _) => Err(type_error("number", other)),
    }
}

fn type_error(expected: &str, got: &Value) -> EngineError {
    EngineError::TypeError {
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}
