// src/expression.rs
use crate::errors::Result;
use crate::parser::{is_ident_start, Parser};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ENode {
    Literal(Value),
    Array(Vec<ENode>),
    Ident(String),
    Member {
        object: Box<ENode>,
        property: Box<ENode>,
    },
    /// `name(args)` or `target.name(args)`.
    Call {
        target: Option<Box<ENode>>,
        name: String,
        args: Vec<ENode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ENode>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ENode>,
        right: Box<ENode>,
    },
    Conditional {
        test: Box<ENode>,
        consequent: Box<ENode>,
        alternate: Box<ENode>,
    },
    /// `input | name:arg1:arg2`
    Filter {
        input: Box<ENode>,
        name: String,
        args: Vec<Value>,
    },
}

/// Parse a complete expression. With `allow_filter`, a trailing
/// `| name:arg` pipeline is accepted after the expression.
pub fn parse_expr(input: &str, allow_filter: bool) -> Result<ENode> {
    let mut p = EParser {
        parser: Parser::new(input),
        allow_filter,
        depth: 0,
    };
    let node = p.parse_pipeline()?;
    p.parser.skip_ws();
    if !p.parser.eof() {
        return Err(p.parser.error("trailing input"));
    }
    Ok(node)
}

/// Deepest AST the parser will build. Evaluation and drop both recurse
/// over the tree, so this also bounds their stack use.
const MAX_DEPTH: usize = 128;

struct EParser<'a> {
    parser: Parser<'a>,
    allow_filter: bool,
    /// Nesting of the node under construction.
    depth: usize,
}

impl<'a> EParser<'a> {
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.parser.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_pipeline(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut node = self.parse_conditional()?;
        if !self.allow_filter {
            return Ok(node);
        }
        loop {
            self.parser.skip_ws();
            if !(self.parser.peek_char() == Some('|') && self.parser.peek_nth(1) != Some('|')) {
                break;
            }
            self.parser.consume_char('|');
            self.descend()?;
            self.parser.skip_ws();
            let name = self.parser.parse_identifier()?;
            let mut args = Vec::new();
            loop {
                self.parser.skip_ws();
                if !self.parser.consume_char(':') {
                    break;
                }
                args.push(self.parse_filter_arg()?);
            }
            node = ENode::Filter {
                input: Box::new(node),
                name,
                args,
            };
        }
        self.depth = base;
        Ok(node)
    }

    fn parse_filter_arg(&mut self) -> Result<Value> {
        self.parser.skip_ws();
        match self.parser.peek_char() {
            Some('"') | Some('\'') => Ok(Value::String(self.parser.parse_quoted_string()?)),
            _ => {
                let raw = self.parser.capture_until_any(&[':', '|']).trim();
                Ok(match raw {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    _ => raw
                        .parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| raw.parse::<f64>().map(Value::from))
                        .unwrap_or_else(|_| Value::String(raw.to_string())),
                })
            }
        }
    }

    fn parse_conditional(&mut self) -> Result<ENode> {
        let test = self.parse_or()?;
        self.parser.skip_ws();
        if !self.parser.consume_char('?') {
            return Ok(test);
        }
        let base = self.depth;
        self.descend()?;
        let consequent = self.parse_conditional()?;
        self.parser.skip_ws();
        self.parser.expect(':')?;
        let alternate = self.parse_conditional()?;
        self.depth = base;
        Ok(ENode::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_or(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        loop {
            self.parser.skip_ws();
            if !self.parser.consume_str("||") {
                self.depth = base;
                return Ok(left);
            }
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
    }

    fn parse_and(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_equality()?;
        loop {
            self.parser.skip_ws();
            if !self.parser.consume_str("&&") {
                self.depth = base;
                return Ok(left);
            }
            self.descend()?;
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
    }

    fn parse_equality(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_relational()?;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_str("===") {
                BinaryOp::StrictEq
            } else if self.parser.consume_str("!==") {
                BinaryOp::StrictNe
            } else if self.parser.consume_str("==") {
                BinaryOp::Eq
            } else if self.parser.consume_str("!=") {
                BinaryOp::Ne
            } else {
                self.depth = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_str("<=") {
                BinaryOp::Lte
            } else if self.parser.consume_str(">=") {
                BinaryOp::Gte
            } else if self.parser.consume_char('<') {
                BinaryOp::Lt
            } else if self.parser.consume_char('>') {
                BinaryOp::Gt
            } else {
                self.depth = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_char('+') {
                BinaryOp::Add
            } else if self.parser.consume_char('-') {
                BinaryOp::Sub
            } else {
                self.depth = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_char('*') {
                BinaryOp::Mul
            } else if self.parser.consume_char('/') {
                BinaryOp::Div
            } else if self.parser.consume_char('%') {
                BinaryOp::Rem
            } else {
                self.depth = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        let op = if self.parser.consume_char('!') {
            UnaryOp::Not
        } else if self.parser.consume_char('-') {
            UnaryOp::Neg
        } else if self.parser.consume_char('+') {
            UnaryOp::Plus
        } else {
            return self.parse_postfix();
        };
        let base = self.depth;
        self.descend()?;
        let operand = self.parse_unary()?;
        self.depth = base;
        Ok(ENode::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<ENode> {
        let base = self.depth;
        let mut node = self.parse_primary()?;
        loop {
            self.parser.skip_ws();
            if self.peek_postfix() {
                self.descend()?;
            }
            if self.parser.consume_char('.') {
                self.parser.skip_ws();
                let name = self.parser.parse_identifier()?;
                node = ENode::Member {
                    object: Box::new(node),
                    property: Box::new(ENode::Literal(Value::String(name))),
                };
            } else if self.parser.consume_char('[') {
                let property = self.parse_conditional()?;
                self.parser.skip_ws();
                self.parser.expect(']')?;
                node = ENode::Member {
                    object: Box::new(node),
                    property: Box::new(property),
                };
            } else if self.parser.consume_char('(') {
                let args = self.parse_list(')')?;
                node = match node {
                    ENode::Ident(name) => ENode::Call {
                        target: None,
                        name,
                        args,
                    },
                    ENode::Member { object, property } => match *property {
                        ENode::Literal(Value::String(name)) => ENode::Call {
                            target: Some(object),
                            name,
                            args,
                        },
                        _ => return Err(self.parser.error("computed member is not callable")),
                    },
                    _ => return Err(self.parser.error("expression is not callable")),
                };
            } else {
                self.depth = base;
                return Ok(node);
            }
        }
    }

    fn peek_postfix(&self) -> bool {
        matches!(self.parser.peek_char(), Some('.') | Some('[') | Some('('))
    }

    fn parse_primary(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        match self.parser.peek_char() {
            Some('"') | Some('\'') => Ok(ENode::Literal(Value::String(self.parser.parse_quoted_string()?))),
            Some(c) if c.is_ascii_digit() => Ok(ENode::Literal(self.parser.parse_number_literal()?)),
            Some('(') => {
                self.parser.consume_char('(');
                let base = self.depth;
                self.descend()?;
                let inner = self.parse_conditional()?;
                self.parser.skip_ws();
                self.parser.expect(')')?;
                self.depth = base;
                Ok(inner)
            }
            Some('[') => {
                self.parser.consume_char('[');
                let base = self.depth;
                self.descend()?;
                let items = self.parse_list(']')?;
                self.depth = base;
                Ok(ENode::Array(items))
            }
            Some(c) if is_ident_start(c) => {
                let name = self.parser.parse_identifier()?;
                Ok(match name.as_str() {
                    "true" => ENode::Literal(Value::Bool(true)),
                    "false" => ENode::Literal(Value::Bool(false)),
                    "null" | "undefined" => ENode::Literal(Value::Null),
                    _ => ENode::Ident(name),
                })
            }
            Some(_) => Err(self.parser.error("unexpected character")),
            None => Err(self.parser.error("unexpected end of expression")),
        }
    }

    /// Comma-separated expressions up to `close`; the opener is already consumed.
    fn parse_list(&mut self, close: char) -> Result<Vec<ENode>> {
        let mut out = Vec::new();
        self.parser.skip_ws();
        if self.parser.consume_char(close) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_conditional()?);
            self.parser.skip_ws();
            if self.parser.consume_char(',') {
                continue;
            }
            self.parser.expect(close)?;
            return Ok(out);
        }
    }
}

fn binary(op: BinaryOp, left: ENode, right: ENode) -> ENode {
    ENode::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
