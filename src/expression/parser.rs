//! Parser for the built-in scoring language using pest.
//!
//! Supported syntax:
//! - Statements: `let x = e;`, `x = e;`, `x += e;`, `if c { } else if c { } else { }`,
//!   `for i in a..b { }`, `return e;`, `e;`
//! - A trailing expression without `;` is the score
//! - Literals: `1`, `0x1F`, `2.5`, `1e3`, `"text"`, `true`, `null`, `[a, b]`
//! - Operators, loosest first: `||`, `&&`, comparisons, `& | ^`, `<< >>`,
//!   `+ -`, `* / %`, unary `- !`, indexing `x[i]`
//! - `args` holds the caller arguments; `IMPORTANT_LINE` and `IN_PATH` are
//!   the payload flag constants

use ahash::AHashMap;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use crate::error::{PilumError, Result};
use crate::expression::Value;
use crate::expression::ast::{BinaryOp, Builtin, Expr, Program, Slot, Stmt, UnaryOp};
use crate::payload::{IMPORTANT_LINE, IN_PATH};

#[derive(Parser)]
#[grammar = "expression/grammar.pest"]
struct ScoringParser;

/// Parse scoring source into a resolved program.
pub fn parse_program(source: &str) -> Result<Program> {
    let mut pairs = ScoringParser::parse(Rule::program, source)
        .map_err(|e| PilumError::compile(format!("Parse error: {e}")))?;
    let program = next_pair(&mut pairs, "program")?;

    let mut resolver = Resolver::default();
    resolver.push_scope();
    let mut body = Vec::new();
    let mut tail = None;
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::expr => tail = Some(resolver.build_expr(pair)?),
            Rule::EOI => {}
            _ => body.push(resolver.build_statement(pair)?),
        }
    }

    Ok(Program {
        body,
        tail,
        slots: resolver.slots,
    })
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| PilumError::compile(format!("malformed {what}")))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::let_kw | Rule::if_kw | Rule::else_kw | Rule::for_kw | Rule::in_kw | Rule::return_kw
    )
}

/// Inner pairs without the keyword tokens.
fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                return Err(PilumError::compile(format!(
                    "unknown escape sequence \\{other}"
                )));
            }
            None => return Err(PilumError::compile("dangling escape at end of string")),
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct Resolver {
    scopes: Vec<AHashMap<String, Slot>>,
    slots: usize,
}

impl Resolver {
    fn push_scope(&mut self) {
        self.scopes.push(AHashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) -> Result<Slot> {
        if name == "args" || name == "IMPORTANT_LINE" || name == "IN_PATH" {
            return Err(PilumError::compile(format!("cannot redeclare <{name}>")));
        }
        let slot = self.slots;
        self.slots += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
        Ok(slot)
    }

    fn resolve(&self, name: &str) -> Option<Slot> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn build_block(&mut self, pair: Pair<'_, Rule>) -> Result<Vec<Stmt>> {
        self.push_scope();
        let statements = pair
            .into_inner()
            .map(|p| self.build_statement(p))
            .collect::<Result<Vec<_>>>();
        self.pop_scope();
        statements
    }

    fn build_statement(&mut self, pair: Pair<'_, Rule>) -> Result<Stmt> {
        match pair.as_rule() {
            Rule::let_stmt => {
                let mut inner = significant(pair);
                let name = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed let"))?;
                let value = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed let"))?;
                // the initializer sees the enclosing binding of the same name
                let value = self.build_expr(value)?;
                let slot = self.declare(name.as_str())?;
                Ok(Stmt::Let(slot, value))
            }
            Rule::assign_stmt => {
                let mut inner = pair.into_inner();
                let name = next_pair(&mut inner, "assignment")?;
                let op = next_pair(&mut inner, "assignment")?;
                let value = self.build_expr(next_pair(&mut inner, "assignment")?)?;
                let slot = self.resolve(name.as_str()).ok_or_else(|| {
                    PilumError::compile(format!(
                        "assignment to undeclared variable <{}>",
                        name.as_str()
                    ))
                })?;
                let op = match op.as_str().trim() {
                    "=" => None,
                    compound => BinaryOp::from_symbol(compound.trim_end_matches('=')),
                };
                Ok(Stmt::Assign(slot, op, value))
            }
            Rule::if_stmt => self.build_if(pair),
            Rule::for_stmt => {
                let mut inner = significant(pair);
                let var = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed for"))?;
                let start = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed for"))?;
                let end = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed for"))?;
                let block = inner
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed for"))?;

                let start = self.build_expr(start)?;
                let end = self.build_expr(end)?;
                self.push_scope();
                let resolved = self
                    .declare(var.as_str())
                    .and_then(|slot| Ok((slot, self.build_block(block)?)));
                self.pop_scope();
                let (slot, body) = resolved?;
                Ok(Stmt::For(slot, start, end, body))
            }
            Rule::return_stmt => {
                let value = significant(pair)
                    .next()
                    .ok_or_else(|| PilumError::compile("malformed return"))?;
                Ok(Stmt::Return(self.build_expr(value)?))
            }
            Rule::expr_stmt => {
                let mut inner = pair.into_inner();
                Ok(Stmt::Expr(self.build_expr(next_pair(&mut inner, "statement")?)?))
            }
            rule => Err(PilumError::compile(format!(
                "unexpected {rule:?} in statement position"
            ))),
        }
    }

    fn build_if(&mut self, pair: Pair<'_, Rule>) -> Result<Stmt> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        let mut current = pair;

        loop {
            let mut inner = significant(current);
            let condition = inner
                .next()
                .ok_or_else(|| PilumError::compile("malformed if"))?;
            let block = inner
                .next()
                .ok_or_else(|| PilumError::compile("malformed if"))?;
            branches.push((self.build_expr(condition)?, self.build_block(block)?));

            let Some(else_clause) = inner.next() else {
                break;
            };
            let next = significant(else_clause)
                .next()
                .ok_or_else(|| PilumError::compile("malformed else"))?;
            match next.as_rule() {
                Rule::if_stmt => current = next,
                _ => {
                    otherwise = Some(self.build_block(next)?);
                    break;
                }
            }
        }

        Ok(Stmt::If(branches, otherwise))
    }

    fn build_expr(&mut self, pair: Pair<'_, Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::expr => {
                let mut inner = pair.into_inner();
                self.build_expr(next_pair(&mut inner, "expression")?)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::cmp_expr
            | Rule::bit_expr
            | Rule::shift_expr
            | Rule::add_expr
            | Rule::mul_expr => self.build_binary(pair),
            Rule::unary => {
                let mut ops = Vec::new();
                let mut operand = None;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::unary_op => ops.push(if inner.as_str() == "-" {
                            UnaryOp::Neg
                        } else {
                            UnaryOp::Not
                        }),
                        _ => operand = Some(self.build_expr(inner)?),
                    }
                }
                let mut expr = operand.ok_or_else(|| PilumError::compile("missing operand"))?;
                for op in ops.into_iter().rev() {
                    expr = Expr::Unary(op, Box::new(expr));
                }
                Ok(expr)
            }
            Rule::postfix => {
                let mut inner = pair.into_inner();
                let mut expr = self.build_expr(next_pair(&mut inner, "expression")?)?;
                for index in inner {
                    let mut index_inner = index.into_inner();
                    let key = self.build_expr(next_pair(&mut index_inner, "index")?)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Ok(expr)
            }
            Rule::int => {
                let text = pair.as_str();
                let parsed = match text.strip_prefix("0x") {
                    Some(hex) => i64::from_str_radix(hex, 16),
                    None => text.parse::<i64>(),
                };
                parsed
                    .map(|v| Expr::Literal(Value::Int(v)))
                    .map_err(|_| PilumError::compile(format!("integer literal {text} out of range")))
            }
            Rule::float => pair
                .as_str()
                .parse::<f64>()
                .map(|v| Expr::Literal(Value::Float(v)))
                .map_err(|e| PilumError::compile(format!("invalid float literal: {e}"))),
            Rule::string => {
                let raw = pair.into_inner().next().map_or("", |p| p.as_str());
                Ok(Expr::Literal(Value::Str(unescape(raw)?)))
            }
            Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
            Rule::null => Ok(Expr::Literal(Value::Null)),
            Rule::list => Ok(Expr::List(
                pair.into_inner()
                    .map(|p| self.build_expr(p))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Rule::call => self.build_call(pair),
            Rule::ident => self.build_ident(pair.as_str()),
            rule => Err(PilumError::compile(format!(
                "unexpected {rule:?} in expression position"
            ))),
        }
    }

    fn build_binary(&mut self, pair: Pair<'_, Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();
        let mut left = self.build_expr(next_pair(&mut inner, "expression")?)?;
        while let Some(op) = inner.next() {
            let symbol = op.as_str().trim();
            let op = BinaryOp::from_symbol(symbol)
                .ok_or_else(|| PilumError::compile(format!("unknown operator {symbol}")))?;
            let right = self.build_expr(next_pair(&mut inner, "expression")?)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn build_call(&mut self, pair: Pair<'_, Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();
        let name = next_pair(&mut inner, "call")?.as_str();
        let builtin = Builtin::from_name(name)
            .ok_or_else(|| PilumError::compile(format!("unknown function <{name}>")))?;
        let args = inner
            .map(|p| self.build_expr(p))
            .collect::<Result<Vec<_>>>()?;

        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(PilumError::compile(format!(
                "{name} takes {expected} arguments, got {}",
                args.len()
            )));
        }
        Ok(Expr::Call(builtin, args))
    }

    fn build_ident(&self, name: &str) -> Result<Expr> {
        if let Some(slot) = self.resolve(name) {
            return Ok(Expr::Var(slot));
        }
        match name {
            "args" => Ok(Expr::Args),
            "IMPORTANT_LINE" => Ok(Expr::Literal(Value::Int(IMPORTANT_LINE as i64))),
            "IN_PATH" => Ok(Expr::Literal(Value::Int(IN_PATH as i64))),
            _ => Err(PilumError::compile(format!("undeclared variable <{name}>"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Int(v)))
    }

    #[test]
    fn test_precedence() {
        let program = parse_program("1 + 2 * 3").unwrap();
        assert_eq!(
            program.tail,
            Some(Expr::Binary(
                BinaryOp::Add,
                int(1),
                Box::new(Expr::Binary(BinaryOp::Mul, int(2), int(3)))
            ))
        );

        let program = parse_program("1 - 2 - 3").unwrap();
        assert_eq!(
            program.tail,
            Some(Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, int(1), int(2))),
                int(3)
            ))
        );
    }

    #[test]
    fn test_statements_and_slots() {
        let source = r#"
            // shadowing gets a fresh slot
            let x = 1;
            let x = x + 1;
            for i in 0..3 { x += i; }
            if x > 2 { add_score(x); } else if x == 0 { return 0; } else { add_score(1); }
            score()
        "#;
        let program = parse_program(source).unwrap();
        assert_eq!(program.body.len(), 4);
        assert_eq!(program.slots, 3);
        assert_eq!(program.body[1], Stmt::Let(1, Expr::Binary(BinaryOp::Add, Box::new(Expr::Var(0)), int(1))));
        let Stmt::If(branches, otherwise) = &program.body[3] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
        assert_eq!(program.tail, Some(Expr::Call(Builtin::Score, vec![])));
    }

    #[test]
    fn test_literals() {
        let program = parse_program(r#"[0x10, 2.5, 1e2, "a\"b", true, null, -3]"#).unwrap();
        let Some(Expr::List(items)) = program.tail else {
            panic!("expected list");
        };
        assert_eq!(items[0], Expr::Literal(Value::Int(16)));
        assert_eq!(items[1], Expr::Literal(Value::Float(2.5)));
        assert_eq!(items[2], Expr::Literal(Value::Float(100.0)));
        assert_eq!(items[3], Expr::Literal(Value::Str("a\"b".into())));
        assert_eq!(items[4], Expr::Literal(Value::Bool(true)));
        assert_eq!(items[5], Expr::Literal(Value::Null));
        assert_eq!(items[6], Expr::Unary(UnaryOp::Neg, int(3)));
    }

    #[test]
    fn test_keywords_need_a_boundary() {
        let program = parse_program("let letter = 1; letter = 2; letter").unwrap();
        assert_eq!(program.slots, 1);
        assert_eq!(program.body[1], Stmt::Assign(0, None, Expr::Literal(Value::Int(2))));
    }

    #[test]
    fn test_compile_errors() {
        for source in [
            "nope(1)",
            "payload_long(0)",
            "y + 1",
            "z = 1;",
            "let args = 1;",
            "1 +",
            "{ let a = 1; } a",
            "for i in 0..2 { } i",
        ] {
            let err = parse_program(source).unwrap_err();
            assert!(matches!(err, PilumError::Compile(_)), "{source}: {err}");
        }
    }

    #[test]
    fn test_args_and_constants() {
        let program = parse_program(r#"args["w"] & IMPORTANT_LINE"#).unwrap();
        assert_eq!(
            program.tail,
            Some(Expr::Binary(
                BinaryOp::BitAnd,
                Box::new(Expr::Index(
                    Box::new(Expr::Args),
                    Box::new(Expr::Literal(Value::Str("w".into())))
                )),
                int(IMPORTANT_LINE as i64)
            ))
        );
    }
}
