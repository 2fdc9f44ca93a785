//! Tree-walking evaluator of parsed scoring programs.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::error::{PilumError, Result};
use crate::expression::ast::{BinaryOp, Builtin, Expr, Program, Stmt, UnaryOp};
use crate::expression::{ScoringFunction, Value};
use crate::payload;
use crate::query::context::{ScoringContext, idf};
use crate::segment::DocId;

/// A compiled program of the built-in language.
#[derive(Debug)]
pub struct Interpreter {
    program: Program,
}

impl Interpreter {
    /// Wrap a parsed program.
    pub fn new(program: Program) -> Self {
        Interpreter { program }
    }

    /// Get the program.
    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl ScoringFunction for Interpreter {
    fn score(&self, ctx: &mut ScoringContext, args: Option<&Value>) -> Result<f32> {
        let null = Value::Null;
        let slots = ctx.take_frame(self.program.slots);
        let mut eval = Evaluator {
            ctx,
            args: args.unwrap_or(&null),
            slots,
        };
        let score = eval.run(&self.program);

        let Evaluator { ctx, slots, .. } = eval;
        ctx.restore_frame(slots);
        score
    }
}

/// Evaluated call arguments; no builtin takes more than three.
type Args = SmallVec<[Value; 4]>;

enum Flow {
    Next,
    Return(Value),
}

struct Evaluator<'a> {
    ctx: &'a mut ScoringContext,
    args: &'a Value,
    slots: Vec<Value>,
}

fn type_error(what: &str, value: &Value) -> PilumError {
    PilumError::script(format!("{what} expects a number, got {}", value.type_name()))
}

fn index_value(base: &Value, key: &Value) -> Result<Value> {
    match (base, key) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::List(items), Value::Int(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or_default()),
        (Value::Map(entries), key) => Ok(entries.get(&key.to_key()).cloned().unwrap_or_default()),
        (base, key) => Err(PilumError::script(format!(
            "cannot index {} with {}",
            base.type_name(),
            key.type_name()
        ))),
    }
}

fn numeric_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(PilumError::script(format!(
                    "cannot compare {} {} {}",
                    left.type_name(),
                    op.symbol(),
                    right.type_name()
                )));
            }
        },
    };
    // NaN compares false both ways
    Ok(ordering.unwrap_or(Ordering::Equal))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    use BinaryOp::*;

    let mismatch = |left: &Value, right: &Value| {
        PilumError::script(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        Eq => return Ok(Value::Bool(numeric_eq(&left, &right))),
        Ne => return Ok(Value::Bool(!numeric_eq(&left, &right))),
        Lt | Le | Gt | Ge => {
            if left.as_f64().is_some_and(f64::is_nan) || right.as_f64().is_some_and(f64::is_nan) {
                return Ok(Value::Bool(false));
            }
            let ordering = compare(op, &left, &right)?;
            return Ok(Value::Bool(match op {
                Lt => ordering == Ordering::Less,
                Le => ordering != Ordering::Greater,
                Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }));
        }
        And => return Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Or => return Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        _ => {}
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            Ok(Value::Int(match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Div | Rem if b == 0 => {
                    return Err(PilumError::script("integer division by zero"));
                }
                Div => a.wrapping_div(b),
                Rem => a.wrapping_rem(b),
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => a.wrapping_shl((b & 63) as u32),
                Shr => a.wrapping_shr((b & 63) as u32),
                _ => unreachable!("handled above"),
            }))
        }
        (Value::Bool(a), Value::Bool(b)) if matches!(op, BitAnd | BitOr | BitXor) => {
            Ok(Value::Bool(match op {
                BitAnd => a & b,
                BitOr => a | b,
                _ => a ^ b,
            }))
        }
        (Value::Str(a), Value::Str(b)) if op == Add => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) if op == Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => {
            if matches!(op, BitAnd | BitOr | BitXor | Shl | Shr) {
                return Err(mismatch(&left, &right));
            }
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch(&left, &right));
            };
            Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Rem => a % b,
                _ => unreachable!("handled above"),
            }))
        }
    }
}

fn number(value: &Value, what: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| type_error(what, value))
}

fn integer(value: &Value, what: &str) -> Result<i64> {
    value.as_i64().ok_or_else(|| type_error(what, value))
}

fn unsigned(value: &Value, what: &str) -> Result<usize> {
    let v = integer(value, what)?;
    usize::try_from(v)
        .map_err(|_| PilumError::script(format!("{what} expects a non-negative number, got {v}")))
}

fn lines(bitmap: payload::LineBitmap) -> Value {
    Value::List(bitmap.iter().map(Value::from).collect())
}

impl Evaluator<'_> {
    fn run(&mut self, program: &Program) -> Result<f32> {
        if let Flow::Return(value) = self.exec_block(&program.body)? {
            return value.to_score();
        }
        match &program.tail {
            Some(expr) => self.eval(expr)?.to_score(),
            None => Ok(self.ctx.score()),
        }
    }

    fn exec_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for statement in statements {
            if let Flow::Return(value) = self.exec(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, statement: &Stmt) -> Result<Flow> {
        match statement {
            Stmt::Let(slot, expr) => {
                self.slots[*slot] = self.eval(expr)?;
            }
            Stmt::Assign(slot, op, expr) => {
                let value = self.eval(expr)?;
                self.slots[*slot] = match op {
                    Some(op) => binary(*op, std::mem::take(&mut self.slots[*slot]), value)?,
                    None => value,
                };
            }
            Stmt::If(branches, otherwise) => {
                for (condition, body) in branches {
                    if self.eval(condition)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            Stmt::For(slot, start, end, body) => {
                let start = integer(&self.eval(start)?, "range start")?;
                let end = integer(&self.eval(end)?, "range end")?;
                for i in start..end {
                    self.slots[*slot] = Value::Int(i);
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Return(expr) => return Ok(Flow::Return(self.eval(expr)?)),
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Next)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(slot) => Ok(self.slots[*slot].clone()),
            Expr::Args => Ok(self.args.clone()),
            Expr::List(items) => Ok(Value::List(
                items.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>>>()?,
            )),
            Expr::Index(base, key) => {
                let key = self.eval(key)?;
                match base.as_ref() {
                    // index the arguments in place
                    Expr::Args => index_value(self.args, &key),
                    Expr::Var(slot) => index_value(&self.slots[*slot], &key),
                    other => {
                        let base = self.eval(other)?;
                        index_value(&base, &key)
                    }
                }
            }
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::Unary(UnaryOp::Neg, operand) => match self.eval(operand)? {
                Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
                Value::Float(v) => Ok(Value::Float(-v)),
                other => Err(type_error("negation", &other)),
            },
            Expr::Binary(BinaryOp::And, left, right) => {
                let result = self.eval(left)?.is_truthy() && self.eval(right)?.is_truthy();
                Ok(Value::Bool(result))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                let result = self.eval(left)?.is_truthy() || self.eval(right)?.is_truthy();
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Call(builtin, args) => {
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Args>>()?;
                self.call(*builtin, args)
            }
        }
    }

    fn call(&mut self, builtin: Builtin, mut args: Args) -> Result<Value> {
        let name = builtin.name();
        let ctx = &mut *self.ctx;
        let term = |args: &[Value]| unsigned(&args[0], name);

        Ok(match builtin {
            Builtin::Doc => Value::from(ctx.doc()),
            Builtin::GlobalDoc => Value::from(ctx.global_doc()),
            Builtin::TermCount => Value::from(ctx.term_count()),
            Builtin::Matching => Value::from(ctx.matching_count()),
            Builtin::Missing => Value::from(ctx.missing_count()),
            Builtin::IsMatching => Value::Bool(ctx.is_matching(term(&args)?)?),
            Builtin::Freq => Value::from(ctx.occurrence_count(term(&args)?)?),
            Builtin::DocFreq => Value::from(ctx.term_stats(term(&args)?)?.term.doc_freq),
            Builtin::MaxDoc => Value::from(ctx.term_stats(term(&args)?)?.collection.max_doc),
            Builtin::TotalTermFreq => {
                Value::from(ctx.term_stats(term(&args)?)?.term.total_term_freq)
            }
            Builtin::DocCount => Value::from(ctx.term_stats(term(&args)?)?.collection.doc_count),
            Builtin::SumDocFreq => {
                Value::from(ctx.term_stats(term(&args)?)?.collection.sum_doc_freq)
            }
            Builtin::SumTotalTermFreq => {
                Value::from(ctx.term_stats(term(&args)?)?.collection.sum_total_term_freq)
            }
            Builtin::NextPosition => ctx
                .next_position(term(&args)?)?
                .map(Value::from)
                .unwrap_or_default(),

            Builtin::HasPayload => Value::Bool(ctx.payload(term(&args)?)?.is_some()),
            Builtin::PayloadInt if args.is_empty() => Value::from(ctx.payload_int()?),
            Builtin::PayloadInt => Value::from(ctx.decode_int_payload(term(&args)?)?),
            Builtin::PayloadLong => Value::from(ctx.decode_long_payload(
                term(&args)?,
                unsigned(&args[1], name)?,
                unsigned(&args[2], name)?,
            )?),
            Builtin::Line => Value::from(payload::line_of(integer(&args[0], name)? as u32)),
            Builtin::IsImportant => {
                Value::Bool(payload::is_important_line(integer(&args[0], name)? as u32))
            }
            Builtin::InPath => Value::Bool(payload::is_in_path(integer(&args[0], name)? as u32)),
            Builtin::TermLines => lines(ctx.term_bitmap(term(&args)?)?),
            Builtin::SharedLines => lines(ctx.anded_bitmaps()?),

            Builtin::Idf => Value::from(idf(
                unsigned(&args[0], name)? as u64,
                unsigned(&args[1], name)? as u64,
            )),
            Builtin::TfIdf => Value::from(ctx.tf_idf(term(&args)?)?),
            Builtin::MaxedTfIdf => Value::from(ctx.maxed_tf_idf(term(&args)?)?),
            Builtin::SumMaxedTfIdf => Value::from(ctx.sum_maxed_tf_idf()?),

            Builtin::FcInt | Builtin::FcLong | Builtin::FcFloat | Builtin::FcDouble => {
                let column = args[0].as_str().ok_or_else(|| {
                    PilumError::script(format!(
                        "{name} expects a column name, got {}",
                        args[0].type_name()
                    ))
                })?;
                let doc = match args.get(1) {
                    Some(doc) => unsigned(doc, name)? as DocId,
                    None => ctx.doc(),
                };
                match builtin {
                    Builtin::FcInt => Value::from(ctx.get_int_at(column, doc)?),
                    Builtin::FcLong => Value::from(ctx.get_long_at(column, doc)?),
                    Builtin::FcFloat => Value::from(ctx.get_float_at(column, doc)?),
                    _ => Value::from(ctx.get_double_at(column, doc)?),
                }
            }

            Builtin::AddScore => {
                ctx.add_score(number(&args[0], name)?);
                Value::from(ctx.score())
            }
            Builtin::Score => Value::from(ctx.score()),
            Builtin::SetCounter => {
                ctx.set_counter(number(&args[0], name)?);
                Value::Null
            }
            Builtin::IncCounter => {
                ctx.increment_counter();
                Value::from(ctx.counter())
            }
            Builtin::Counter => Value::from(ctx.counter()),
            Builtin::LocalGet => {
                let default = args.get_mut(1).map(std::mem::take).unwrap_or_default();
                ctx.local_get_or(&args[0].to_key(), default)
            }
            Builtin::LocalSet => {
                let value = std::mem::take(&mut args[1]);
                ctx.local_set(args[0].to_key(), value);
                Value::Null
            }
            Builtin::GlobalGet => {
                let default = args.get_mut(1).map(std::mem::take).unwrap_or_default();
                ctx.global_get(&args[0].to_key()).unwrap_or(default)
            }
            Builtin::GlobalSet => {
                let value = std::mem::take(&mut args[1]);
                ctx.global_set(args[0].to_key(), value);
                Value::Null
            }

            Builtin::Explain => {
                ctx.add_explanation(number(&args[0], name)?, args[1].to_key());
                Value::Null
            }
            Builtin::AppendResult => {
                ctx.append_result(std::mem::take(&mut args[0]));
                Value::Null
            }
            Builtin::Aggregate => {
                let increment = match args.get(2) {
                    Some(value) => integer(value, name)?,
                    None => 1,
                };
                ctx.aggregate(
                    unsigned(&args[0], name)?,
                    unsigned(&args[1], name)?,
                    increment,
                )?;
                Value::Null
            }

            Builtin::Ln => Value::from(number(&args[0], name)?.ln()),
            Builtin::Sqrt => Value::from(number(&args[0], name)?.sqrt()),
            Builtin::Exp => Value::from(number(&args[0], name)?.exp()),
            Builtin::Pow => Value::from(number(&args[0], name)?.powf(number(&args[1], name)?)),
            Builtin::Abs => match &args[0] {
                Value::Int(v) => Value::Int(v.wrapping_abs()),
                other => Value::from(number(other, name)?.abs()),
            },
            Builtin::Floor => match &args[0] {
                Value::Int(v) => Value::Int(*v),
                other => Value::from(number(other, name)?.floor()),
            },
            Builtin::Ceil => match &args[0] {
                Value::Int(v) => Value::Int(*v),
                other => Value::from(number(other, name)?.ceil()),
            },
            Builtin::Min | Builtin::Max => match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => Value::Int(if builtin == Builtin::Min {
                    *a.min(b)
                } else {
                    *a.max(b)
                }),
                (a, b) => {
                    let (a, b) = (number(a, name)?, number(b, name)?);
                    Value::from(if builtin == Builtin::Min { a.min(b) } else { a.max(b) })
                }
            },
            Builtin::Int => match &args[0] {
                Value::Str(s) => Value::Int(s.trim().parse::<i64>().map_err(|_| {
                    PilumError::script(format!("cannot convert <{s}> to an integer"))
                })?),
                other => Value::Int(integer(other, name)?),
            },
            Builtin::Float => match &args[0] {
                Value::Str(s) => Value::Float(s.trim().parse::<f64>().map_err(|_| {
                    PilumError::script(format!("cannot convert <{s}> to a float"))
                })?),
                other => Value::Float(number(other, name)?),
            },
            Builtin::Len => match &args[0] {
                Value::List(items) => Value::from(items.len()),
                Value::Map(entries) => Value::from(entries.len()),
                Value::Str(s) => Value::from(s.chars().count()),
                Value::Null => Value::Int(0),
                other => {
                    return Err(PilumError::script(format!(
                        "len expects a list, map or string, got {}",
                        other.type_name()
                    )));
                }
            },
        })
    }
}
