//! Syntax tree of the built-in scoring language.
//!
//! Variables are resolved to frame slots and calls to [`Builtin`]s while
//! parsing, so evaluation never looks anything up by name.

use crate::expression::Value;

/// Index of a variable in the evaluation frame.
pub type Slot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(Slot),
    Args,
    List(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let(Slot, Expr),
    /// `x = e` when the operator is `None`, `x op= e` otherwise.
    Assign(Slot, Option<BinaryOp>, Expr),
    /// Condition/body pairs tried in order, then the `else` body.
    If(Vec<(Expr, Vec<Stmt>)>, Option<Vec<Stmt>>),
    /// `for var in start..end`, end exclusive.
    For(Slot, Expr, Expr, Vec<Stmt>),
    Return(Expr),
    Expr(Expr),
}

/// A parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub tail: Option<Expr>,
    /// Number of frame slots the program needs.
    pub slots: usize,
}

macro_rules! builtins {
    ($($variant:ident => $name:literal, $min:literal..=$max:literal;)*) => {
        /// Functions callable from scoring source.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant,)*
        }

        impl Builtin {
            /// Every builtin.
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant,)*];

            /// Resolve a function name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }

            /// Get the name as written in source.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }

            /// Smallest and largest accepted argument count.
            pub fn arity(&self) -> (usize, usize) {
                match self {
                    $(Builtin::$variant => ($min, $max),)*
                }
            }
        }
    };
}

builtins! {
    // documents and terms
    Doc => "doc", 0..=0;
    GlobalDoc => "global_doc", 0..=0;
    TermCount => "term_count", 0..=0;
    Matching => "matching", 0..=0;
    Missing => "missing", 0..=0;
    IsMatching => "is_matching", 1..=1;
    Freq => "freq", 1..=1;
    DocFreq => "doc_freq", 1..=1;
    MaxDoc => "max_doc", 1..=1;
    TotalTermFreq => "total_term_freq", 1..=1;
    DocCount => "doc_count", 1..=1;
    SumDocFreq => "sum_doc_freq", 1..=1;
    SumTotalTermFreq => "sum_total_term_freq", 1..=1;
    NextPosition => "next_position", 1..=1;

    // payloads
    HasPayload => "has_payload", 1..=1;
    PayloadInt => "payload_int", 0..=1;
    PayloadLong => "payload_long", 3..=3;
    Line => "line", 1..=1;
    IsImportant => "is_important", 1..=1;
    InPath => "in_path", 1..=1;
    TermLines => "term_lines", 1..=1;
    SharedLines => "shared_lines", 0..=0;

    // tf-idf
    Idf => "idf", 2..=2;
    TfIdf => "tf_idf", 1..=1;
    MaxedTfIdf => "maxed_tf_idf", 1..=1;
    SumMaxedTfIdf => "sum_maxed_tf_idf", 0..=0;

    // columns
    FcInt => "fc_int", 1..=2;
    FcLong => "fc_long", 1..=2;
    FcFloat => "fc_float", 1..=2;
    FcDouble => "fc_double", 1..=2;

    // accumulators and state
    AddScore => "add_score", 1..=1;
    Score => "score", 0..=0;
    SetCounter => "set_counter", 1..=1;
    IncCounter => "inc_counter", 0..=0;
    Counter => "counter", 0..=0;
    LocalGet => "local_get", 1..=2;
    LocalSet => "local_set", 2..=2;
    GlobalGet => "global_get", 1..=2;
    GlobalSet => "global_set", 2..=2;

    // sinks
    Explain => "explain", 2..=2;
    AppendResult => "append_result", 1..=1;
    Aggregate => "aggregate", 2..=3;

    // math and conversions
    Ln => "ln", 1..=1;
    Sqrt => "sqrt", 1..=1;
    Abs => "abs", 1..=1;
    Min => "min", 2..=2;
    Max => "max", 2..=2;
    Floor => "floor", 1..=1;
    Ceil => "ceil", 1..=1;
    Pow => "pow", 2..=2;
    Exp => "exp", 1..=1;
    Int => "int", 1..=1;
    Float => "float", 1..=1;
    Len => "len", 1..=1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(*builtin));
            let (min, max) = builtin.arity();
            assert!(min <= max);
        }
        assert_eq!(Builtin::from_name("nope"), None);
    }

    #[test]
    fn test_operator_symbols() {
        for symbol in ["+", "<=", "<<", "&&", "^"] {
            assert_eq!(BinaryOp::from_symbol(symbol).unwrap().symbol(), symbol);
        }
        assert!(BinaryOp::from_symbol("=>").is_none());
    }
}
