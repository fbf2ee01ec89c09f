//! Arithmetic expressions used to tie one parameter to others.
//!
//! Expressions reference other parameters by name, e.g.
//! `"gamma0_air_2_1_7 * 1.05"` or `"0.5 * (nu_2_1_3 + nu_2_1_4)"`. They are
//! parsed once with nom into an [`Expression`] tree and evaluated against an
//! [`EvaluationContext`] every time the parameter vector changes.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, one_of},
    combinator::{peek, recognize},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use std::collections::HashMap;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    Variable(String),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Function(String, Vec<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Source of variable values during evaluation.
pub trait EvaluationContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    fn has_variable(&self, name: &str) -> bool;
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

impl Expression {
    /// Parse an expression from a string. The whole input must be consumed.
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) if remainder.trim().is_empty() => Ok(expr),
            Ok((remainder, _)) => Err(ExpressionError::ParseError {
                message: format!("Unexpected trailing characters: '{}'", remainder),
            }),
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Variable(name) => context.get_variable(name),
            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate(context)?),
            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;
                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
                    BinaryOp::Div => Ok(lhs / rhs),
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }
            Self::Function(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                call_function(name, &values)
            }
        }
    }

    /// Sorted, de-duplicated names of the variables this expression reads.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => vars.push(name.clone()),
            Self::Unary(_, expr) => expr.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| -> ExprResult<f64> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(ExpressionError::InvalidOperation {
                message: format!("{}() requires 1 argument, got {}", name, args.len()),
            }),
        }
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "exp" => unary(f64::exp),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!("{}() requires at least 2 arguments, got {}", name, args.len()),
                });
            }
            Ok(if name == "max" {
                args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            } else {
                args.iter().fold(f64::INFINITY, |a, &b| a.min(b))
            })
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Grammar, lowest to highest precedence:
//   expr   := term (('+' | '-') term)*
//   term   := power (('*' | '/') power)*
//   power  := unary ('^' power)?
//   unary  := '-' primary | primary
//   primary:= number | function_call | variable | '(' expr ')'

fn identifier(input: &str) -> IResult<&str, String> {
    let (input, matched) = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)?;
    Ok((input, matched.to_string()))
}

fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (mut input, first) = expr_parser(input)?;
    let mut args = vec![first];
    while let Ok((rest, _)) =
        delimited(multispace0, char::<&str, nom::error::Error<&str>>(','), multispace0)
            .parse(input)
    {
        let (rest, arg) = expr_parser(rest)?;
        args.push(arg);
        input = rest;
    }
    Ok((input, args))
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = (multispace0, char('('), multispace0).parse(input)?;

    if let Ok((input, _)) = char::<&str, nom::error::Error<&str>>(')').parse(input) {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(input)?;
    let (input, _) = (multispace0, char(')')).parse(input)?;
    Ok((input, Expression::Function(name, args)))
}

/// Numbers must start with a digit or a dot, so that identifiers such as
/// `nan_...` or `inf_...` are never swallowed by the float parser.
fn number(input: &str) -> IResult<&str, Expression> {
    let (input, _) = peek(one_of("0123456789.")).parse(input)?;
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

fn variable(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    Ok((input, Expression::Variable(name)))
}

fn parens(input: &str) -> IResult<&str, Expression> {
    delimited(
        (char('('), multispace0),
        expr_parser,
        (multispace0, char(')')),
    )
    .parse(input)
}

fn primary(input: &str) -> IResult<&str, Expression> {
    alt((number, function_call, variable, parens)).parse(input)
}

fn unary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;
    if let Ok((rest, expr)) = preceded(char('-'), primary).parse(input) {
        return Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(expr))));
    }
    primary(input)
}

/// `^` is right-associative: `2^3^2 == 2^(3^2)`.
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = unary(input)?;
    let (after_space, _) = multispace0.parse(input)?;
    match char::<&str, nom::error::Error<&str>>('^').parse(after_space) {
        Ok((rest, _)) => {
            let (rest, _) = multispace0.parse(rest)?;
            let (rest, exponent) = power(rest)?;
            Ok((
                rest,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Left fold over a chain of same-precedence binary operators.
fn left_chain<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expression>,
    operators: &'static str,
    to_op: fn(char) -> BinaryOp,
) -> IResult<&'a str, Expression> {
    let (mut input, mut acc) = operand(input)?;
    loop {
        let (after_space, _) = multispace0.parse(input)?;
        let Ok((rest, op)) = one_of::<&str, &str, nom::error::Error<&str>>(operators).parse(after_space)
        else {
            return Ok((input, acc));
        };
        let (rest, _) = multispace0.parse(rest)?;
        let (rest, rhs) = operand(rest)?;
        acc = Expression::Binary(to_op(op), Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

fn term(input: &str) -> IResult<&str, Expression> {
    left_chain(input, power, "*/", |c| {
        if c == '*' {
            BinaryOp::Mul
        } else {
            BinaryOp::Div
        }
    })
}

fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;
    left_chain(input, term, "+-", |c| {
        if c == '+' {
            BinaryOp::Add
        } else {
            BinaryOp::Sub
        }
    })
}
