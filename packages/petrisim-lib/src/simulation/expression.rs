//! Mathematical expressions for rate constants and constant places.
//!
//! An expression consists of one or more branches separated by `;`. A branch
//! may be guarded by conditions, `if <cond> and <cond> then <expr>`, and the
//! first branch whose conditions hold gives the value. If no branch applies,
//! the value is 0.
//!
//! Inside a branch the usual arithmetic is available (`+ - * / ^` and
//! parentheses), the constant `pi`, the simulated time `Time`, place
//! variables and the functions `abs sqrt exp log ln log10 sin cos tan floor
//! ceil pow min max div`. Place variables evaluate to the concentration of
//! the place.
use std::fmt::Display;

use anyhow::{anyhow, bail};
use nom::{
    Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, multispace0, satisfy},
    combinator::{opt, recognize},
    error::ParseError,
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, preceded},
};

pub const TIME_VARIABLE: &str = "Time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Floor,
    Ceil,
    Pow,
    Min,
    Max,
    Div,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "log10" => Function::Log10,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            "div" => Function::Div,
            _ => return None,
        })
    }

    fn arity(&self) -> usize {
        match self {
            Function::Pow | Function::Min | Function::Max | Function::Div => 2,
            _ => 1,
        }
    }

    fn apply(&self, args: &[f64]) -> f64 {
        match self {
            Function::Abs => args[0].abs(),
            Function::Sqrt => args[0].sqrt(),
            Function::Exp => args[0].exp(),
            Function::Ln => args[0].ln(),
            Function::Log10 => args[0].log10(),
            Function::Sin => args[0].sin(),
            Function::Cos => args[0].cos(),
            Function::Tan => args[0].tan(),
            Function::Floor => args[0].floor(),
            Function::Ceil => args[0].ceil(),
            Function::Pow => args[0].powf(args[1]),
            Function::Min => args[0].min(args[1]),
            Function::Max => args[0].max(args[1]),
            // integer division of the rounded arguments
            Function::Div => {
                let divisor = args[1].round();
                if divisor == 0.0 {
                    0.0
                } else {
                    (args[0].round() / divisor).trunc()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    /// `slot` is filled in when the expression is bound to a net.
    Variable { name: String, slot: usize },
    Time,
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    fn evaluate(&self, concentrations: &[f64], time: f64) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Variable { slot, .. } => concentrations.get(*slot).copied().unwrap_or(0.0),
            Expr::Time => time,
            Expr::Neg(inner) => -inner.evaluate(concentrations, time),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(concentrations, time);
                let rhs = rhs.evaluate(concentrations, time);
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                    BinaryOp::Pow => lhs.powf(rhs),
                }
            }
            Expr::Call(function, args) => {
                let args = args
                    .iter()
                    .map(|a| a.evaluate(concentrations, time))
                    .collect::<Vec<_>>();
                function.apply(&args)
            }
        }
    }

    fn bind(&mut self, resolve: &impl Fn(&str) -> Option<usize>) -> anyhow::Result<()> {
        match self {
            Expr::Variable { name, slot } => {
                *slot = resolve(name).ok_or_else(|| anyhow!("Unknown variable '{}'", name))?;
            }
            Expr::Neg(inner) => inner.bind(resolve)?,
            Expr::Binary(_, lhs, rhs) => {
                lhs.bind(resolve)?;
                rhs.bind(resolve)?;
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.bind(resolve)?;
                }
            }
            Expr::Number(_) | Expr::Time => {}
        }
        Ok(())
    }

    fn visit_variables<'a>(&'a self, f: &mut impl FnMut(&'a str, usize)) {
        match self {
            Expr::Variable { name, slot } => f(name, *slot),
            Expr::Neg(inner) => inner.visit_variables(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit_variables(f);
                rhs.visit_variables(f);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.visit_variables(f)),
            Expr::Number(_) | Expr::Time => {}
        }
    }

    fn uses_time(&self) -> bool {
        match self {
            Expr::Time => true,
            Expr::Neg(inner) => inner.uses_time(),
            Expr::Binary(_, lhs, rhs) => lhs.uses_time() || rhs.uses_time(),
            Expr::Call(_, args) => args.iter().any(|a| a.uses_time()),
            Expr::Number(_) | Expr::Variable { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Less,
    LessEq,
    Eq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    lhs: Expr,
    comparison: Comparison,
    rhs: Expr,
}

impl Condition {
    fn holds(&self, concentrations: &[f64], time: f64) -> bool {
        let lhs = self.lhs.evaluate(concentrations, time);
        let rhs = self.rhs.evaluate(concentrations, time);
        match self.comparison {
            Comparison::Less => lhs < rhs,
            Comparison::LessEq => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterEq => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Branch {
    conditions: Vec<Condition>,
    value: Expr,
}

impl Branch {
    fn exprs_mut(&mut self) -> impl Iterator<Item = &mut Expr> {
        self.conditions
            .iter_mut()
            .flat_map(|c| [&mut c.lhs, &mut c.rhs])
            .chain(std::iter::once(&mut self.value))
    }

    fn exprs(&self) -> impl Iterator<Item = &Expr> {
        self.conditions
            .iter()
            .flat_map(|c| [&c.lhs, &c.rhs])
            .chain(std::iter::once(&self.value))
    }
}

/// A parsed expression, bound to the places of a net.
#[derive(Debug, Clone, PartialEq)]
pub struct MathematicalExpression {
    text: String,
    branches: Vec<Branch>,
    /// Precomputed value if the expression depends neither on places nor on
    /// time.
    constant: Option<f64>,
}

impl MathematicalExpression {
    /// Parses `text`. `resolve` maps a variable name to its slot in the
    /// concentration array passed to [`MathematicalExpression::evaluate`].
    pub fn parse(text: &str, resolve: impl Fn(&str) -> Option<usize>) -> anyhow::Result<Self> {
        let (rest, mut branches) = expression::<nom::error::Error<&str>>(text)
            .map_err(|e| anyhow!("Could not parse expression '{}': {}", text, e))?;
        if !rest.trim().is_empty() {
            bail!("Unexpected input '{}' in expression '{}'", rest.trim(), text);
        }

        for branch in &mut branches {
            for expr in branch.exprs_mut() {
                expr.bind(&resolve)?;
            }
        }

        let mut expression = MathematicalExpression {
            text: text.trim().to_string(),
            branches,
            constant: None,
        };
        if expression.variables().is_empty() && !expression.uses_time() {
            expression.constant = Some(expression.evaluate(&[], 0.0));
        }

        Ok(expression)
    }

    /// Parses an expression that may not reference any place.
    pub fn parse_constant(text: &str) -> anyhow::Result<Self> {
        Self::parse(text, |_| None)
    }

    /// A constant expression.
    pub fn constant(value: f64) -> Self {
        MathematicalExpression {
            text: value.to_string(),
            branches: vec![Branch {
                conditions: vec![],
                value: Expr::Number(value),
            }],
            constant: Some(value),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the value depends neither on places nor on time.
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn uses_time(&self) -> bool {
        self.branches
            .iter()
            .any(|b| b.exprs().any(|e| e.uses_time()))
    }

    /// The referenced variables with their slots, without duplicates.
    pub fn variables(&self) -> Vec<(&str, usize)> {
        let mut variables: Vec<(&str, usize)> = vec![];
        for branch in &self.branches {
            for expr in branch.exprs() {
                expr.visit_variables(&mut |name, slot| {
                    if !variables.iter().any(|(n, _)| *n == name) {
                        variables.push((name, slot));
                    }
                });
            }
        }
        variables
    }

    pub fn evaluate(&self, concentrations: &[f64], time: f64) -> f64 {
        if let Some(value) = self.constant {
            return value;
        }

        self.branches
            .iter()
            .find(|b| b.conditions.iter().all(|c| c.holds(concentrations, time)))
            .map(|b| b.value.evaluate(concentrations, time))
            .unwrap_or(0.0)
    }
}

impl Display for MathematicalExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn ws<'a, O, E: ParseError<&'a str>, P: Parser<&'a str, Output = O, Error = E>>(
    parser: P,
) -> impl Parser<&'a str, Output = O, Error = E> {
    delimited(multispace0, parser, multispace0)
}

fn identifier<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    recognize((
        alt((alpha1, tag("_"))),
        many0(satisfy(|c| c.is_alphanumeric() || c == '_')),
    ))
    .parse(input)
}

fn number<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    let (rest, value) = nom::number::complete::double(input)?;
    Ok((rest, Expr::Number(value)))
}

fn call_or_variable<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, Expr, E> {
    let (input, name) = identifier(input)?;
    let (rest, args) = opt(delimited(
        ws(tag("(")),
        separated_list0(tag(","), sum),
        ws(tag(")")),
    ))
    .parse(input)?;

    let expr = match args {
        Some(args) => {
            let function = Function::from_name(name).ok_or_else(|| {
                nom::Err::Failure(E::from_error_kind(input, nom::error::ErrorKind::Tag))
            })?;
            if args.len() != function.arity() {
                return Err(nom::Err::Failure(E::from_error_kind(
                    input,
                    nom::error::ErrorKind::Count,
                )));
            }
            Expr::Call(function, args)
        }
        None if name == TIME_VARIABLE => Expr::Time,
        None if name == "pi" => Expr::Number(std::f64::consts::PI),
        None => Expr::Variable {
            name: name.to_string(),
            slot: usize::MAX,
        },
    };

    Ok((rest, expr))
}

fn atom<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    ws(alt((
        delimited(tag("("), sum, tag(")")),
        call_or_variable,
        number,
    )))
    .parse(input)
}

// `^` binds tighter than unary minus and is right associative, so
// `-2^2 = -4` and `2^3^2 = 2^9`.
fn power<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(tag("^"), unary)).parse(input)?;

    Ok((
        input,
        match exponent {
            Some(exponent) => Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            None => base,
        },
    ))
}

fn unary<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    alt((
        preceded(ws(tag("-")), unary).map(|e| Expr::Neg(Box::new(e))),
        preceded(ws(tag("+")), unary),
        power,
    ))
    .parse(input)
}

fn fold_binary<'a, E: ParseError<&'a str>>(
    input: &'a str,
    operand: fn(&'a str) -> nom::IResult<&'a str, Expr, E>,
    operators: [(&'static str, BinaryOp); 2],
) -> nom::IResult<&'a str, Expr, E> {
    let (mut input, mut lhs) = operand(input)?;

    loop {
        let mut matched = None;
        for (symbol, op) in operators {
            if let Ok((rest, _)) = tag::<&str, &str, E>(symbol).parse(input) {
                matched = Some((rest, op));
                break;
            }
        }
        let Some((rest, op)) = matched else {
            return Ok((input, lhs));
        };

        let (rest, rhs) = operand(rest)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        input = rest;
    }
}

fn product<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    fold_binary(input, unary, [("*", BinaryOp::Mul), ("/", BinaryOp::Div)])
}

fn sum<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Expr, E> {
    fold_binary(input, product, [("+", BinaryOp::Add), ("-", BinaryOp::Sub)])
}

fn comparison<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, Comparison, E> {
    alt((
        tag("<=").map(|_| Comparison::LessEq),
        tag(">=").map(|_| Comparison::GreaterEq),
        tag("==").map(|_| Comparison::Eq),
        tag("<").map(|_| Comparison::Less),
        tag(">").map(|_| Comparison::Greater),
        tag("=").map(|_| Comparison::Eq),
    ))
    .parse(input)
}

fn condition<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Condition, E> {
    let (input, lhs) = sum(input)?;
    let (input, comparison) = comparison(input)?;
    let (input, rhs) = sum(input)?;

    Ok((
        input,
        Condition {
            lhs,
            comparison,
            rhs,
        },
    ))
}

fn keyword<'a, E: ParseError<&'a str>>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = E> {
    ws(tag(word))
}

fn branch<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Branch, E> {
    let (input, conditions) = opt(delimited(
        keyword("if"),
        separated_list1(keyword("and"), condition),
        keyword("then"),
    ))
    .parse(input)?;
    let (input, value) = sum(input)?;

    Ok((
        input,
        Branch {
            conditions: conditions.unwrap_or_default(),
            value,
        },
    ))
}

fn expression<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, Vec<Branch>, E> {
    let (input, branches) = separated_list1(ws(tag(";")), branch).parse(input)?;
    // a trailing separator is allowed
    let (input, _) = opt(ws(tag(";"))).parse(input)?;
    Ok((input, branches))
}

#[test]
fn test_arithmetic() {
    let eval = |text: &str| {
        MathematicalExpression::parse_constant(text)
            .unwrap()
            .evaluate(&[], 0.0)
    };

    assert_eq!(eval("1 + 2 * 3"), 7.0);
    assert_eq!(eval("(1 + 2) * 3"), 9.0);
    assert_eq!(eval("10 - 4 - 3"), 3.0);
    assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
    assert_eq!(eval("-2 ^ 2"), -4.0);
    assert_eq!(eval("1.5e2"), 150.0);
    assert_eq!(eval("max(2, 3) + min(2, 3)"), 5.0);
    assert_eq!(eval("div(7, 2)"), 3.0);
    assert_eq!(eval("sqrt(16)"), 4.0);
    assert!((eval("pi") - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn test_variables_and_time() {
    let expression = MathematicalExpression::parse("0.5 * A + Time", |name| match name {
        "A" => Some(1),
        _ => None,
    })
    .unwrap();

    assert!(!expression.is_constant());
    assert!(expression.uses_time());
    assert_eq!(expression.variables(), vec![("A", 1)]);
    assert_eq!(expression.evaluate(&[0.0, 4.0], 1.0), 3.0);
}

#[test]
fn test_unknown_names() {
    assert!(MathematicalExpression::parse_constant("2 * B").is_err());
    assert!(MathematicalExpression::parse_constant("foo(2)").is_err());
    assert!(MathematicalExpression::parse_constant("max(2)").is_err());
    assert!(MathematicalExpression::parse_constant("2 +").is_err());
}

#[test]
fn test_conditional_branches() {
    let expression = MathematicalExpression::parse(
        "if Time < 10 and A >= 1 then 5; if Time >= 10 then 1",
        |name| (name == "A").then_some(0),
    )
    .unwrap();

    assert_eq!(expression.evaluate(&[2.0], 0.0), 5.0);
    assert_eq!(expression.evaluate(&[0.0], 0.0), 0.0);
    assert_eq!(expression.evaluate(&[0.0], 12.0), 1.0);
}
