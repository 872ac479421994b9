// Guard Evaluator
// Evaluates the binary comparisons used by only_if, not_if and fail_if

use crate::execution::context::ExecutionContext;
use crate::expression::interpolate::{escape_literal_percent, interpolate, InterpolationError};

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// `'<left>' <op> '<right>'`
static STRING_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*'(.*?)'\s*(===|==|!=)\s*'(.*)'\s*$").expect("string guard pattern")
});

/// `<left>[%] <op> <right>[%]`, each side optionally single-quoted
static NUMERIC_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*'?(-?\d+(?:\.\d+)?)%?'?\s*([^\s\d'%.\-]+)\s*'?(-?\d+(?:\.\d+)?)%?'?\s*$",
    )
    .expect("numeric guard pattern")
});

/// Error raised for a guard that cannot be evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<InterpolationError> for EvalError {
    fn from(err: InterpolationError) -> Self {
        EvalError::new(format!("interpolation failed: {}", err))
    }
}

/// Stateless evaluator for guard statements
pub struct Evaluator;

impl Evaluator {
    /// True when the statement holds; the stage should run
    pub fn only_if(statement: &str, vars: &ExecutionContext) -> Result<bool, EvalError> {
        Self::evaluate(statement, vars)
    }

    /// Negation of [`Evaluator::only_if`]
    pub fn not_if(statement: &str, vars: &ExecutionContext) -> Result<bool, EvalError> {
        Self::evaluate(statement, vars).map(|result| !result)
    }

    /// Post-condition; true means the stage is marked failed
    pub fn fail_if(statement: &str, vars: &ExecutionContext) -> Result<bool, EvalError> {
        Self::evaluate(statement, vars)
    }

    fn evaluate(statement: &str, vars: &ExecutionContext) -> Result<bool, EvalError> {
        let statement = interpolate(&escape_literal_percent(statement), vars)?;

        if let Some(caps) = STRING_FORM.captures(&statement) {
            return compare_strings(&caps[1], &caps[2], &caps[3]);
        }

        if let Some(caps) = NUMERIC_FORM.captures(&statement) {
            let left = parse_number(&caps[1])?;
            let right = parse_number(&caps[3])?;
            return compare_numbers(left, &caps[2], right);
        }

        Err(EvalError::new(format!(
            "unrecognized statement \"{}\"",
            statement
        )))
    }
}

fn compare_strings(left: &str, op: &str, right: &str) -> Result<bool, EvalError> {
    match op {
        "==" => Ok(left.to_lowercase() == right.to_lowercase()),
        "===" => Ok(left == right),
        "!=" => Ok(left != right),
        other => Err(EvalError::new(format!(
            "unrecognized operator \"{}\" for strings",
            other
        ))),
    }
}

fn compare_numbers(left: f64, op: &str, right: f64) -> Result<bool, EvalError> {
    let result = match op {
        "==" | "eq" => left == right,
        "!=" | "ne" => left != right,
        "<" | "lt" => left < right,
        ">" | "gt" => left > right,
        "<=" | "le" => left <= right,
        ">=" | "ge" => left >= right,
        "===" => {
            return Err(EvalError::new(
                "operator \"===\" is only valid for strings",
            ))
        }
        other => {
            return Err(EvalError::new(format!(
                "unrecognized operator \"{}\"",
                other
            )))
        }
    };
    Ok(result)
}

fn parse_number(literal: &str) -> Result<f64, EvalError> {
    literal
        .parse::<f64>()
        .map_err(|_| EvalError::new(format!("\"{}\" is not a number", literal)))
}
