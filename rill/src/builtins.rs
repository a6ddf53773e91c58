//! Installable function/action libraries and the built-in set.
//!
//! A [`Library`] bundles named callables of two shapes: *functions* return a
//! [`Value`] and may appear inside expressions; *actions* return nothing and
//! are invoked as statements, giving the host its side-effect channel (the
//! core itself performs no I/O).  Installing a library merges its entries into
//! the interpreter's lookup tables; re-installing a name overwrites the
//! previous entry.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CallError, ErrorKind};
use crate::value::Value;

// ── Library interface ─────────────────────────────────────────────────────────

/// A pure callable: evaluated arguments in, one value out.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, CallError>>;

/// A side-effecting callable usable only in statement position.
pub type NativeAction = Rc<dyn Fn(&[Value]) -> Result<(), CallError>>;

/// A named group of functions and actions that a host can install.
pub trait Library {
    fn name(&self) -> &'static str;

    fn functions(&self) -> Vec<(&'static str, NativeFn)> {
        Vec::new()
    }

    fn actions(&self) -> Vec<(&'static str, NativeAction)> {
        Vec::new()
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<(), CallError> {
    if args.len() != n {
        return Err(CallError::new(
            ErrorKind::InvalidNumberOfArguments,
            format!("{name}: expected {n} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64, CallError> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::Text(_)) => Err(CallError::new(
            ErrorKind::InvalidDataType,
            format!("{name}: argument {} must be a number", index + 1),
        )),
        None => Err(CallError::new(
            ErrorKind::InvalidNumberOfArguments,
            format!("{name}: missing argument {}", index + 1),
        )),
    }
}

fn parse_number(name: &str, value: &Value) -> Result<f64, CallError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            CallError::new(
                ErrorKind::InvalidParameter,
                format!("{name}: cannot convert '{s}' to a number"),
            )
        }),
    }
}

// ── StandardLibrary ───────────────────────────────────────────────────────────

/// Type conversion and elementary math, installed by default.
pub struct StandardLibrary;

impl Library for StandardLibrary {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn functions(&self) -> Vec<(&'static str, NativeFn)> {
        vec![
            ("typeof", Rc::new(type_of) as NativeFn),
            ("str", Rc::new(str_fn)),
            ("num", Rc::new(num_fn)),
            ("int", Rc::new(int_fn)),
            ("float", Rc::new(num_fn)),
            ("abs", Rc::new(|a| unary_math("abs", a, f64::abs))),
            ("min", Rc::new(min_fn)),
            ("max", Rc::new(max_fn)),
            ("floor", Rc::new(|a| unary_math("floor", a, f64::floor))),
            ("ceil", Rc::new(|a| unary_math("ceil", a, f64::ceil))),
            ("truncate", Rc::new(|a| unary_math("truncate", a, f64::trunc))),
            ("round", Rc::new(|a| unary_math("round", a, f64::round))),
        ]
    }
}

fn type_of(args: &[Value]) -> Result<Value, CallError> {
    expect_arity("typeof", args, 1)?;
    Ok(Value::Text(args[0].type_name().to_owned()))
}

fn str_fn(args: &[Value]) -> Result<Value, CallError> {
    expect_arity("str", args, 1)?;
    Ok(Value::Text(args[0].to_display_string()))
}

fn num_fn(args: &[Value]) -> Result<Value, CallError> {
    expect_arity("num", args, 1)?;
    Ok(Value::Number(parse_number("num", &args[0])?))
}

fn int_fn(args: &[Value]) -> Result<Value, CallError> {
    expect_arity("int", args, 1)?;
    Ok(Value::Number(parse_number("int", &args[0])?.trunc()))
}

fn unary_math(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, CallError> {
    expect_arity(name, args, 1)?;
    Ok(Value::Number(f(number_arg(name, args, 0)?)))
}

fn min_fn(args: &[Value]) -> Result<Value, CallError> {
    fold_numbers("min", args, f64::min)
}

fn max_fn(args: &[Value]) -> Result<Value, CallError> {
    fold_numbers("max", args, f64::max)
}

fn fold_numbers(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, CallError> {
    if args.len() < 2 {
        return Err(CallError::new(
            ErrorKind::InvalidNumberOfArguments,
            format!("{name}: expected at least 2 arguments, got {}", args.len()),
        ));
    }
    let mut acc = number_arg(name, args, 0)?;
    for index in 1..args.len() {
        acc = f(acc, number_arg(name, args, index)?);
    }
    Ok(Value::Number(acc))
}

// ── RandomLibrary ─────────────────────────────────────────────────────────────

/// Pseudo-random helpers, opt-in.
///
/// Uses a small time-seeded xorshift generator; scripts that need
/// reproducibility can seed it explicitly through [`RandomLibrary::with_seed`].
pub struct RandomLibrary {
    state: Rc<Cell<u64>>,
}

impl RandomLibrary {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15);
        Self::with_seed(seed)
    }

    pub fn with_seed(seed: u64) -> Self {
        RandomLibrary {
            state: Rc::new(Cell::new(seed | 1)),
        }
    }

    /// Uniform draw in `[0, 1)`.
    fn next_unit(state: &Cell<u64>) -> f64 {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl Default for RandomLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl Library for RandomLibrary {
    fn name(&self) -> &'static str {
        "random"
    }

    fn functions(&self) -> Vec<(&'static str, NativeFn)> {
        let random = {
            let state = Rc::clone(&self.state);
            move |args: &[Value]| -> Result<Value, CallError> {
                expect_arity("random", args, 0)?;
                Ok(Value::Number(Self::next_unit(&state)))
            }
        };
        let uniform = {
            let state = Rc::clone(&self.state);
            move |args: &[Value]| -> Result<Value, CallError> {
                expect_arity("uniform", args, 2)?;
                let min = number_arg("uniform", args, 0)?;
                let max = number_arg("uniform", args, 1)?;
                if min > max {
                    return Err(CallError::new(
                        ErrorKind::InvalidParameter,
                        "uniform: min must not exceed max",
                    ));
                }
                Ok(Value::Number(Self::next_unit(&state) * (max - min) + min))
            }
        };
        let randrange = {
            let state = Rc::clone(&self.state);
            move |args: &[Value]| -> Result<Value, CallError> {
                if args.len() != 2 && args.len() != 3 {
                    return Err(CallError::new(
                        ErrorKind::InvalidNumberOfArguments,
                        format!("randrange: expected 2 or 3 arguments, got {}", args.len()),
                    ));
                }
                let min = number_arg("randrange", args, 0)?;
                let max = number_arg("randrange", args, 1)?;
                let mut range = (max.trunc() - min.trunc()) as i64;
                if range <= 0 {
                    return Err(CallError::new(
                        ErrorKind::InvalidParameter,
                        "randrange: empty range",
                    ));
                }
                let mut step = 1.0;
                if args.len() == 3 {
                    step = number_arg("randrange", args, 2)?;
                    if step < 1.0 || step.fract() != 0.0 {
                        return Err(CallError::new(
                            ErrorKind::InvalidParameter,
                            "randrange: step must be a positive integer",
                        ));
                    }
                    range = (range as f64 / step).ceil() as i64;
                }
                let draw = (Self::next_unit(&state) * range as f64).trunc();
                Ok(Value::Number(min.trunc() + draw * step))
            }
        };
        let randint = {
            let state = Rc::clone(&self.state);
            move |args: &[Value]| -> Result<Value, CallError> {
                expect_arity("randint", args, 2)?;
                let min = number_arg("randint", args, 0)?.trunc();
                let max = number_arg("randint", args, 1)?.trunc();
                if min > max {
                    return Err(CallError::new(
                        ErrorKind::InvalidParameter,
                        "randint: min must not exceed max",
                    ));
                }
                let draw = (Self::next_unit(&state) * (max - min + 1.0)).trunc();
                Ok(Value::Number(min + draw.min(max - min)))
            }
        };
        vec![
            ("random", Rc::new(random) as NativeFn),
            ("uniform", Rc::new(uniform)),
            ("randrange", Rc::new(randrange)),
            ("randint", Rc::new(randint)),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
