//! Builtins installed in the global scope.

use std::fmt;
use std::io::{self, BufRead};

use chrono::Utc;
use log::{debug, info};
use rand::Rng;

use crate::value::Value;

/// Host implementation of a native.  Errors are plain messages; the
/// interpreter attaches the call site's line.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({}/{})", self.name, self.arity)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// Every builtin, in definition order.
pub fn builtins() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: clock,
        },
        NativeFunction {
            name: "input",
            arity: 0,
            func: input,
        },
        NativeFunction {
            name: "int",
            arity: 1,
            func: truncate,
        },
        NativeFunction {
            name: "rand",
            arity: 0,
            func: random,
        },
        NativeFunction {
            name: "exit",
            arity: 1,
            func: exit_process,
        },
    ]
}

/// Milliseconds since the Unix epoch.
fn clock(_args: &[Value]) -> Result<Value, String> {
    let millis = Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64))
}

/// One line of standard input without its line terminator, or `nil` at EOF.
fn input(_args: &[Value]) -> Result<Value, String> {
    let mut line = String::new();

    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("Failed to read input: {}", e))?;

    if read == 0 {
        return Ok(Value::Nil);
    }

    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }

    Ok(Value::String(line))
}

/// Truncates toward zero.
fn truncate(args: &[Value]) -> Result<Value, String> {
    match args.first() {
        Some(Value::Number(n)) => Ok(Value::Number(n.trunc())),
        Some(other) => Err(format!(
            "int() expects a number but got {}.",
            other.type_name()
        )),
        None => Err("int() expects a number.".to_string()),
    }
}

/// Uniform in `[0, 1)`.
fn random(_args: &[Value]) -> Result<Value, String> {
    Ok(Value::Number(rand::thread_rng().gen::<f64>()))
}

/// Terminates the process; never returns to the program.
fn exit_process(args: &[Value]) -> Result<Value, String> {
    match args.first() {
        Some(Value::Number(code)) => {
            info!("exit({}) requested by program", code);
            std::process::exit(*code as i32)
        }
        Some(other) => Err(format!(
            "exit() expects a number but got {}.",
            other.type_name()
        )),
        None => Err("exit() expects a number.".to_string()),
    }
}
