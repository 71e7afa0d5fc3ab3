//! Session driver: scan → parse → resolve → interpret.
//!
//! A [`Lox`] keeps one interpreter alive across calls to [`Lox::run`], so a
//! REPL sees globals and classes from earlier lines.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::{LoxError, RuntimeError, Warning};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Exit status for static (scan, parse, resolve) errors.
pub const EXIT_STATIC_ERROR: i32 = 65;
/// Exit status for runtime errors.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Outcome of one [`Lox::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    StaticError,
    RuntimeError,
}

/// Diagnostics produced by one run.  Static errors are listed in the order
/// the phases found them; at most one runtime error is ever produced.
#[derive(Debug, Default)]
pub struct Report {
    pub errors: Vec<LoxError>,
    pub warnings: Vec<Warning>,
    pub runtime_error: Option<RuntimeError>,
}

impl Report {
    pub fn status(&self) -> Status {
        if !self.errors.is_empty() {
            Status::StaticError
        } else if self.runtime_error.is_some() {
            Status::RuntimeError
        } else {
            Status::Ok
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status() {
            Status::Ok => 0,
            Status::StaticError => EXIT_STATIC_ERROR,
            Status::RuntimeError => EXIT_RUNTIME_ERROR,
        }
    }

    /// Write every diagnostic, one per line: static errors, then warnings,
    /// then the runtime error.
    pub fn write_to<E: Write>(&self, mut err: E) -> io::Result<()> {
        for e in &self.errors {
            writeln!(err, "{}", e)?;
        }
        for w in &self.warnings {
            writeln!(err, "{}", w)?;
        }
        if let Some(e) = &self.runtime_error {
            writeln!(err, "{}", e)?;
        }
        Ok(())
    }
}

pub struct Lox<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
}

impl Lox<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Lox<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Lox<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            interpreter: Interpreter::with_output(out),
        }
    }

    /// Interactive sessions echo the value of bare expression statements.
    pub fn interactive(mut self, echo: bool) -> Self {
        self.interpreter.set_echo(echo);
        self
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }

    /// Run one chunk of source.  Lex and parse errors are collected together
    /// and stop the run before resolution; resolve errors stop it before
    /// execution.  Warnings never stop anything.
    pub fn run(&mut self, source: &str) -> Report {
        let mut report = Report::default();

        let (tokens, lex_errors) = Scanner::new(source).scan_all();
        report.errors.extend(lex_errors);

        let (statements, parse_errors) = Parser::new(tokens).parse();
        report.errors.extend(parse_errors);

        if !report.errors.is_empty() {
            info!("Stopping after {} syntax error(s)", report.errors.len());
            return report;
        }

        let resolution = Resolver::new().resolve(&statements);
        report.warnings = resolution.warnings;

        if !resolution.errors.is_empty() {
            info!("Stopping after {} resolve error(s)", resolution.errors.len());
            report.errors = resolution.errors;
            return report;
        }

        self.interpreter.resolve(resolution.locals);

        if let Err(e) = self.interpreter.interpret(&statements) {
            debug!("Runtime error: {}", e);
            report.runtime_error = Some(e);
        }

        report
    }
}
