//! Tree‑walking evaluator.
//!
//! The interpreter owns the global table, the "current environment" cursor
//! and the resolver's address table.  Statement execution reports how it
//! finished through [`ExecOutcome`]; loops consume `Break`, calls consume
//! `Return`, and anything that escapes to the top level becomes a
//! [`RuntimeError`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ClassDecl, ElseIf, Expr, ExprId, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::{self, EnvRef, Environment};
use crate::error::RuntimeError;
use crate::function::LoxFunction;
use crate::native;
use crate::resolver::Local;
use crate::token::{Token, TokenType};
use crate::value::{format_number, Value};

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Normal,
    Break { line: usize },
    Return { value: Value, line: usize },
}

pub struct Interpreter<W: Write = io::Stdout> {
    globals: HashMap<String, Value>,
    /// `None` while executing top‑level code.
    environment: Option<EnvRef>,
    locals: HashMap<ExprId, Local>,
    out: W,
    echo: bool,
}

impl Interpreter<io::Stdout> {
    /// Creates an interpreter writing program output to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates an interpreter writing program output to `out`, with the
    /// native functions already defined.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let mut globals: HashMap<String, Value> = HashMap::new();
        for builtin in native::builtins() {
            debug!("Defining native function '{}'", builtin.name);
            globals.insert(builtin.name.to_string(), Value::Native(Rc::new(builtin)));
        }

        Self {
            globals,
            environment: None,
            locals: HashMap::new(),
            out,
            echo: false,
        }
    }

    /// Interactive mode: echo the value of every top‑level expression
    /// statement.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Merge the addresses of a resolve pass.  Entries from earlier passes
    /// stay valid because expression ids are never reused.
    pub fn resolve(&mut self, locals: HashMap<ExprId, Local>) {
        debug!("Recording {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Current value of a global, if defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let (true, Stmt::Expression(expr)) = (self.echo, stmt) {
                let value = self.evaluate(expr)?;
                self.emit(0, &value.repr())?;
                continue;
            }

            match self.execute(stmt)? {
                ExecOutcome::Normal => {}
                ExecOutcome::Break { line } => {
                    return Err(RuntimeError::new(line, "Can't break outside of a loop."));
                }
                ExecOutcome::Return { line, .. } => {
                    return Err(RuntimeError::new(line, "Can't return from top-level code."));
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    fn emit(&mut self, line: usize, text: &str) -> IResult<()> {
        writeln!(self.out, "{}", text)
            .map_err(|e| RuntimeError::new(line, format!("Failed to write output: {}", e)))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> IResult<ExecOutcome> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                self.emit(keyword.line, &value.to_string())?;
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::new(self.environment.clone())));
                return self.execute_block(statements, env);
            }

            Stmt::If {
                condition,
                then_branch,
                else_ifs,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                }

                for ElseIf { condition, body } in else_ifs {
                    if self.evaluate(condition)?.is_truthy() {
                        return self.execute(body);
                    }
                }

                if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        ExecOutcome::Normal => {}
                        ExecOutcome::Break { .. } => break,
                        ret @ ExecOutcome::Return { .. } => return Ok(ret),
                    }
                }
            }

            Stmt::Break { keyword } => {
                return Ok(ExecOutcome::Break { line: keyword.line });
            }

            Stmt::Return { keyword, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                return Ok(ExecOutcome::Return {
                    value,
                    line: keyword.line,
                });
            }

            Stmt::Function(decl) => {
                let function =
                    LoxFunction::new(Rc::clone(decl), self.environment.clone(), false);
                debug!("Defining function '{}'", function.name());
                self.define(decl.display_name(), Value::Function(Rc::new(function)));
            }

            Stmt::Class(class) => self.define_class(class)?,
        }

        Ok(ExecOutcome::Normal)
    }

    /// Run `statements` with `env` as the current environment, restoring the
    /// previous one on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> IResult<ExecOutcome> {
        let previous = self.environment.replace(env);
        let result = self.execute_all(statements);
        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> IResult<ExecOutcome> {
        for stmt in statements {
            match self.execute(stmt)? {
                ExecOutcome::Normal => {}
                signal => return Ok(signal),
            }
        }

        Ok(ExecOutcome::Normal)
    }

    /// Top level: a global.  Anywhere else: the next slot of the current
    /// frame.
    fn define(&mut self, name: &str, value: Value) {
        match &self.environment {
            Some(env) => env.borrow_mut().define(value),
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn define_class(&mut self, class: &ClassDecl) -> IResult<()> {
        let superclass: Option<Rc<LoxClass>> = match &class.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(superclass) => Some(superclass),
                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => class.name.line,
                    };
                    return Err(RuntimeError::new(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Subclass methods close over a frame holding `super` in slot 0.
        let method_env: Option<EnvRef> = match &superclass {
            Some(superclass) => Some(Environment::with_values(
                self.environment.clone(),
                vec![Value::Class(Rc::clone(superclass))],
            )),
            None => self.environment.clone(),
        };

        let mut methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        for decl in &class.methods {
            let is_initializer = decl.display_name() == "init";
            let function = LoxFunction::new(Rc::clone(decl), method_env.clone(), is_initializer);
            methods.insert(decl.display_name().to_string(), Rc::new(function));
        }

        let mut static_methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        for decl in &class.static_methods {
            let function = LoxFunction::new(Rc::clone(decl), method_env.clone(), false);
            static_methods.insert(decl.display_name().to_string(), Rc::new(function));
        }

        let lox_class = LoxClass::new(
            class.name.lexeme.clone(),
            superclass,
            methods,
            static_methods,
        );

        info!("Class '{}' defined", lox_class.name);

        self.define(&class.name.lexeme, Value::Class(Rc::new(lox_class)));

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new(operator.line, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(invalid_operator(operator)),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuits = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Comma(expressions) => {
                let mut last = Value::Nil;
                for e in expressions {
                    last = self.evaluate(e)?;
                }
                Ok(last)
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call(callee, args, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => self.get_property(&instance, name),
                Value::Class(class) => match class.find_static_method(&name.lexeme) {
                    Some(method) => Ok(Value::Function(method)),
                    None => Err(undefined_property(name)),
                },
                _ => Err(RuntimeError::new(name.line, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(&name.lexeme, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::new(name.line, "Only instances have fields.")),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method),

            Expr::Lambda(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), self.environment.clone(), false);
                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Variables
    // ─────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        match self.locals.get(&id) {
            Some(local) => self.read_local(*local, name),
            None => self
                .globals
                .get(&name.lexeme)
                .cloned()
                .ok_or_else(|| undefined_variable(name)),
        }
    }

    fn read_local(&self, local: Local, name: &Token) -> IResult<Value> {
        self.environment
            .as_ref()
            .and_then(|env| environment::get_at(env, local))
            .ok_or_else(|| {
                RuntimeError::new(
                    name.line,
                    format!("Unresolvable local variable '{}'.", name.lexeme),
                )
            })
    }

    /// Unresolved names are globals.  Top‑level code may create a global by
    /// assigning to it; code in a local scope may only update one.
    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> IResult<()> {
        if let Some(local) = self.locals.get(&id) {
            let assigned = self
                .environment
                .as_ref()
                .is_some_and(|env| environment::assign_at(env, *local, value));

            if !assigned {
                return Err(RuntimeError::new(
                    name.line,
                    format!("Unresolvable local variable '{}'.", name.lexeme),
                ));
            }

            return Ok(());
        }

        if self.environment.is_none() || self.globals.contains_key(&name.lexeme) {
            self.globals.insert(name.lexeme.clone(), value);
            Ok(())
        } else {
            Err(undefined_variable(name))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Objects
    // ─────────────────────────────────────────────────────────────────────

    /// Fields first, then methods up the superclass chain.  Getters run
    /// immediately.
    fn get_property(&mut self, instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> IResult<Value> {
        let field = instance.borrow().field(&name.lexeme);
        if let Some(value) = field {
            return Ok(value);
        }

        let class = Rc::clone(&instance.borrow().class);

        match class.find_method(&name.lexeme) {
            Some(method) => self.bound_method(&method, Rc::clone(instance)),
            None => Err(undefined_property(name)),
        }
    }

    fn bound_method(
        &mut self,
        method: &LoxFunction,
        instance: Rc<RefCell<LoxInstance>>,
    ) -> IResult<Value> {
        let bound = method.bind(instance);

        if bound.is_getter() {
            return self.call_function(&bound, Vec::new());
        }

        Ok(Value::Function(Rc::new(bound)))
    }

    /// `super` sits one frame outside the method's `this` frame.
    fn super_method(&mut self, id: ExprId, keyword: &Token, method: &Token) -> IResult<Value> {
        let local = *self.locals.get(&id).ok_or_else(|| {
            RuntimeError::new(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass = match self.read_local(local, keyword)? {
            Value::Class(class) => class,
            _ => return Err(RuntimeError::new(keyword.line, "Superclass must be a class.")),
        };

        let this_slot = Local {
            distance: local.distance.saturating_sub(1),
            slot: 0,
        };
        let this_token = Token::synthetic("this", keyword.line);

        let instance = match self.read_local(this_slot, &this_token)? {
            Value::Instance(instance) => instance,
            _ => {
                return Err(RuntimeError::new(
                    keyword.line,
                    "Can't use 'super' outside of a method.",
                ))
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => self.bound_method(&found, instance),
            None => Err(undefined_property(method)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    fn call(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> IResult<Value> {
        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), args.len(), paren)?;
                debug!(
                    "Calling user-defined function '{}' (line {})",
                    function.name(),
                    function.declaration.line
                );
                self.call_function(&function, args)
            }

            Value::Native(native) => {
                check_arity(native.arity, args.len(), paren)?;
                native
                    .call(&args)
                    .map_err(|message| RuntimeError::new(paren.line, message))
            }

            Value::Class(class) => {
                check_arity(class.arity(), args.len(), paren)?;
                self.instantiate(&class, args)
            }

            _ => Err(RuntimeError::new(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Runs the body in a fresh frame enclosing the closure, parameters in
    /// slots `0..arity`.  Initializers always yield their `this`.
    pub fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> IResult<Value> {
        let env = Environment::with_values(function.closure.clone(), args);

        let outcome = self.execute_block(&function.declaration.body, env)?;

        if function.is_initializer {
            if let ExecOutcome::Break { line } = outcome {
                return Err(RuntimeError::new(line, "Can't break outside of a loop."));
            }
            return Ok(function.bound_this().unwrap_or(Value::Nil));
        }

        match outcome {
            ExecOutcome::Normal => Ok(Value::Nil),
            ExecOutcome::Return { value, .. } => Ok(value),
            ExecOutcome::Break { line } => {
                Err(RuntimeError::new(line, "Can't break outside of a loop."))
            }
        }
    }

    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> IResult<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));

        if let Some(init) = class.find_method("init") {
            let bound = init.bind(Rc::clone(&instance));
            self.call_function(&bound, args)?;
        }

        debug!("Instantiated '{}'", class.name);

        Ok(Value::Instance(instance))
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────

fn binary(operator: &Token, left: Value, right: Value) -> IResult<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::String(a), Value::Number(b)) => Ok(Value::String(a + &format_number(b))),
            (Value::Number(a), Value::String(b)) => Ok(Value::String(format_number(a) + &b)),
            _ => Err(RuntimeError::new(
                operator.line,
                "Operands must be two numbers or two strings.",
            )),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        _ => {
            let (a, b) = match (left, right) {
                (Value::Number(a), Value::Number(b)) => (a, b),
                _ => return Err(RuntimeError::new(operator.line, "Operands must be numbers.")),
            };

            match operator.token_type {
                TokenType::MINUS => Ok(Value::Number(a - b)),
                TokenType::STAR => Ok(Value::Number(a * b)),
                TokenType::SLASH if b == 0.0 => {
                    Err(RuntimeError::new(operator.line, "Division by zero."))
                }
                TokenType::SLASH => Ok(Value::Number(a / b)),
                TokenType::GREATER => Ok(Value::Bool(a > b)),
                TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                TokenType::LESS => Ok(Value::Bool(a < b)),
                TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                _ => Err(invalid_operator(operator)),
            }
        }
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> IResult<()> {
    if expected == got {
        return Ok(());
    }

    Err(RuntimeError::new(
        paren.line,
        format!("Expected {} arguments but got {}.", expected, got),
    ))
}

fn invalid_operator(operator: &Token) -> RuntimeError {
    RuntimeError::new(
        operator.line,
        format!("Invalid operator '{}'.", operator.lexeme),
    )
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::new(name.line, format!("Undefined variable '{}'.", name.lexeme))
}

fn undefined_property(name: &Token) -> RuntimeError {
    RuntimeError::new(name.line, format!("Undefined property '{}'.", name.lexeme))
}
