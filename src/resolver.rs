//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of name → [`Variable`] tables tracking
//!    declared / defined / read and the slot each name occupies).
//! 2. Report static errors (redeclaration, read in own initializer, misplaced
//!    `break`, `return`, `this` or `super`) and unused‑local warnings.
//! 3. Record, for *each* local variable occurrence, its `(distance, slot)`
//!    address.  Globals stay out of the table and are looked up by name.
//!
//! The resolver only reads the tree; its output is a [`Resolution`].  The
//! scopes it opens mirror, one for one, the environments the interpreter
//! creates: blocks, calls, the `super` frame of a subclass and the `this`
//! frame of a bound method.

use crate::ast::{ClassDecl, ElseIf, Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Warning};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// Lexical address of a resolved local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    /// Number of environment links to walk outward.
    pub distance: usize,
    /// Index into that environment's slot vector.
    pub slot: usize,
}

/// Everything a resolve pass produces.
#[derive(Debug, Default)]
pub struct Resolution {
    pub locals: HashMap<ExprId, Local>,
    pub errors: Vec<LoxError>,
    /// Sorted by line; declaration order within a line.
    pub warnings: Vec<Warning>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VariableState {
    Declared,
    Defined,
    Read,
}

#[derive(Debug)]
struct Variable {
    name: Token,
    slot: usize,
    state: VariableState,
}

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
    StaticMethod,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// addresses for the interpreter.
pub struct Resolver {
    scopes: Vec<HashMap<String, Variable>>,
    current_function: FunctionType,
    current_class: ClassType,
    in_loop: bool,
    /// Inside a static method body, at any function depth, of the
    /// innermost class.
    in_static: bool,
    resolution: Resolution,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            in_loop: false,
            in_static: false,
            resolution: Resolution::default(),
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(mut self, statements: &[Stmt]) -> Resolution {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        let mut resolution = self.resolution;
        resolution.warnings.sort_by_key(|w| w.line);

        info!(
            "Resolved {} local reference(s), {} error(s), {} warning(s)",
            resolution.locals.len(),
            resolution.errors.len(),
            resolution.warnings.len()
        );

        resolution
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // The name is visible inside its own body (recursion).
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(name);
                }
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Class(class) => self.resolve_class(class),

            Stmt::Expression(expr) | Stmt::Print { value: expr, .. } => self.resolve_expr(expr),

            Stmt::If {
                condition,
                then_branch,
                else_ifs,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                for ElseIf { condition, body } in else_ifs {
                    self.resolve_expr(condition);
                    self.resolve_stmt(body);
                }
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                let enclosing = self.in_loop;
                self.in_loop = true;

                self.resolve_expr(condition);
                self.resolve_stmt(body);

                self.in_loop = enclosing;
            }

            Stmt::Break { keyword } => {
                if !self.in_loop {
                    self.error(keyword, "Can't break outside of a loop.");
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    /// Scope layout: `[super]` → static methods, then `[this]` → instance
    /// methods.  Must match `Interpreter::define_class` and
    /// `LoxFunction::bind`.
    fn resolve_class(&mut self, class: &ClassDecl) {
        let enclosing_class = self.current_class;
        let enclosing_static = self.in_static;
        self.current_class = ClassType::Class;
        self.in_static = false;

        self.declare(&class.name);
        self.define(&class.name);

        if let Some(superclass) = &class.superclass {
            if let Expr::Variable { name, .. } = superclass {
                if name.lexeme == class.name.lexeme {
                    self.error(name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.define_synthetic("super", class.name.line);
        }

        self.in_static = true;
        for method in &class.static_methods {
            self.resolve_function(method, FunctionType::StaticMethod);
        }
        self.in_static = false;

        self.begin_scope();
        self.define_synthetic("this", class.name.line);

        for method in &class.methods {
            let kind = if method.display_name() == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if class.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        self.in_static = enclosing_static;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::Comma(expressions) => {
                for e in expressions {
                    self.resolve_expr(e);
                }
            }

            Expr::Variable { id, name } => {
                let declared_only = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .is_some_and(|v| v.state == VariableState::Declared);

                if declared_only {
                    self.error(name, "Can't read local variable in its own initializer.");
                }

                self.resolve_local(*id, name, true);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS; a write is not a read.
                self.resolve_expr(value);
                self.resolve_local(*id, name, false);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                if self.in_static {
                    self.error(keyword, "Can't use 'this' in a static method.");
                    return;
                }
                self.resolve_local(*id, keyword, true);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.")
                    }
                    ClassType::Class => self.error(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ),
                    ClassType::Subclass if self.in_static => {
                        self.error(keyword, "Can't use 'super' in a static method.")
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword, true);
            }

            Expr::Lambda(decl) => self.resolve_function(decl, FunctionType::Function),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.  Loops do not
    /// reach into nested functions.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        let enclosing_loop = self.in_loop;
        self.current_function = kind;
        self.in_loop = false;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
        self.in_loop = enclosing_loop;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, warning about every local never read, in
    /// declaration order.
    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        let mut unused: Vec<Variable> = scope
            .into_values()
            .filter(|v| v.state == VariableState::Defined)
            .collect();
        unused.sort_unstable_by_key(|v| v.slot);

        for variable in unused {
            self.resolution.warnings.push(Warning {
                line: variable.name.line,
                message: format!("Unused local variable '{}'.", variable.name.lexeme),
            });
        }
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        let slot = scope.len();
        scope.insert(
            name.lexeme.clone(),
            Variable {
                name: name.clone(),
                slot,
                state: VariableState::Declared,
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(variable) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.lexeme))
        {
            if variable.state == VariableState::Declared {
                variable.state = VariableState::Defined;
            }
        }
    }

    /// `this` / `super`: slot 0 of their own scope, never reported unused.
    fn define_synthetic(&mut self, lexeme: &str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            let slot = scope.len();
            scope.insert(
                lexeme.to_string(),
                Variable {
                    name: Token::synthetic(lexeme, line),
                    slot,
                    state: VariableState::Read,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑address helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at `(distance, slot)`, or leave it
    /// out of the table when no scope declares it (a global).
    fn resolve_local(&mut self, id: ExprId, name: &Token, is_read: bool) {
        for (distance, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(variable) = scope.get_mut(&name.lexeme) {
                if is_read {
                    variable.state = VariableState::Read;
                }

                let local = Local {
                    distance,
                    slot: variable.slot,
                };
                debug!("Resolved '{}' at {:?}", name.lexeme, local);

                self.resolution.locals.insert(id, local);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.resolution.errors.push(LoxError::resolve(token, message));
    }
}
