use std::{
    fmt::Display,
    io::{self, Write},
    mem::replace,
};

use fnv::FnvHashMap;

use crate::{
    syntax::{BinaryOp, Block, Expr, FunDecl, Module, Stmt, UnaryOp},
    SlangNumber,
};

/// The name of the function invoked to run a program.
pub const ENTRY_POINT: &str = "main";

/// The built-in that writes its arguments to the output.
pub const PRINT: &str = "print";

/// Interprets `module`, writing `print` output to stdout.
pub fn interpret<'src>(module: &Module<'src>) -> Evaluation<'src> {
    TreeWalker::default().interpret(module)
}

/// A name to value mapping, used both for the globals and for a function call's locals.
type Scope<'src> = FnvHashMap<&'src str, SlangNumber>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError<'src> {
    #[error("Variable \"{0}\" is not in scope.")]
    UnknownVariable(&'src str),

    #[error("Function \"{0}\" is not defined.")]
    UnknownFunction(&'src str),

    #[error("Mismatched argument count calling \"{function}\", expected ({expected}) but got ({got}).")]
    MismatchedArity {
        function: &'src str,
        expected: usize,
        got: usize,
    },

    #[error("`{flow}` escaped the body of function \"{function}\" without an enclosing loop.")]
    StrayControlFlow {
        function: &'src str,
        flow: ControlFlow,
    },

    #[error("Failed to write program output: {0}")]
    Output(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    /// A `return` without an expression carries `0.0`.
    Return(SlangNumber),
}

impl Display for ControlFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Break => write!(f, "break"),
            Self::Continue => write!(f, "continue"),
            Self::Return(v) => write!(f, "return {v:?}"),
        }
    }
}

/// The result of executing a statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stated {
    /// Execution fell through to the next statement.
    Nothing,

    /// Some control flow operation was produced, such as a `break`, `continue` or `return`.
    /// Will be propagated up the statement stack until it is handled.
    ControlFlow(ControlFlow),
}

type Execution<'src> = Result<Stated, RuntimeError<'src>>;
pub type Evaluation<'src> = Result<SlangNumber, RuntimeError<'src>>;

/// Our tree-walk interpreter.
///
/// `'m` borrows the module being run, `'src` the source text its names point into.
#[derive(Debug)]
pub struct TreeWalker<'m, 'src, W = io::Stdout> {
    functions: FnvHashMap<&'src str, &'m FunDecl<'src>>,
    globals: Scope<'src>,
    /// The locals of the active call. While the globals are initialized it is a frame of its own.
    frame: Scope<'src>,
    output: W,
}

impl<'m, 'src> TreeWalker<'m, 'src, io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<'m, 'src> Default for TreeWalker<'m, 'src, io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'m, 'src, W: Write> TreeWalker<'m, 'src, W> {
    /// Creates an interpreter whose `print` built-in writes to `output`.
    pub fn with_output(output: W) -> Self {
        Self {
            functions: FnvHashMap::default(),
            globals: Scope::default(),
            frame: Scope::default(),
            output,
        }
    }

    /// Registers the functions, initializes the globals in declaration order and runs `main`.
    /// Programs without a `main` evaluate to `0.0`.
    pub fn interpret(mut self, module: &'m Module<'src>) -> Evaluation<'src> {
        // A later definition with the same name replaces the earlier one
        self.functions = module
            .functions
            .iter()
            .map(|function| (function.identifier, function))
            .collect();

        for global in &module.globals {
            let value = self.evaluate_expression(&global.expr)?;
            self.globals.insert(global.identifier, value);
        }

        match self.functions.get(ENTRY_POINT).copied() {
            Some(main) => self.perform_function_call(main, Vec::new()),
            None => Ok(0.0),
        }
    }

    fn execute_statement(&mut self, statement: &'m Stmt<'src>) -> Execution<'src> {
        match statement {
            Stmt::Block { statements } => self.perform_block(statements),
            Stmt::Break => Ok(Stated::ControlFlow(ControlFlow::Break)),
            Stmt::Continue => Ok(Stated::ControlFlow(ControlFlow::Continue)),
            Stmt::Expr { expr } => self.evaluate_expression(expr).map(|_| Stated::Nothing),
            Stmt::If {
                condition,
                branch,
                else_branch,
            } => self.execute_if(condition, branch, else_branch.as_deref()),
            Stmt::Return { expr } => self.execute_return(expr.as_ref()),
            Stmt::While { condition, body } => self.execute_while(condition, body),
        }
    }

    fn execute_if(
        &mut self,
        condition: &'m Expr<'src>,
        branch: &'m Stmt<'src>,
        else_branch: Option<&'m Stmt<'src>>,
    ) -> Execution<'src> {
        if is_truthy(self.evaluate_expression(condition)?) {
            self.execute_statement(branch)
        } else if let Some(else_branch) = else_branch {
            self.execute_statement(else_branch)
        } else {
            Ok(Stated::Nothing)
        }
    }

    fn execute_while(&mut self, condition: &'m Expr<'src>, body: &'m Stmt<'src>) -> Execution<'src> {
        while is_truthy(self.evaluate_expression(condition)?) {
            if let Stated::ControlFlow(control_flow) = self.execute_statement(body)? {
                match control_flow {
                    ControlFlow::Break => break,
                    ControlFlow::Continue => continue,
                    ret @ ControlFlow::Return(_) => return Ok(Stated::ControlFlow(ret)),
                }
            }
        }

        Ok(Stated::Nothing)
    }

    fn execute_return(&mut self, expr: Option<&'m Expr<'src>>) -> Execution<'src> {
        let value = if let Some(expr) = expr {
            self.evaluate_expression(expr)?
        } else {
            0.0
        };

        Ok(Stated::ControlFlow(ControlFlow::Return(value)))
    }

    fn perform_block(&mut self, statements: &'m Block<'src>) -> Execution<'src> {
        for statement in statements {
            if let flow @ Stated::ControlFlow(_) = self.execute_statement(statement)? {
                // Propagate the control flow up the statement chain
                return Ok(flow);
            }
        }

        Ok(Stated::Nothing)
    }

    fn evaluate_expression(&mut self, expr: &'m Expr<'src>) -> Evaluation<'src> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Symbol { identifier } => self.evaluate_symbol(*identifier),
            Expr::Assignment { identifier, expr } => {
                let value = self.evaluate_expression(expr)?;
                self.set_symbol(*identifier, value);
                Ok(value)
            }
            Expr::Binary { left, op, right } => self.evaluate_binary(left, *op, right),
            Expr::Unary { op, expr } => self.evaluate_unary(*op, expr),
            Expr::FunctionCall { callee, arguments } => {
                self.evaluate_function_call(*callee, arguments)
            }
        }
    }

    fn evaluate_function_call(
        &mut self,
        callee: &'src str,
        arguments: &'m [Expr<'src>],
    ) -> Evaluation<'src> {
        // Arguments are evaluated in the caller's frame, before anything else happens
        let arguments = arguments
            .iter()
            .map(|expr| self.evaluate_expression(expr))
            .collect::<Result<Vec<SlangNumber>, RuntimeError>>()?;

        if callee == PRINT {
            return self.perform_print(&arguments);
        }

        match self.functions.get(callee).copied() {
            Some(function) => self.perform_function_call(function, arguments),
            None => Err(RuntimeError::UnknownFunction(callee)),
        }
    }

    fn perform_function_call(
        &mut self,
        callee: &'m FunDecl<'src>,
        arguments: Vec<SlangNumber>,
    ) -> Evaluation<'src> {
        if arguments.len() != callee.parameters.len() {
            return Err(RuntimeError::MismatchedArity {
                function: callee.identifier,
                expected: callee.parameters.len(),
                got: arguments.len(),
            });
        }

        // Parameters are bound straight into the fresh frame, shadowing any global of the same name
        let frame = callee
            .parameters
            .iter()
            .copied()
            .zip(arguments)
            .collect::<Scope<'src>>();

        // Temporarily replace the caller's frame with the callee's
        let backup = replace(&mut self.frame, frame);
        let result = self.perform_block(&callee.body);
        self.frame = backup;

        match result? {
            Stated::Nothing => Ok(0.0),
            Stated::ControlFlow(ControlFlow::Return(value)) => Ok(value),
            Stated::ControlFlow(flow) => Err(RuntimeError::StrayControlFlow {
                function: callee.identifier,
                flow,
            }),
        }
    }

    fn perform_print(&mut self, arguments: &[SlangNumber]) -> Evaluation<'src> {
        let line = arguments
            .iter()
            .map(|value| format!("{value:?}"))
            .collect::<Vec<_>>()
            .join(" ");

        writeln!(self.output, "{line}").map_err(RuntimeError::Output)?;
        Ok(0.0)
    }

    fn evaluate_binary(
        &mut self,
        left: &'m Expr<'src>,
        op: BinaryOp,
        right: &'m Expr<'src>,
    ) -> Evaluation<'src> {
        let left = self.evaluate_expression(left)?;
        let right = self.evaluate_expression(right)?;

        // Division by zero is left to IEEE-754: infinities and NaN propagate
        Ok(match op {
            // Relational
            BinaryOp::Equal => from_bool(left == right),
            BinaryOp::NotEqual => from_bool(left != right),
            BinaryOp::GreaterThan => from_bool(left > right),
            BinaryOp::GreaterThanEqual => from_bool(left >= right),
            BinaryOp::LessThan => from_bool(left < right),
            BinaryOp::LessThanEqual => from_bool(left <= right),

            // Arithmetic
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
        })
    }

    fn evaluate_unary(&mut self, op: UnaryOp, expr: &'m Expr<'src>) -> Evaluation<'src> {
        let value = self.evaluate_expression(expr)?;
        Ok(match op {
            UnaryOp::Plus => value,
            UnaryOp::Minus => -value,
            UnaryOp::LogicalNot => from_bool(!is_truthy(value)),
        })
    }

    fn evaluate_symbol(&self, identifier: &'src str) -> Evaluation<'src> {
        self.frame
            .get(identifier)
            .or_else(|| self.globals.get(identifier))
            .copied()
            .ok_or(RuntimeError::UnknownVariable(identifier))
    }

    /// Updates the local if there is one, then the global, otherwise declares a new local.
    fn set_symbol(&mut self, identifier: &'src str, value: SlangNumber) {
        if let Some(local) = self.frame.get_mut(identifier) {
            *local = value;
        } else if let Some(global) = self.globals.get_mut(identifier) {
            *global = value;
        } else {
            self.frame.insert(identifier, value);
        }
    }
}

fn is_truthy(value: SlangNumber) -> bool {
    value != 0.0
}

fn from_bool(b: bool) -> SlangNumber {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, syntax::Parser};

    fn parse(source: &str) -> Module<'_> {
        let tokens = Lexer::new(source).lex().expect("source should lex");
        Parser::new(&tokens).parse().expect("source should parse")
    }

    fn eval(source: &str) -> Evaluation<'_> {
        let module = parse(source);
        TreeWalker::with_output(io::sink()).interpret(&module)
    }

    fn printed(source: &str) -> String {
        let module = parse(source);
        let mut output = Vec::new();
        TreeWalker::with_output(&mut output)
            .interpret(&module)
            .expect("program should run");
        String::from_utf8(output).expect("output should be UTF-8")
    }

    #[test]
    fn programs_without_main_evaluate_to_zero() {
        assert_eq!(eval("").unwrap(), 0.0);
        assert_eq!(eval("x = 5; function helper() { return x; }").unwrap(), 0.0);
    }

    #[test]
    fn globals_initialize_in_declaration_order() {
        assert_eq!(
            eval("a = 1; b = a + 1; function main() { return b; }").unwrap(),
            2.0
        );
        assert!(matches!(
            eval("b = a + 1; a = 1;"),
            Err(RuntimeError::UnknownVariable("a"))
        ));
    }

    #[test]
    fn global_initializers_can_call_functions() {
        assert_eq!(
            eval("x = two() * 3; function two() { return 2; } function main() { return x; }")
                .unwrap(),
            6.0
        );
    }

    #[test]
    fn assignment_to_an_unbound_name_creates_a_local() {
        assert!(matches!(
            eval("function f() { y = 5; } function main() { f(); return y; }"),
            Err(RuntimeError::UnknownVariable("y"))
        ));
    }

    #[test]
    fn assignment_to_a_global_updates_it() {
        assert_eq!(
            eval("g = 1; function bump() { g = g + 1; } function main() { bump(); bump(); return g; }")
                .unwrap(),
            3.0
        );
    }

    #[test]
    fn parameters_shadow_globals() {
        assert_eq!(
            eval("x = 10; function f(x) { x = x + 1; return x; } function main() { return f(1) + x; }")
                .unwrap(),
            12.0
        );
    }

    #[test]
    fn locals_declared_in_nested_blocks_share_the_frame() {
        assert_eq!(
            eval("function main() { if (1) { { y = 3; } } return y; }").unwrap(),
            3.0
        );
    }

    #[test]
    fn recursion_gets_a_frame_per_call() {
        let source = "
            function fib(n) {
                if (n < 2) return n;
                a = fib(n - 1);
                b = fib(n - 2);
                return a + b;
            }
            function main() { return fib(15); }
        ";
        assert_eq!(eval(source).unwrap(), 610.0);
    }

    #[test]
    fn missing_return_values_default_to_zero() {
        assert_eq!(
            eval("function f() { return; } function g() { x = 1; } function main() { return f() + g() + 1; }")
                .unwrap(),
            1.0
        );
    }

    #[test]
    fn assignment_evaluates_to_the_assigned_value() {
        assert_eq!(eval("function main() { return x = 4; }").unwrap(), 4.0);
        assert_eq!(
            eval("function main() { a = b = 2; return a * b; }").unwrap(),
            4.0
        );
    }

    #[test]
    fn continue_skips_to_the_next_iteration() {
        let source = "function main() {
            i = 0; s = 0;
            while (i < 5) { i = i + 1; if (i == 3) continue; s = s + i; }
            return s;
        }";
        assert_eq!(eval(source).unwrap(), 12.0);
    }

    #[test]
    fn break_exits_only_the_innermost_loop() {
        let source = "function main() {
            i = 0; n = 0;
            while (i < 3) {
                i = i + 1;
                j = 0;
                while (1) { j = j + 1; n = n + 1; if (j == 2) break; }
            }
            return n;
        }";
        assert_eq!(eval(source).unwrap(), 6.0);
    }

    #[test]
    fn return_leaves_loops_and_the_function() {
        assert_eq!(
            eval("function main() { while (1) { while (1) { return 9; } } return 1; }").unwrap(),
            9.0
        );
    }

    #[test]
    fn break_cannot_escape_a_function() {
        assert!(matches!(
            eval("function f() { break; } function main() { while (1) { f(); } return 1; }"),
            Err(RuntimeError::StrayControlFlow {
                function: "f",
                flow: ControlFlow::Break,
            })
        ));
        assert!(matches!(
            eval("function main() { continue; }"),
            Err(RuntimeError::StrayControlFlow {
                function: "main",
                flow: ControlFlow::Continue,
            })
        ));
    }

    #[test]
    fn arity_must_match_exactly() {
        assert!(matches!(
            eval("function f(a, b) { return a; } function main() { return f(1); }"),
            Err(RuntimeError::MismatchedArity {
                function: "f",
                expected: 2,
                got: 1,
            })
        ));
        assert!(matches!(
            eval("function f() { return 1; } function main() { return f(1, 2); }"),
            Err(RuntimeError::MismatchedArity { expected: 0, got: 2, .. })
        ));
    }

    #[test]
    fn unknown_names_are_fatal() {
        assert!(matches!(
            eval("function main() { return nope(); }"),
            Err(RuntimeError::UnknownFunction("nope"))
        ));
        assert!(matches!(
            eval("function main() { return nope; }"),
            Err(RuntimeError::UnknownVariable("nope"))
        ));
    }

    #[test]
    fn main_with_parameters_cannot_be_entered() {
        assert!(matches!(
            eval("function main(argc) { return argc; }"),
            Err(RuntimeError::MismatchedArity { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn the_last_definition_of_a_function_wins() {
        assert_eq!(
            eval("function f() { return 1; } function f() { return 2; } function main() { return f(); }")
                .unwrap(),
            2.0
        );
    }

    #[test]
    fn comparisons_and_not_produce_one_or_zero() {
        assert_eq!(
            eval("function main() { return (1 < 2) + (2 <= 2) + (3 > 4) + (4 >= 5) + (1 == 1) + (1 != 1); }")
                .unwrap(),
            3.0
        );
        assert_eq!(eval("function main() { return !0 + !7; }").unwrap(), 1.0);
        assert_eq!(eval("function main() { return -+-2; }").unwrap(), 2.0);
    }

    #[test]
    fn arithmetic_groups_to_the_right() {
        assert_eq!(eval("function main() { return 10 - 2 - 3; }").unwrap(), 11.0);
        assert_eq!(eval("function main() { return (10 - 2) - 3; }").unwrap(), 5.0);
        assert_eq!(eval("function main() { return 8 / 4 / 2; }").unwrap(), 4.0);
        assert_eq!(eval("function main() { return 1 < 2 < 3; }").unwrap(), 0.0);
    }

    #[test]
    fn division_by_zero_follows_ieee_754() {
        assert_eq!(eval("function main() { return 1 / 0; }").unwrap(), SlangNumber::INFINITY);
        assert_eq!(
            eval("function main() { return -1 / 0; }").unwrap(),
            SlangNumber::NEG_INFINITY
        );
        assert!(eval("function main() { return 0 / 0; }").unwrap().is_nan());
        assert_eq!(
            eval("function main() { n = 0 / 0; return (n == n) + (n != n) * 10; }").unwrap(),
            10.0
        );
    }

    #[test]
    fn print_writes_space_separated_values() {
        assert_eq!(
            printed("function main() { print(1, 2.5, -3); print(); print(1 / 0); return 0; }"),
            "1.0 2.5 -3.0\n\ninf\n"
        );
    }

    #[test]
    fn print_spells_non_finite_and_large_values_like_rust() {
        assert_eq!(
            printed("function main() { print(0 / 0, -1 / 0, 10000000000000000); }"),
            "NaN -inf 1e16\n"
        );
    }

    #[test]
    fn print_evaluates_to_zero_and_shadows_user_functions() {
        assert_eq!(
            printed("function print(a) { return 5; } function main() { print(print(7)); }"),
            "7.0\n0.0\n"
        );
    }

    #[test]
    fn arguments_are_evaluated_left_to_right_before_the_call() {
        assert_eq!(
            printed("function f(a, b) { print(a, b); } function main() { f(print(1), print(2)); }"),
            "1.0\n2.0\n0.0 0.0\n"
        );
    }

    #[test]
    fn interpreting_a_module_twice_gives_the_same_result() {
        let module = parse("x = 5; function main() { x = x + 1; return x; }");

        for _ in 0..3 {
            assert_eq!(
                TreeWalker::with_output(io::sink()).interpret(&module).unwrap(),
                6.0
            );
        }
    }
}
