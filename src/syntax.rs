use crate::{
    lex::{ContextualizedToken, Token},
    SlangNumber,
};

/// Takes the parser and a pattern, consuming and returning the next token if it matches the pattern - otherwise returns a peek of the next token.
macro_rules! chase {
    ($parser:expr, $pattern:pat $(if $guard:expr)? $(,)?) => {{
        let ctx = $parser.peek(0);
        match &ctx.token {
            $pattern $(if $guard)? => {
                $parser.advance();
                Found(ctx.token)
            }
            _ => NotFound(ctx),
        }
    }};
}

#[derive(Debug, Clone)]
pub struct Parser<'t, 'src> {
    tokens: &'t [ContextualizedToken<'src>],
    position: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    /// `tokens` must end with `Token::EndOfFile`, as produced by `Lexer::lex`.
    pub fn new(tokens: &'t [ContextualizedToken<'src>]) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    pub fn parse(mut self) -> ParseModule<'src> {
        self.parse_module()
    }

    fn parse_module(&mut self) -> ParseModule<'src> {
        let mut module = Module::default();

        loop {
            match self.peek(0).token {
                Token::EndOfFile => break,
                Token::Function => {
                    self.advance();
                    module.functions.push(self.parse_fun_decl()?);
                }
                Token::Identifier(_) => module.globals.push(self.parse_global_decl()?),
                _ => return Err(ParseError::UnexpectedToken(self.peek(0))),
            }
        }

        Ok(module)
    }

    fn parse_global_decl(&mut self) -> Result<GlobalDecl<'src>, ParseError<'src>> {
        let start = self.peek(0);
        let expr = self.parse_assignment()?;

        if let NotFound(ctx) = chase!(self, Token::Semicolon) {
            return Err(ParseError::MissingSemicolon(ctx));
        }

        match expr {
            Expr::Assignment { identifier, expr } => Ok(GlobalDecl {
                identifier,
                expr: *expr,
            }),
            _ => Err(ParseError::InvalidGlobal(start)),
        }
    }

    fn parse_fun_decl(&mut self) -> Result<FunDecl<'src>, ParseError<'src>> {
        // Identifier
        let identifier = match chase!(self, Token::Identifier(_)) {
            Found(Token::Identifier(str)) => str,
            NotFound(ctx) => return Err(ParseError::ExpectedIdentifier(ctx)),
            _ => unreachable!(),
        };

        // Parameters
        let parameters = match chase!(self, Token::LeftParen) {
            Found(_) => self.parse_parameters()?,
            NotFound(ctx) => return Err(ParseError::ExpectedFunctionParameterList(ctx)),
        };

        // Body
        let body = match chase!(self, Token::LeftBrace) {
            Found(_) => self.parse_block()?,
            NotFound(ctx) => return Err(ParseError::ExpectedBody(ctx)),
        };

        Ok(FunDecl {
            identifier,
            parameters,
            body,
        })
    }

    fn parse_statement(&mut self) -> ParseStmt<'src> {
        match chase!(
            self,
            /*      Token            Statement */
            Token::LeftBrace        // Block
                | Token::If         // If
                | Token::While      // While
                | Token::Continue   // Continue
                | Token::Break      // Break
                | Token::Return // Return
        ) {
            Found(Token::LeftBrace) => self
                .parse_block()
                .map(|statements| Stmt::Block { statements }),
            Found(Token::If) => self.parse_if(),
            Found(Token::While) => self.parse_while(),
            Found(Token::Continue) => self.parse_continue(),
            Found(Token::Break) => self.parse_break(),
            Found(Token::Return) => self.parse_return(),
            NotFound(_) => self.parse_expr(),
            _ => unreachable!(),
        }
    }

    fn parse_block(&mut self) -> Result<Block<'src>, ParseError<'src>> {
        let mut statements = Vec::new();
        loop {
            match chase!(self, Token::RightBrace | Token::EndOfFile) {
                Found(Token::RightBrace) => break,
                Found(_) => return Err(ParseError::UnterminatedBlock(self.peek(0))),
                NotFound(_) => statements.push(self.parse_statement()?),
            }
        }
        Ok(statements)
    }

    fn parse_if(&mut self) -> ParseStmt<'src> {
        let condition = self.parse_condition()?;
        let branch = self.parse_statement()?;

        let else_branch = match chase!(self, Token::Else) {
            Found(_) => Some(Box::new(self.parse_statement()?)),
            NotFound(_) => None,
        };

        Ok(Stmt::If {
            condition,
            branch: Box::new(branch),
            else_branch,
        })
    }

    fn parse_while(&mut self) -> ParseStmt<'src> {
        let condition = self.parse_condition()?;
        let body = self.parse_statement()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    /// The parenthesized condition of an `if` or `while`.
    fn parse_condition(&mut self) -> ParseExpr<'src> {
        if let NotFound(ctx) = chase!(self, Token::LeftParen) {
            return Err(ParseError::MissingLeftParen(ctx));
        };

        let condition = self.parse_expression()?;

        if let NotFound(ctx) = chase!(self, Token::RightParen) {
            return Err(ParseError::UnmatchedParens(ctx));
        };

        Ok(condition)
    }

    fn parse_continue(&mut self) -> ParseStmt<'src> {
        match chase!(self, Token::Semicolon) {
            Found(_) => Ok(Stmt::Continue),
            NotFound(ctx) => Err(ParseError::MissingSemicolon(ctx)),
        }
    }

    fn parse_break(&mut self) -> ParseStmt<'src> {
        match chase!(self, Token::Semicolon) {
            Found(_) => Ok(Stmt::Break),
            NotFound(ctx) => Err(ParseError::MissingSemicolon(ctx)),
        }
    }

    fn parse_return(&mut self) -> ParseStmt<'src> {
        if let Found(_) = chase!(self, Token::Semicolon) {
            return Ok(Stmt::Return { expr: None });
        }

        let expr = self.parse_expression()?;

        match chase!(self, Token::Semicolon) {
            Found(_) => Ok(Stmt::Return { expr: Some(expr) }),
            NotFound(ctx) => Err(ParseError::MissingSemicolon(ctx)),
        }
    }

    fn parse_expr(&mut self) -> ParseStmt<'src> {
        let expr = self.parse_expression()?;

        match chase!(self, Token::Semicolon) {
            Found(_) => Ok(Stmt::Expr { expr }),
            NotFound(ctx) => Err(ParseError::MissingSemicolon(ctx)),
        }
    }

    fn parse_expression(&mut self) -> ParseExpr<'src> {
        self.parse_assignment()
    }

    /// An assignment is recognized by an identifier immediately followed by `=`, anything else falls through to a comparison.
    fn parse_assignment(&mut self) -> ParseExpr<'src> {
        if let (Token::Identifier(identifier), Token::Equal) =
            (self.peek(0).token, self.peek(1).token)
        {
            self.advance();
            self.advance();

            let value = self.parse_assignment()?;
            return Ok(Expr::Assignment {
                identifier,
                expr: Box::new(value),
            });
        }

        self.parse_comparison()
    }

    // The binary levels below recurse on their right operand, so `a - b - c` is `a - (b - c)`
    // and at most one comparison is accepted before nesting: `a < b < c` is `a < (b < c)`.

    fn parse_comparison(&mut self) -> ParseExpr<'src> {
        let expr = self.parse_term()?;

        match chase!(
            self,
            Token::EqualEqual
                | Token::BangEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual
        ) {
            Found(token) => Ok(Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::from(token),
                right: Box::new(self.parse_comparison()?),
            }),
            NotFound(_) => Ok(expr),
        }
    }

    fn parse_term(&mut self) -> ParseExpr<'src> {
        let expr = self.parse_factor()?;

        match chase!(self, Token::Plus | Token::Minus) {
            Found(token) => Ok(Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::from(token),
                right: Box::new(self.parse_term()?),
            }),
            NotFound(_) => Ok(expr),
        }
    }

    fn parse_factor(&mut self) -> ParseExpr<'src> {
        let expr = self.parse_unary()?;

        match chase!(self, Token::Star | Token::Slash) {
            Found(token) => Ok(Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::from(token),
                right: Box::new(self.parse_factor()?),
            }),
            NotFound(_) => Ok(expr),
        }
    }

    fn parse_unary(&mut self) -> ParseExpr<'src> {
        if let Found(token) = chase!(self, Token::Plus | Token::Minus | Token::Bang) {
            let op = UnaryOp::from(token);
            let right = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(right),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseExpr<'src> {
        match chase!(
            self,
            Token::Number(_) | Token::Identifier(_) | Token::LeftParen
        ) {
            Found(Token::Number(literal)) => literal
                .parse::<SlangNumber>()
                .map(Expr::Number)
                .map_err(|_| ParseError::InvalidNumber(self.previous())),
            Found(Token::Identifier(callee)) => match chase!(self, Token::LeftParen) {
                Found(_) => Ok(Expr::FunctionCall {
                    callee,
                    arguments: self.parse_arguments()?,
                }),
                NotFound(_) => Ok(Expr::Symbol { identifier: callee }),
            },
            Found(Token::LeftParen) => {
                let expr = self.parse_expression()?;
                match chase!(self, Token::RightParen) {
                    Found(_) => Ok(expr),
                    NotFound(ctx) => Err(ParseError::UnmatchedParens(ctx)),
                }
            }
            NotFound(ctx) => Err(ParseError::UnexpectedToken(ctx)),
            _ => unreachable!(),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr<'src>>, ParseError<'src>> {
        let mut arguments = vec![];

        if let NotFound(_) = chase!(self, Token::RightParen) {
            arguments.push(self.parse_expression()?);
            while let Found(_) = chase!(self, Token::Comma) {
                arguments.push(self.parse_expression()?);
            }

            if let NotFound(ctx) = chase!(self, Token::RightParen) {
                return Err(ParseError::UnmatchedParens(ctx));
            }
        }

        Ok(arguments)
    }

    fn parse_parameters(&mut self) -> Result<Vec<&'src str>, ParseError<'src>> {
        let mut parameters = vec![];

        if let NotFound(_) = chase!(self, Token::RightParen) {
            match chase!(self, Token::Identifier(_)) {
                Found(Token::Identifier(str)) => parameters.push(str),
                NotFound(ctx) => return Err(ParseError::ExpectedFunctionParameter(ctx)),
                _ => unreachable!(),
            }

            while let Found(_) = chase!(self, Token::Comma) {
                match chase!(self, Token::Identifier(_)) {
                    Found(Token::Identifier(str)) => parameters.push(str),
                    NotFound(ctx) => return Err(ParseError::ExpectedFunctionParameter(ctx)),
                    _ => unreachable!(),
                }
            }

            if let NotFound(ctx) = chase!(self, Token::RightParen) {
                return Err(ParseError::UnmatchedParens(ctx));
            }
        }

        Ok(parameters)
    }

    /// Looks `offset` tokens ahead without consuming, saturating at the trailing `EndOfFile`.
    fn peek(&self, offset: usize) -> ContextualizedToken<'src> {
        let last = self.tokens.len().saturating_sub(1);
        match self.tokens.get((self.position + offset).min(last)) {
            Some(ctx) => *ctx,
            None => ContextualizedToken {
                token: Token::EndOfFile,
                lexeme: "",
                index: 0,
                line: 1,
                column: 1,
            },
        }
    }

    fn previous(&self) -> ContextualizedToken<'src> {
        self.tokens[self.position.saturating_sub(1)]
    }

    fn advance(&mut self) {
        // Never step past the `EndOfFile` sentinel
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// The root of a parsed program.
#[derive(Debug, Clone, Default)]
pub struct Module<'a> {
    pub functions: Vec<FunDecl<'a>>,
    /// Global initializers, in declaration order.
    pub globals: Vec<GlobalDecl<'a>>,
}

#[derive(Debug, Clone)]
pub struct FunDecl<'a> {
    pub identifier: &'a str,
    pub parameters: Vec<&'a str>,
    pub body: Block<'a>,
}

/// A top-level `identifier = expr;`.
#[derive(Debug, Clone)]
pub struct GlobalDecl<'a> {
    pub identifier: &'a str,
    pub expr: Expr<'a>,
}

#[derive(Debug, Clone)]
pub enum Stmt<'a> {
    Block {
        statements: Block<'a>,
    },
    Break,
    Continue,
    Expr {
        expr: Expr<'a>,
    },
    If {
        condition: Expr<'a>,
        branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },
    Return {
        expr: Option<Expr<'a>>,
    },
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },
}

pub type Block<'a> = Vec<Stmt<'a>>;

#[derive(Debug, Clone)]
pub enum Expr<'a> {
    Assignment {
        identifier: &'a str,
        expr: Box<Expr<'a>>,
    },
    Binary {
        left: Box<Expr<'a>>,
        op: BinaryOp,
        right: Box<Expr<'a>>,
    },
    FunctionCall {
        callee: &'a str,
        arguments: Vec<Expr<'a>>,
    },
    Number(SlangNumber),
    Symbol {
        identifier: &'a str,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr<'a>>,
    },
}

#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum ParseError<'src> {
    #[error("Expected closing parenthesis instead of {0}.")]
    UnmatchedParens(ContextualizedToken<'src>),

    #[error("Expected a semicolon instead of {0}.")]
    MissingSemicolon(ContextualizedToken<'src>),

    #[error("Expected opening parenthesis before condition instead of {0}.")]
    MissingLeftParen(ContextualizedToken<'src>),

    #[error("Expected closing brace before {0}.")]
    UnterminatedBlock(ContextualizedToken<'src>),

    #[error("Expected identifier instead of {0}.")]
    ExpectedIdentifier(ContextualizedToken<'src>),

    #[error("Expected function body instead of {0}.")]
    ExpectedBody(ContextualizedToken<'src>),

    #[error("Expected function parameter list instead of {0}.")]
    ExpectedFunctionParameterList(ContextualizedToken<'src>),

    #[error("Expected identifier as parameter instead of {0}.")]
    ExpectedFunctionParameter(ContextualizedToken<'src>),

    #[error("Top-level statement starting at {0} must be a simple `name = expression` assignment.")]
    InvalidGlobal(ContextualizedToken<'src>),

    #[error("Number literal {0} failed to parse.")]
    InvalidNumber(ContextualizedToken<'src>),

    #[error("Unexpected token {0}.")]
    UnexpectedToken(ContextualizedToken<'src>),
}

impl<'src> ParseError<'src> {
    /// The token the parser stopped at.
    pub fn token(&self) -> &ContextualizedToken<'src> {
        match self {
            ParseError::UnmatchedParens(ctx)
            | ParseError::MissingSemicolon(ctx)
            | ParseError::MissingLeftParen(ctx)
            | ParseError::UnterminatedBlock(ctx)
            | ParseError::ExpectedIdentifier(ctx)
            | ParseError::ExpectedBody(ctx)
            | ParseError::ExpectedFunctionParameterList(ctx)
            | ParseError::ExpectedFunctionParameter(ctx)
            | ParseError::InvalidGlobal(ctx)
            | ParseError::InvalidNumber(ctx)
            | ParseError::UnexpectedToken(ctx) => ctx,
        }
    }
}

/// The type returned by the `chase!` macro.
enum Chased<'src> {
    Found(Token<'src>),
    NotFound(ContextualizedToken<'src>),
}

use Chased::*;

/// The unary operators.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicalNot,
}

impl<'a> From<Token<'a>> for UnaryOp {
    /// Constructs a `UnaryOp` from it's equivalent `Token` counterpart.
    /// Panics if the token is not a valid unary operator.
    fn from(token: Token<'a>) -> Self {
        match token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            Token::Bang => UnaryOp::LogicalNot,
            _ => unreachable!("Invalid token for unary operator"),
        }
    }
}

/// The binary operators.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BinaryOp {
    // Relational
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,

    // Arithmetic
    Add,
    Div,
    Mul,
    Sub,
}

impl<'a> From<Token<'a>> for BinaryOp {
    /// Constructs a `BinaryOp` from it's equivalent `Token` counterpart.
    /// Panics if the token is not a valid binary operator.
    fn from(token: Token<'a>) -> Self {
        match token {
            Token::BangEqual => BinaryOp::NotEqual,
            Token::EqualEqual => BinaryOp::Equal,
            Token::Greater => BinaryOp::GreaterThan,
            Token::GreaterEqual => BinaryOp::GreaterThanEqual,
            Token::Less => BinaryOp::LessThan,
            Token::LessEqual => BinaryOp::LessThanEqual,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            _ => unreachable!("Invalid token for binary operator"),
        }
    }
}

type ParseModule<'src> = Result<Module<'src>, ParseError<'src>>;
type ParseStmt<'src> = Result<Stmt<'src>, ParseError<'src>>;
type ParseExpr<'src> = Result<Expr<'src>, ParseError<'src>>;
