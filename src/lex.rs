use std::{fmt::Display, iter::Peekable, str::CharIndices};

#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    source_data: &'src str,
    source: Peekable<CharIndices<'src>>,
    line: u32,
    line_start: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source_data: source,
            source: source.char_indices().peekable(),
            line: 1,
            line_start: 0,
        }
    }

    /// Scans the whole source, stopping at the first character that starts no token.
    /// The returned sequence always ends with a `Token::EndOfFile` sentinel.
    pub fn lex(mut self) -> Result<Vec<ContextualizedToken<'src>>, LexError> {
        let mut tokens = Vec::new();

        while let Some((start, c)) = self.source.next() {
            // The line counter can be modified inside `process_char` so save the position here before calling it
            let line = self.line;
            let column = self.column_of(start);

            if let Some(token) = self.process_char(start, c, line, column)? {
                tokens.push(ContextualizedToken {
                    token,
                    lexeme: self.lexeme_from(start),
                    index: tokens.len(),
                    line,
                    column,
                });
            }
        }

        tokens.push(ContextualizedToken {
            token: Token::EndOfFile,
            lexeme: "",
            index: tokens.len(),
            line: self.line,
            column: self.column_of(self.source_data.len()),
        });

        Ok(tokens)
    }

    fn process_char(
        &mut self,
        start: usize,
        c: char,
        line: u32,
        column: u32,
    ) -> Result<Option<Token<'src>>, LexError> {
        match c {
            // Single characters
            ',' => Ok(Some(Token::Comma)),
            ';' => Ok(Some(Token::Semicolon)),
            '(' => Ok(Some(Token::LeftParen)),
            ')' => Ok(Some(Token::RightParen)),
            '{' => Ok(Some(Token::LeftBrace)),
            '}' => Ok(Some(Token::RightBrace)),
            '+' => Ok(Some(Token::Plus)),
            '-' => Ok(Some(Token::Minus)),
            '*' => Ok(Some(Token::Star)),
            '/' => Ok(Some(Token::Slash)),

            // One to two characters
            '=' if self.chase('=') => Ok(Some(Token::EqualEqual)),
            '=' => Ok(Some(Token::Equal)),

            '!' if self.chase('=') => Ok(Some(Token::BangEqual)),
            '!' => Ok(Some(Token::Bang)),

            '<' if self.chase('=') => Ok(Some(Token::LessEqual)),
            '<' => Ok(Some(Token::Less)),

            '>' if self.chase('=') => Ok(Some(Token::GreaterEqual)),
            '>' => Ok(Some(Token::Greater)),

            // Line comment
            '#' => {
                self.consume_until_delimiter('\n');
                Ok(None)
            }

            // Numeric literals, the fractional part is optional
            c if c.is_ascii_digit() => {
                if let Some((_, '.')) = self.consume_while(char::is_ascii_digit) {
                    self.source.next();
                    self.consume_while(char::is_ascii_digit);
                }

                Ok(Some(Token::Number(self.lexeme_from(start))))
            }

            // Newlines.
            // The whitespace check in the arm below catches the newline symbol so it has to be handled before said check.
            '\n' => {
                self.line += 1;
                self.line_start = start + 1;
                Ok(None)
            }

            // Whitespace
            c if c.is_whitespace() => Ok(None),

            // Identifiers | Keywords
            c if c.is_alphabetic() => {
                self.consume_while(|c| c.is_alphanumeric());
                let identifier = self.lexeme_from(start);

                Ok(Self::as_keyword(identifier).or(Some(Token::Identifier(identifier))))
            }

            // Unknown character
            character => Err(LexError::UnexpectedCharacter {
                character,
                line,
                column,
            }),
        }
    }

    fn chase(&mut self, expected: char) -> bool {
        self.source.next_if(|(_, c)| *c == expected).is_some()
    }

    fn consume_until_delimiter(&mut self, delimiter: char) {
        while self.source.next_if(|(_, c)| *c != delimiter).is_some() {}
    }

    fn consume_while(&mut self, f: impl Fn(&char) -> bool) -> Option<(usize, char)> {
        while self.source.next_if(|(_, c)| f(c)).is_some() {}
        self.source.peek().copied()
    }

    /// The source text from `start` up to (not including) the next unconsumed character.
    fn lexeme_from(&mut self, start: usize) -> &'src str {
        if let Some((end, _)) = self.source.peek() {
            &self.source_data[start..*end]
        } else {
            &self.source_data[start..]
        }
    }

    fn column_of(&self, offset: usize) -> u32 {
        let column = self.source_data[self.line_start..offset].chars().count() + 1;
        u32::try_from(column).unwrap_or(u32::MAX)
    }

    fn as_keyword(text: &str) -> Option<Token<'src>> {
        match text {
            "function" => Some(Token::Function),
            "if" => Some(Token::If),
            "else" => Some(Token::Else),
            "while" => Some(Token::While),
            "continue" => Some(Token::Continue),
            "break" => Some(Token::Break),
            "return" => Some(Token::Return),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Token<'src> {
    // One character
    Comma,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    Bang,
    Less,
    Greater,
    // Two characters
    EqualEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,
    // Literals
    Identifier(&'src str),
    /// The literal digits, converted to a number by the parser.
    Number(&'src str),
    // Keywords
    Function,
    If,
    Else,
    While,
    Continue,
    Break,
    Return,
    EndOfFile,
}

impl<'src> Display for Token<'src> {
    /// Writes the canonical spelling of the token, re-lexing it yields the same token.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Equal => "=",
            Token::Bang => "!",
            Token::Less => "<",
            Token::Greater => ">",
            Token::EqualEqual => "==",
            Token::BangEqual => "!=",
            Token::LessEqual => "<=",
            Token::GreaterEqual => ">=",
            Token::Identifier(text) | Token::Number(text) => *text,
            Token::Function => "function",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Continue => "continue",
            Token::Break => "break",
            Token::Return => "return",
            Token::EndOfFile => "",
        };

        write!(f, "{text}")
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ContextualizedToken<'src> {
    pub token: Token<'src>,
    pub lexeme: &'src str,
    /// Position of the token in the lexed sequence.
    pub index: usize,
    pub line: u32,
    pub column: u32,
}

impl<'src> Display for ContextualizedToken<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lexeme = if let Token::EndOfFile = self.token {
            "EOF"
        } else {
            self.lexeme
        };

        write!(
            f,
            "\"{}\" (token #{}) @ line {}, column {}",
            lexeme, self.index, self.line, self.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character \"{character}\" @ line {line}, column {column}.")]
    UnexpectedCharacter {
        character: char,
        line: u32,
        column: u32,
    },
}
