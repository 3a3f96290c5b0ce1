//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un flujo de
//! caracteres en unidades léxicas denominadas tokens. Los espacios en
//! blanco y los comentarios `/* ... */` se descartan durante esta
//! operación. Cada token emitido queda asociado a una ubicación en el
//! código fuente original, lo cual permite rastrear errores tanto en
//! los tokens como en constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Este lexer no produce lexemas para casos donde no son necesarios.
//! Operadores, puntuación y palabras clave se identifican por el hecho
//! de lo que son y no incluyen lexemas. Los identificadores sí incluyen
//! su lexema original, y las constantes literales se resuelven a sus
//! valores en vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores se componen únicamente de letras ASCII.
//! - Una letra seguida inmediatamente de un dígito, o un dígito seguido
//!   inmediatamente de una letra, es un error léxico.
//! - Las palabras clave son sensibles a mayúsculas: `IF` es un
//!   identificador, no una palabra clave.
//!
//! # Errores
//! El lexer es fail-fast: el primer error léxico aborta el análisis
//! completo. Ninguna fase posterior observa un token malformado.

use crate::source::{Located, Location, Source};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una letra fue seguida inmediatamente por un dígito.
    #[error("Identifiers may not contain digits")]
    DigitInWord,

    /// Un dígito fue seguido inmediatamente por una letra.
    #[error("Integer literals may not be followed by letters")]
    LetterInNumber,

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// El archivo terminó dentro de un comentario `/* ... */`.
    #[error("End of input inside a comment")]
    UnterminatedComment,
}

/// Un identificador.
///
/// El contenido es inmutable y compartido, por lo cual copiarlo entre
/// el AST y las tablas de símbolos es barato.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Divide,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `=`
    Assign,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// Fin del flujo. Una vez alcanzado, se repite indefinidamente.
    Eof,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Divide => fmt.write_str("`/`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Assign => fmt.write_str("`=`"),
            Semicolon => fmt.write_str("`;`"),
            Comma => fmt.write_str("`,`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenBracket => fmt.write_str("`[`"),
            CloseBracket => fmt.write_str("`]`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
            Eof => fmt.write_str("end of file"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Else,
    If,
    Int,
    Return,
    Void,
    While,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Else => "else",
            If => "if",
            Int => "int",
            Return => "return",
            Void => "void",
            While => "while",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("else", Else),
            ("if", If),
            ("int", Int),
            ("return", Return),
            ("void", Void),
            ("while", While),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La salida del
/// lexer, así como su siguiente estado, se define a partir de tanto su
/// estado actual como el siguiente carácter encontrado en el flujo de
/// entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
    last: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `/`.
    ///
    /// Puede seguir `*` para entrar en un comentario, o bien se trata
    /// del operador de división.
    Slash,

    /// Comentario `/* ... */`.
    Comment,

    /// Se encontró `*` dentro de un comentario.
    ///
    /// Debería seguir `/` para cerrar el comentario.
    CommentEnding,

    /// Se encontró `<`.
    InLess,

    /// Se encontró `>`.
    InGreater,

    /// Se encontró `=`.
    InEqual,

    /// Se encontró `!`, que solo puede formar `!=`.
    InNot,

    /// Constante entera.
    ///
    /// Este estado acumulará dígitos mientras que el siguiente
    /// carácter sea un dígito.
    Integer(i32),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: Iterator<Item = (char, Location)>> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        Lexer {
            source: source.peekable(),
            state: State::Start,
            next: start.clone(),
            last: start.clone(),
            start,
        }
    }

    /// Reduce la entrada completa a una secuencia de tokens.
    ///
    /// El primer error léxico aborta el análisis. En caso de éxito, el
    /// último token de la secuencia es siempre [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Located<Token>>, Located<LexerError>> {
        let mut tokens = Vec::new();
        while let Some(result) = self.next() {
            tokens.push(result?);
        }

        tokens.push(Located::at(Token::Eof, self.last.clone()));
        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        let token = loop {
            let next_char = self.source.peek().map(|(c, _)| *c);
            if let Some((_, location)) = self.source.peek() {
                self.next = location.clone();

                // La posición de origen se mueve junto a la posición
                // siguiente siempre que no se haya encontrado una
                // frontera de token
                if let Start = self.state {
                    self.start = location.clone();
                }
            }

            // Switch table principal, determina cambios de estado y de
            // salida del lexer a partir de combinaciones del estado
            // actual y el siguiente carácter
            match (&mut self.state, next_char) {
                (Start, None) => return Ok(None),

                // Tokens triviales
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('[')) => self.state = Complete(OpenBracket),
                (Start, Some(']')) => self.state = Complete(CloseBracket),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some('}')) => self.state = Complete(CloseCurly),

                // Operadores de uno o dos caracteres
                (Start, Some('/')) => self.state = Slash,
                (Start, Some('<')) => self.state = InLess,
                (Start, Some('>')) => self.state = InGreater,
                (Start, Some('=')) => self.state = InEqual,
                (Start, Some('!')) => self.state = InNot,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word(c.to_string()),

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica está implementada en el
                // caso del estado de constante entera para el cual el
                // siguiente carácter es un dígito. Por tanto, la
                // constante es inicialmente cero.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Eof)),

                // `/` inicia un comentario solo en la forma `/*`
                (Slash, Some('*')) => self.state = Comment,
                (Slash, _) => break Ok(Divide),

                // Los comentarios no anidan y deben cerrar antes de EOF
                (Comment, Some('*')) => self.state = CommentEnding,
                (Comment, Some(_)) => (),
                (Comment, None) => break Err(LexerError::UnterminatedComment),

                (CommentEnding, Some('/')) => self.state = Start,
                (CommentEnding, Some('*')) => (),
                (CommentEnding, Some(_)) => self.state = Comment,
                (CommentEnding, None) => break Err(LexerError::UnterminatedComment),

                (InLess, Some('=')) => self.state = Complete(LessEqual),
                (InLess, _) => break Ok(Less),

                (InGreater, Some('=')) => self.state = Complete(GreaterEqual),
                (InGreater, _) => break Ok(Greater),

                (InEqual, Some('=')) => self.state = Complete(Equal),
                (InEqual, _) => break Ok(Assign),

                (InNot, Some('=')) => self.state = Complete(NotEqual),
                (InNot, _) => break Err(LexerError::Expected('=')),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit.to_digit(10).unwrap() as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                (Integer(_), Some(c)) if c.is_ascii_alphabetic() => {
                    break Err(LexerError::LetterInNumber)
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                // Extensión de términos
                (Word(word), Some(c)) if c.is_ascii_alphabetic() => {
                    word.push(c);
                }

                (Word(_), Some(c)) if c.is_ascii_digit() => break Err(LexerError::DigitInWord),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier::from(std::mem::take(word).as_str())));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some((_, location)) = self.source.next() {
                self.last = location;
            }
        };

        token.map(Some)
    }
}

impl<S: Iterator<Item = (char, Location)>> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => Some(Err(Located::at(error, self.next.clone()))),
        }
    }
}

/// Escanea un origen completo.
///
/// Conveniencia que conecta [`Source::stream`] con el lexer y devuelve
/// el cursor de tokens que consume el parser.
pub fn scan(source: &Rc<Source>) -> Result<Tokens, Located<LexerError>> {
    let tokens = Lexer::new(source.start(), source.stream()).tokenize()?;
    Ok(Tokens::new(tokens))
}

/// Cursor de lectura sobre una secuencia escaneada de tokens.
///
/// Expone exactamente las dos operaciones que el parser necesita:
/// observar el token actual sin consumirlo y consumirlo avanzando al
/// siguiente. Una vez alcanzado [`Token::Eof`], ambas lo devuelven
/// indefinidamente.
#[derive(Debug)]
pub struct Tokens {
    stream: Vec<Located<Token>>,
    cursor: usize,
}

impl Tokens {
    /// Construye el cursor. El último token debe ser [`Token::Eof`].
    pub fn new(stream: Vec<Located<Token>>) -> Self {
        debug_assert!(matches!(
            stream.last().map(|token| token.as_ref()),
            Some(Token::Eof)
        ));

        Tokens { stream, cursor: 0 }
    }

    /// Observa el token actual sin consumirlo.
    pub fn peek(&self) -> &Located<Token> {
        &self.stream[self.cursor]
    }

    /// Consume y devuelve el token actual.
    pub fn next(&mut self) -> Located<Token> {
        let token = self.stream[self.cursor].clone();
        if self.cursor + 1 < self.stream.len() {
            self.cursor += 1;
        }

        token
    }
}
