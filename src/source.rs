//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los objetos que el compilador construye (tokens, nodos del AST,
//! errores de cualquier fase) llevan cuenta de la posición o rango
//! de posiciones del texto original del cual derivan. Esto permite
//! señalar el punto exacto o aproximado en el que ocurre un error.

use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una ubicación original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Archivo de entrada ya residente en memoria.
///
/// El driver lee el archivo completo antes de comenzar, por lo cual
/// el flujo de caracteres que alimenta al lexer es infalible y las
/// líneas quedan disponibles para reportes de diagnóstico.
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Construye un origen a partir de su nombre y contenido.
    pub fn new<N, T>(name: N, text: T) -> Rc<Source>
    where
        N: Into<String>,
        T: AsRef<str>,
    {
        let lines = text.as_ref().lines().map(str::to_owned).collect();
        Rc::new(Source {
            name: name.into(),
            lines,
        })
    }

    /// Nombre del origen, normalmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtiene el texto de una línea. Las líneas se numeran desde 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        self.lines
            .get(number.saturating_sub(1) as usize)
            .map(String::as_str)
    }

    /// Ubicación del primer carácter del origen.
    pub fn start(self: &Rc<Self>) -> Location {
        let position = Position::default();
        Location {
            source: Rc::clone(self),
            start: position,
            end: position.advance(),
        }
    }

    /// Itera carácter por carácter, cada uno con su ubicación.
    ///
    /// Toda línea termina en `'\n'`, incluso la última del archivo.
    pub fn stream(self: &Rc<Self>) -> impl Iterator<Item = (char, Location)> {
        let source = Rc::clone(self);
        let mut position = Position::default();

        let chars: Vec<char> = self
            .lines
            .iter()
            .flat_map(|line| line.chars().chain(std::iter::once('\n')))
            .collect();

        chars.into_iter().map(move |c| {
            let here = position;
            position = match c {
                '\n' => here.newline(),
                '\t' => here.tab(),
                _ => here.advance(),
            };

            let location = Location {
                source: Rc::clone(&source),
                start: here,
                end: here.advance(),
            };

            (c, location)
        })
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
///
/// El rango es semiabierto: `end` señala la posición inmediatamente
/// posterior al último carácter incluido.
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    start: Position,
    end: Position,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            source: from.source,
            start: from.start,
            end: to.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Obtiene la posición de fin (exclusiva).
    pub fn end(&self) -> Position {
        self.end
    }

    /// Origen al que refiere esta ubicación.
    pub fn source(&self) -> &Source {
        &self.source
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.source.name)?;

        if self.end == self.start.advance() {
            // Se señala una columna en específico
            write!(formatter, "{}", self.start)
        } else {
            write!(formatter, "[{}-{}]", self.start, self.end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo, ambas desde 1.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna, sin retroceder de línea.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}
