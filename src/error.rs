//! Reporte de diagnósticos.
//!
//! Toda fase del compilador produce errores con ubicación asociada.
//! [`Diagnostics`] los presenta en un formato uniforme: mensaje,
//! ubicación, extracto de la línea original y subrayado.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error con ubicación conocida, borrado de tipo.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Colección presentable de errores de una misma fase.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    /// Etiqueta los errores con el nombre de su fase.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let (start, end) = (location.start(), location.end());
            let digits = end.line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line in start.line()..=end.line() {
                if let Some(text) = location.source().line(line) {
                    writeln!(fmt, "{:>digits$} | {}", line, text, digits = digits)?;
                }
            }

            // El subrayado solo tiene sentido dentro de una única línea
            if start.line() == end.line() {
                let from = start.column();
                let to = end.column().saturating_sub(1).max(from);

                let skip = (from - 1) as usize;
                let highlight = (to - from + 1) as usize;

                writeln!(
                    fmt,
                    "{:digits$} | {:skip$}{:^<highlight$}",
                    "",
                    "",
                    "",
                    digits = digits,
                    skip = skip,
                    highlight = highlight
                )?;
            }

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
