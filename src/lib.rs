//! Compilador frontend para el lenguaje C-minus.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente. El
//! archivo se somete primero a análisis léxico en [`lex`], de lo cual
//! se obtiene un flujo de tokens. El flujo de tokens se dispone en un
//! AST por medio de análisis sintáctico descendente recursivo en
//! [`parse`]. El árbol es descendido por [`lower`] a la representación
//! intermedia descrita en [`ir`]: funciones compuestas de bloques
//! básicos de operaciones de tres direcciones sobre registros
//! virtuales, con lo cual concluye el frontend.
//!
//! # Diagnóstico
//! Las tres fases son fail-fast: el primer error léxico, sintáctico o
//! semántico aborta la compilación sin resultado parcial. Los errores
//! llevan ubicación ([`source`]) y se presentan con [`error`]. Para
//! inspección, [`dump`] vuelca el AST o el IR en formatos de texto
//! estables línea por línea.

pub mod dump;
pub mod error;
pub mod ir;
pub mod lex;
pub mod lower;
pub mod parse;
pub mod source;
