//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las fases del frontend y expone una CLI: lee
//! un archivo fuente, lo compila hasta la representación solicitada y
//! la vuelca a un archivo o a la salida estándar.

use anyhow::Context;
use clap::{self, crate_version, Arg};
use cminus::{dump, error::Diagnostics, lex, parse, source::Source};

use std::{
    fs::{self, File},
    io::{self, Write},
    process,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::App::new("C-minus compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Source file"),
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .takes_value(true)
                .value_name("FORM")
                .default_value("ir")
                .possible_values(["ast", "ir"])
                .help("Representation to emit"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .get_matches();

    let path = args.value_of("input").unwrap();
    let emit = args.value_of("emit").unwrap();
    let output = args.value_of("output").unwrap();

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path))?;

    let source = Source::new(path, text);

    let tokens = match lex::scan(&source) {
        Ok(tokens) => tokens,
        Err(error) => abort(Diagnostics::from(error).kind("Lexical error")),
    };

    let ast = match parse::parse(tokens) {
        Ok(ast) => ast,
        Err(error) => abort(Diagnostics::from(error).kind("Syntax error")),
    };

    let mut sink = open_output(output)?;
    match emit {
        "ast" => dump::ast(&ast, &mut sink),

        _ => {
            let module = match ast.lower() {
                Ok(module) => module,
                Err(error) => abort(Diagnostics::from(error).kind("Semantic error")),
            };

            dump::module(&module, &mut sink)
        }
    }
    .with_context(|| format!("Failed to write output: {}", output))?;

    Ok(())
}

/// Abre el destino de la emisión; `-` es la salida estándar.
fn open_output(path: &str) -> anyhow::Result<Box<dyn Write>> {
    match path {
        "-" => Ok(Box::new(io::stdout())),
        path => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            Ok(Box::new(file))
        }
    }
}

/// Reporta diagnósticos y termina el proceso.
fn abort(diagnostics: Diagnostics) -> ! {
    eprint!("{}", diagnostics);
    process::exit(1);
}
