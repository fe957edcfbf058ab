use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser};
use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use codegen::gen_assm;
use lexer::{Lexer, Token};
use parser::Parser;

#[derive(ClapParser, Debug)]
#[command(
    version,
    about,
    long_about = "Compiles a small C subset to MIPS assembly or translates it to Python"
)]
struct CLI {
    /// Path to C source file
    path: String,

    /// Where to write the result, defaults to the source path with a .s or .py extension
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    #[command(flatten)]
    mode: ModeOptions,

    /// Stop early, writing nothing; only one option can be specified at a time
    #[command(flatten)]
    stage_options: StageOptions,

    /// Log compiler internals, overridden by RUST_LOG
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ModeOptions {
    /// Emit MIPS assembly
    #[arg(short = 'S')]
    s: bool,

    /// Translate into Python
    #[arg(long)]
    translate: bool,
}

#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
struct StageOptions {
    /// Stop after lexer
    #[arg(long)]
    lex: bool,

    /// Stop after parser
    #[arg(long)]
    parse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Assembly,
    Translate,
}

impl Mode {
    fn extension(self) -> &'static str {
        match self {
            Mode::Assembly => "s",
            Mode::Translate => "py",
        }
    }
}

/// Which stage the compiler should stop at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    Lexer,
    Parser,
}

impl StopStage {
    fn from_args(options: &StageOptions) -> Option<StopStage> {
        if options.lex {
            Some(StopStage::Lexer)
        } else if options.parse {
            Some(StopStage::Parser)
        } else {
            None
        }
    }
}

/// A fully generated result, kept in memory until it can be written in one go
pub enum Output {
    Assembly(lir::Program),
    Translation(String),
}

impl Output {
    pub fn write_to(&self, path: &str) -> std::io::Result<()> {
        match self {
            Output::Assembly(program) => emission::output(path, program),
            Output::Translation(text) => write(path, text),
        }
    }

    pub fn render(&self) -> Result<String> {
        match self {
            Output::Assembly(program) => {
                let mut buf = vec![];
                emission::write_program(&mut buf, program)?;
                Ok(String::from_utf8(buf)?)
            }
            Output::Translation(text) => Ok(text.clone()),
        }
    }
}

pub fn main() -> Result<()> {
    let args = CLI::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mode = if args.mode.s {
        Mode::Assembly
    } else {
        Mode::Translate
    };
    let stop_stage = StopStage::from_args(&args.stage_options);

    if let Some(written) = run_driver(&args.path, args.output.as_deref(), mode, stop_stage)? {
        info!("wrote {}", written.display());
    }

    Ok(())
}

/// Compile the file at `path`; returns where the result was written, if anything was
pub fn run_driver(
    path: &str,
    output: Option<&str>,
    mode: Mode,
    stop_stage: Option<StopStage>,
) -> Result<Option<PathBuf>> {
    let source =
        read_to_string(path).with_context(|| format!("Unable to read source file: {}", path))?;

    let file_name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let Some(result) = compile(&source, &file_name, mode, stop_stage)? else {
        return Ok(None);
    };

    let dest = match output {
        Some(dest) => PathBuf::from(dest),
        None => Path::new(path).with_extension(mode.extension()),
    };

    let dest_str = dest.to_string_lossy();
    result
        .write_to(&dest_str)
        .with_context(|| format!("Unable to write output file: {}", dest_str))?;

    Ok(Some(dest))
}

/// Run the compiler stages on `source`. Nothing is produced when a `stop_stage` is given
pub fn compile(
    source: &str,
    file_name: &str,
    mode: Mode,
    stop_stage: Option<StopStage>,
) -> Result<Option<Output>> {
    let tokens = lex(source, file_name)?;
    debug!("{} tokens", tokens.len());

    if let Some(StopStage::Lexer) = stop_stage {
        return Ok(None);
    }

    let mut parser = Parser::new(tokens);
    let ast = parser
        .parse()
        .map_err(|err| CompileErr::Parser(format!("{}: {}", file_name, err)))?;
    debug!("{} top level declarations", ast.decls.len());

    if let Some(StopStage::Parser) = stop_stage {
        return Ok(None);
    }

    let output = match mode {
        Mode::Assembly => Output::Assembly(gen_assm(&ast)?),
        Mode::Translate => Output::Translation(translate::translate_to_string(&ast)?),
    };

    Ok(Some(output))
}

/// Compile `source` straight to text
pub fn compile_to_string(source: &str, mode: Mode) -> Result<String> {
    match compile(source, "<input>", mode, None)? {
        Some(output) => output.render(),
        None => Ok(String::new()),
    }
}

fn lex(source: &str, file_name: &str) -> Result<Vec<Token>, CompileErr> {
    let (errors, tokens): (Vec<_>, Vec<_>) = Lexer::new(source)
        .tokenize()
        .partition(|t| t.is_error());

    if !errors.is_empty() {
        let messages = errors
            .iter()
            .map(|err| {
                format!(
                    "{:?} at {}:{}:{}: '{}'",
                    err.value,
                    file_name,
                    err.line,
                    err.col,
                    &source[err.start..err.end]
                )
            })
            .collect();

        return Err(CompileErr::Lexer(messages));
    }

    Ok(tokens)
}

#[derive(Error, Debug)]
pub enum CompileErr {
    #[error("Lexer encountered an error(s):\n{}", .0.iter().join("\n"))]
    Lexer(Vec<String>),
    #[error("Parser encountered an error: {0}")]
    Parser(String),
}
