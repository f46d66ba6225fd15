use std::{
    error::Error,
    fs, io,
    path::PathBuf,
    process::{Command, ExitCode},
};

use mila::{codegen, lexer::Lexer, parser::Parser, printer, CompileError};

/// The fixed C runtime the emitted IR links against.
static RUNTIME_IO: &str = include_str!("../../runtime/io.c");

#[derive(clap::Parser)]
#[command(name = "milac", about = "Compiler for the mila language", disable_version_flag = true)]
struct Args {
    /// Enable verbose rule trace and AST dump
    #[arg(short = 'v')]
    verbose: bool,

    /// Output executable base name; the produced file is <NAME>.out
    #[arg(short = 'o', value_name = "NAME")]
    output: Option<String>,

    /// Source file, with the .mila extension
    source: PathBuf,
}

fn main() -> ExitCode {
    let args = <Args as clap::Parser>::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.source.extension().and_then(|e| e.to_str()) != Some("mila") {
        return Err(format!("invalid source file: {}", args.source.display()).into());
    }
    let source = fs::read_to_string(&args.source)?;

    if args.verbose {
        println!("---------- PARSER ------------------");
    }
    let lexer = Lexer::new(&source).map_err(CompileError::from)?;
    let mut parser = Parser::new(lexer, args.verbose);
    let program = parser.parse_program().map_err(CompileError::from)?;

    if args.verbose {
        println!("---------- PARSED AST --------------");
        printer::print_program(&mut io::stdout(), &program)?;
    }

    let module = codegen::lower_program(&program).map_err(CompileError::from)?;
    fs::write("output.ir", module.to_string())?;

    let result = assemble_and_link(args);
    for intermediate in ["output.ir", "output.s", "io.c"] {
        let _ = fs::remove_file(intermediate);
    }
    result
}

/// Drives the external toolchain: IR to assembly, then a link against the
/// embedded C runtime.
fn assemble_and_link(args: &Args) -> Result<(), Box<dyn Error>> {
    run_tool(
        "llc",
        &["output.ir", "-o", "output.s", "-relocation-model=pic"],
        "IR to assembly compilation failed",
    )?;

    fs::write("io.c", RUNTIME_IO)?;
    let executable = format!("{}.out", args.output.as_deref().unwrap_or("a"));
    run_tool(
        "clang",
        &["output.s", "io.c", "-o", &executable],
        "Assembly to executable compilation failed",
    )?;
    Ok(())
}

fn run_tool(program: &str, args: &[&str], what: &str) -> Result<(), Box<dyn Error>> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| format!("failed to run {program}: {e}"))?;
    if !status.success() {
        return Err(format!("{what} with exit code {}", status.code().unwrap_or(-1)).into());
    }
    Ok(())
}
