use clap::Parser as ClapParser;
use patitoc::errors::CompileError;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

/// Single-pass compiler for the Patito language.
#[derive(ClapParser, Debug)]
#[command(name = "patitoc", version, about)]
struct Cli {
    /// Patito source file to compile.
    input: PathBuf,

    /// Write a `.patitoc` object file instead of printing quadruples to stdout.
    #[arg(short = 'c', long = "compile")]
    compile: bool,

    /// Print program/function/quadruple counts to stderr after a successful compile.
    #[arg(short, long)]
    verbose: bool,

    /// Output path for `.patitoc` (only used with `--compile`).
    output: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<(), CompileError> {
    let source = fs::read_to_string(&cli.input).map_err(|e| {
        CompileError::Serialize(patitoc::errors::SerializeError::Io(e))
    })?;

    if cli.compile {
        let output_path = cli.output.clone().unwrap_or_else(|| {
            cli.input.with_extension("patitoc")
        });
        let file = File::create(&output_path).map_err(|e| {
            CompileError::Serialize(patitoc::errors::SerializeError::Io(e))
        })?;
        let mut writer = BufWriter::new(file);
        let ctx = patitoc::compile_and_write(&source, &mut writer)?;
        println!("wrote {}", output_path.display());
        if cli.verbose {
            report(&ctx);
        }
    } else {
        let ctx = patitoc::compile_to_context(&source)?;
        for (i, q) in ctx.quads.iter().enumerate() {
            println!("{i}: {q}");
        }
        if cli.verbose {
            report(&ctx);
        }
    }

    Ok(())
}

fn report(ctx: &patitoc::CompileContext) {
    eprintln!(
        "program: {}",
        ctx.directory.program_name.as_deref().unwrap_or("<unnamed>")
    );
    eprintln!("globals: {}", ctx.directory.globals.entries().len());
    eprintln!("functions: {}", ctx.directory.functions_in_order().len());
    eprintln!("quadruples: {}", ctx.quads.len());
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
