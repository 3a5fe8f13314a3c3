use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pl01::backends::BackendType;
use pl01::{CompileError, Options, parser, sema};

#[derive(Parser)]
#[command(name = "pl01")]
#[command(about = "PL/0.1 compiler front end", version)]
struct Cli {
    /// Verbose logging (pl01=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program for the selected backend
    Compile {
        /// Source file
        input: String,

        /// Target backend
        #[arg(short, long, default_value = "text")]
        target: String,

        /// Output file
        #[arg(short, long)]
        output: Option<String>,

        /// Print the AST
        #[arg(long)]
        show_ast: bool,

        /// Do not declare the runtime functions
        #[arg(long)]
        no_prelude: bool,
    },

    /// Print tokens and the AST without analysis
    Parse {
        /// Source file
        input: String,
    },

    /// Analyze a program without generating code
    Check {
        /// Source file
        input: String,

        /// Do not declare the runtime functions
        #[arg(long)]
        no_prelude: bool,
    },

    /// List supported backends
    Targets,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pl01=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pl01=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile { input, target, output, show_ast, no_prelude } => {
            let backend_type = BackendType::from_name(&target)?;
            info!(input = %input, target = %target, "compiling");

            let source = fs::read_to_string(&input)?;
            let program = parser::parse(&source)?;

            if show_ast {
                println!("=== AST ===");
                println!("{:#?}", program);
            }

            let options = Options { prelude: !no_prelude };
            let analyzed = sema::analyze(program, &options)?;
            let mut backend = backend_type.create();
            let code = backend.compile(&analyzed)?;

            let output_path = match output {
                Some(path) => path,
                None => {
                    // input.pl0 -> input.ll
                    let stem = Path::new(&input).with_extension(backend_type.extension());
                    stem.to_string_lossy().into_owned()
                }
            };

            fs::write(&output_path, &code)?;
            println!("Compiled to: {}", output_path);
            println!("Output size: {} bytes", code.len());
        }
        Commands::Parse { input } => {
            let source = fs::read_to_string(&input)?;

            println!("=== TOKENS ===");
            for token in parser::lexer::tokenize(&source) {
                println!("{:>4}: {:?}", token.line, token.kind);
            }

            println!("=== AST ===");
            let program = parser::parse(&source)?;
            println!("{:#?}", program);
        }
        Commands::Check { input, no_prelude } => {
            let source = fs::read_to_string(&input)?;
            let mut program = parser::parse(&source)?;
            let options = Options { prelude: !no_prelude };
            let report = sema::analyze_program(&mut program, &options);
            if report.error_count() > 0 {
                return Err(CompileError::Failed {
                    count: report.error_count(),
                }
                .into());
            }
            println!("{}: ok", input);
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}
