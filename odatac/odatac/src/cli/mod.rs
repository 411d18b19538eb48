#![cfg(not(target_family = "wasm"))]

use std::backtrace::BacktraceStatus;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;

use anstream::{eprintln, println};
use anyhow::anyhow;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueHint};
use clap_verbosity_flag::LogLevel;
use clio::Output;
use is_terminal::IsTerminal;
use serde::Serialize;

use odatac::debug;
use odatac::{odata_to_ast, odata_to_ir, odata_to_tokens};
use odatac::{ErrorMessages, Options, Target};

/// Entrypoint called by [`crate::main`]
pub fn main() -> color_eyre::eyre::Result<()> {
    let mut cli = Cli::parse();

    // compiler records go to the debug log when collected, else to stderr
    static LOGGER: debug::MessageLogger = debug::MessageLogger;
    log::set_logger(&LOGGER).map(|()| log::set_max_level(cli.verbose.log_level_filter()))?;

    color_eyre::install()?;
    cli.color.write_global();

    let Err(error) = cli.command.run() else {
        return Ok(());
    };

    eprintln!("{error}");
    // captured only with RUST_BACKTRACE or RUST_LIB_BACKTRACE set
    let backtrace = error.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        eprintln!("{backtrace:#}");
    }
    exit(1)
}

#[derive(Parser, Debug, Clone)]
#[command(name = env!("CARGO_PKG_NAME"), about, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<LoggingHelp>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Lex a `$filter` expression into tokens
    Lex {
        #[command(flatten)]
        io_args: IoArgs,
        #[arg(value_enum, long, default_value = "json")]
        format: Format,
    },

    /// Parse a `$filter` expression into the AST
    Parse {
        #[command(flatten)]
        io_args: IoArgs,
        #[arg(value_enum, long, default_value = "json")]
        format: Format,
    },

    /// Resolve the query options of a request into the `$`-keyed IR JSON
    Ir {
        #[command(flatten)]
        io_args: IoArgs,

        /// Collection the request reads from
        #[arg(short, long)]
        collection: String,
    },

    /// Parse the query options of a request & compile them to SQL or OData
    #[command(name = "compile")]
    Compile {
        #[command(flatten)]
        io_args: IoArgs,

        /// Collection the request reads from
        #[arg(short, long)]
        collection: String,

        /// Exclude the signature comment containing the odatac version
        #[arg(long = "hide-signature-comment", action = clap::ArgAction::SetFalse)]
        signature_comment: bool,

        /// Emit unformatted, dense SQL
        #[arg(long = "no-format", action = clap::ArgAction::SetFalse)]
        format: bool,

        /// Target to compile to
        #[arg(short, long, default_value = "sql.any", env = "ODATAC_TARGET")]
        target: String,

        /// File path into which to write the debug log to.
        #[arg(long, env = "ODATAC_DEBUG_LOG")]
        debug_log: Option<PathBuf>,
    },

    /// Show available compile target names
    #[command(name = "list-targets")]
    ListTargets,
}

#[derive(clap::Args, Default, Debug, Clone)]
pub struct IoArgs {
    #[arg(value_parser, default_value = "-", value_hint(ValueHint::AnyPath))]
    input: clio::ClioPath,

    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    output: Output,
}

#[derive(Copy, Clone, Debug, Default)]
struct LoggingHelp;

/// Compiler logs go to stderr, or into `--debug-log` when given.
impl LogLevel for LoggingHelp {
    fn default() -> Option<log::Level> {
        Some(log::Level::Error)
    }

    fn verbose_help() -> Option<&'static str> {
        Some("Log more of what the compiler does")
    }

    fn verbose_long_help() -> Option<&'static str> {
        Some("Repeat to raise the level: -v warn, -vv info, -vvv debug, -vvvv trace")
    }

    fn quiet_help() -> Option<&'static str> {
        Some("Log nothing, not even errors")
    }

    fn quiet_long_help() -> Option<&'static str> {
        None
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn render<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let text = match self {
            Format::Json => serde_json::to_string_pretty(value)?,
            Format::Yaml => serde_yaml::to_string(value)?,
        };
        Ok(text.into_bytes())
    }
}

impl Command {
    /// Entrypoint called by [`main`]
    pub fn run(&mut self) -> Result<()> {
        match self {
            Command::ListTargets => {
                println!("{}", Target::names().join("\n"));
                Ok(())
            }
            _ => self.run_io_command(),
        }
    }

    fn run_io_command(&mut self) -> Result<()> {
        let source = self.read_input()?;

        self.execute(&source)
            .and_then(|buf| Ok(self.write_output(&buf)?))
    }

    fn execute(&self, source: &str) -> Result<Vec<u8>> {
        Ok(match self {
            Command::Lex { format, .. } => format.render(&odata_to_tokens(source)?)?,
            Command::Parse { format, .. } => format.render(&odata_to_ast(source)?)?,
            Command::Ir { collection, .. } => {
                Format::Json.render(&odata_to_ir(collection, source)?)?
            }
            Command::Compile {
                collection,
                signature_comment,
                format,
                target,
                debug_log,
                ..
            } => {
                if debug_log.is_some() {
                    debug::log_start();
                }

                let opts = Options::default()
                    .with_target(Target::from_str(target).map_err(ErrorMessages::from)?)
                    .with_signature_comment(*signature_comment)
                    .with_format(*format);

                let res = odatac::compile(collection, source, &opts);

                if let Some(path) = debug_log {
                    write_log(path)?;
                }

                res?.into_bytes()
            }
            Command::ListTargets => unreachable!("`list-targets` doesn't read input"),
        })
    }

    fn io_args(&mut self) -> &mut IoArgs {
        use Command::*;
        match self {
            Lex { io_args, .. }
            | Parse { io_args, .. }
            | Ir { io_args, .. }
            | Compile { io_args, .. } => io_args,
            ListTargets => unreachable!("`list-targets` has no io args"),
        }
    }

    fn read_input(&mut self) -> Result<String> {
        let input = &mut self.io_args().input;

        // Don't wait without a prompt when running `odatac compile`; it's
        // confusing whether it's waiting for input or not.
        if input.path() == Path::new("-") && std::io::stdin().is_terminal() {
            #[cfg(unix)]
            eprintln!("Enter OData query options, then press ctrl-d to compile:\n");
            #[cfg(windows)]
            eprintln!("Enter OData query options, then press ctrl-z to compile:\n");
        }

        let mut source = String::new();
        input.clone().open()?.read_to_string(&mut source)?;

        // a trailing newline from `echo` or an editor isn't part of the query
        let len = source.trim_end_matches(['\n', '\r']).len();
        source.truncate(len);
        Ok(source)
    }

    fn write_output(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut output = self.io_args().output.clone();
        output.write_all(data)
    }
}

/// Writes the collected debug log as JSON, the only supported format.
pub fn write_log(path: &Path) -> Result<()> {
    let debug_log = debug::log_finish()
        .ok_or_else(|| anyhow!("debug log was started, but it cannot be found after compilation"))?;

    if path.extension().and_then(|s| s.to_str()) != Some("json") {
        return Err(anyhow!("unknown debug log format for file {path:?}"));
    }
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(file, &debug_log)?;
    Ok(())
}

/// Unit tests for `odatac`. The library itself is tested in its own modules
/// and in `tests/integration`.
#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn compile_command(target: &str) -> Command {
        Command::Compile {
            io_args: IoArgs::default(),
            collection: "Product".to_string(),
            signature_comment: false,
            format: false,
            target: target.to_string(),
            debug_log: None,
        }
    }

    #[test]
    fn parse_args() {
        let cli = Cli::try_parse_from([
            "odatac",
            "compile",
            "--collection",
            "Product",
            "--target",
            "sql.postgres",
            "--no-format",
            "--hide-signature-comment",
        ])
        .unwrap();
        let Command::Compile {
            collection,
            target,
            format,
            signature_comment,
            debug_log,
            ..
        } = cli.command
        else {
            panic!("expected compile, found {:?}", cli.command);
        };
        assert_eq!(collection, "Product");
        assert_eq!(target, "sql.postgres");
        assert!(!format);
        assert!(!signature_comment);
        assert!(debug_log.is_none());

        let cli = Cli::try_parse_from(["odatac", "ir", "-c", "User"]).unwrap();
        assert!(matches!(cli.command, Command::Ir { collection, .. } if collection == "User"));

        // the collection is required
        assert!(Cli::try_parse_from(["odatac", "compile"]).is_err());
        assert!(Cli::try_parse_from(["odatac", "fmt"]).is_err());
    }

    /// Check we get an error on a bad input
    #[test]
    fn compile_bad() {
        let result = compile_command("sql.any").execute("$filter=price gt");
        let err = result.unwrap_err().downcast::<ErrorMessages>().unwrap();
        assert_eq!(err.inner[0].code.as_deref(), Some("E0002"));

        let result = compile_command("sql.poostgres").execute("$top=1");
        assert!(result.is_err());
    }

    #[test]
    fn compile() {
        let result = compile_command("sql.any")
            .execute("$select=id,name&$filter=price gt 5&$top=10")
            .unwrap();
        assert_snapshot!(
            String::from_utf8(result).unwrap(),
            @"SELECT id, name FROM Product WHERE (price>5) LIMIT 10"
        );

        let result = compile_command("odata")
            .execute("$filter=price add 5 gt 10")
            .unwrap();
        assert_snapshot!(String::from_utf8(result).unwrap(), @"$filter=price add 5 gt 10");
    }

    #[test]
    fn compile_with_debug_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.json");

        let command = Command::Compile {
            io_args: IoArgs::default(),
            collection: "Product".to_string(),
            signature_comment: false,
            format: false,
            target: "sql.postgres".to_string(),
            debug_log: Some(path.clone()),
        };
        command.execute("$filter=id eq 1").unwrap();

        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(log["version"], odatac::compiler_version().to_string());
        let entries = log["entries"].as_array().unwrap();
        assert!(!entries.is_empty());
        assert!(entries
            .iter()
            .any(|e| e["option"] == "$filter" && e["kind"].get("ReprPr").is_some()));
        assert!(entries
            .iter()
            .any(|e| e["phase"] == "format" && e["kind"].get("ReprSql").is_some()));

        let err = write_log(&dir.path().join("debug.html")).unwrap_err();
        assert!(err.to_string().contains("cannot be found"), "{err}");
    }

    #[test]
    fn ir() {
        let result = Command::Ir {
            io_args: IoArgs::default(),
            collection: "User".to_string(),
        }
        .execute("$filter=id eq 1")
        .unwrap();
        assert_snapshot!(String::from_utf8(result).unwrap(), @r#"
        {
          "$select": {
            "$entity": "User",
            "$fields": []
          },
          "$where": {
            "id": 1
          }
        }
        "#);
    }

    #[test]
    fn lex() {
        let output = Command::execute(
            &Command::Lex {
                io_args: IoArgs::default(),
                format: Format::Json,
            },
            "name eq 'x'",
        )
        .unwrap();
        let tokens: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(tokens.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn parse() {
        let output = Command::execute(
            &Command::Parse {
                io_args: IoArgs::default(),
                format: Format::Json,
            },
            "price gt 5",
        )
        .unwrap();
        let ast: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(ast["Comparison"]["op"], "Gt");
    }
}
