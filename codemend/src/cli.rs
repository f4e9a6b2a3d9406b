use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// codemend - generate Python scripts from plain language, run them in an
/// isolated runtime, and repair them until they work
#[derive(Parser, Debug)]
#[command(name = "codemend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate code for a request, then run and repair it
    Generate {
        /// What the script should do
        #[arg(value_name = "REQUEST")]
        request: String,

        /// Only generate; do not run the code
        #[arg(long, default_value = "false")]
        no_execute: bool,

        /// Also write the generated code to this file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,

        /// Repair rounds after the first failure (default: from env or 2)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Isolated runtime (venv) directory (default: from env or ./venv)
        #[arg(long, value_name = "DIR")]
        runtime: Option<PathBuf>,

        /// Execution timeout in seconds (default: from env or 60)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run an existing script, repairing it on failure
    Exec {
        /// Path to the Python script
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Repair rounds after the first failure (default: from env or 2; 0 disables repair)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Describe what the script is meant to do (context for repairs)
        #[arg(long, value_name = "TEXT")]
        request: Option<String>,

        /// Do not install third-party imports before running
        #[arg(long, default_value = "false")]
        no_install: bool,

        /// Isolated runtime (venv) directory (default: from env or ./venv)
        #[arg(long, value_name = "DIR")]
        runtime: Option<PathBuf>,

        /// Execution timeout in seconds (default: from env or 60)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Prompt for requests in a loop; each one is generated, run and repaired
    Interactive {
        /// Only generate; never run the code
        #[arg(long, default_value = "false")]
        no_execute: bool,

        /// Repair rounds after the first failure (default: from env or 2)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Isolated runtime (venv) directory (default: from env or ./venv)
        #[arg(long, value_name = "DIR")]
        runtime: Option<PathBuf>,

        /// Execution timeout in seconds (default: from env or 60)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Serve /generate, /execute and /health over HTTP
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, short = 'p', default_value_t = 8000)]
        port: u16,

        /// Repair rounds for /generate (default: from env or 2)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Isolated runtime (venv) directory (default: from env or ./venv)
        #[arg(long, value_name = "DIR")]
        runtime: Option<PathBuf>,

        /// Execution timeout in seconds (default: from env or 60)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List the third-party modules a script imports
    Deps {
        /// Path to the Python script
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print as a JSON array
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "codemend",
            "generate",
            "print primes",
            "--max-retries",
            "3",
            "--no-execute",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                request,
                no_execute,
                max_retries,
                save,
                ..
            } => {
                assert_eq!(request, "print primes");
                assert!(no_execute);
                assert_eq!(max_retries, Some(3));
                assert!(save.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_exec_defaults() {
        let cli = Cli::try_parse_from(["codemend", "exec", "job.py"]).unwrap();
        match cli.command {
            Commands::Exec {
                file,
                max_retries,
                no_install,
                request,
                ..
            } => {
                assert_eq!(file, PathBuf::from("job.py"));
                assert_eq!(max_retries, None);
                assert!(!no_install);
                assert!(request.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_interactive() {
        let cli =
            Cli::try_parse_from(["codemend", "interactive", "--max-retries", "1"]).unwrap();
        match cli.command {
            Commands::Interactive {
                no_execute,
                max_retries,
                ..
            } => {
                assert!(!no_execute);
                assert_eq!(max_retries, Some(1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["codemend", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
