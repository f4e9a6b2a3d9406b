//! `codemend exec`: run an existing script, repairing on failure.

use std::path::PathBuf;

use anyhow::{Context, Result};
use codemend_agent::LlmCollaborator;
use codemend_core::Repairer;
use codemend_executor::warn_on_err;
use codemend_sandbox::CancelToken;

use super::{
    engine_config, exit_code, finish_session, open_executor, open_session, print_outcome,
    run_with_repair, EXIT_CANCELLED, EXIT_CONFIG,
};

pub struct ExecArgs {
    pub file: PathBuf,
    pub max_retries: Option<u32>,
    pub request: Option<String>,
    pub no_install: bool,
    pub runtime: Option<PathBuf>,
    pub timeout: Option<u64>,
}

pub fn run(args: ExecArgs, cancel: &CancelToken) -> Result<i32> {
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let cfg = engine_config(args.runtime, args.timeout, args.max_retries);
    let request = args
        .request
        .unwrap_or_else(|| format!("Run the script {}", args.file.display()));

    let collaborator = if cfg.max_retries > 0 {
        match LlmCollaborator::from_env() {
            Some(c) => Some(c),
            None => {
                eprintln!(
                    "Repair needs an API key. Set CODEMEND_API_KEY, or pass --max-retries 0 to run without repair."
                );
                return Ok(EXIT_CONFIG);
            }
        }
    } else {
        None
    };

    let mut executor = open_executor(&cfg)?;
    let mut session = open_session(&request);
    if let Some(log) = &session {
        warn_on_err("code version", log.save_code(&code, "", 1));
    }

    let repairer = collaborator.as_ref().map(|c| c as &dyn Repairer);
    let outcome = run_with_repair(
        &mut executor,
        repairer,
        cfg.max_retries,
        !args.no_install,
        &request,
        &code,
        session.as_mut(),
        cancel,
    )?;

    let Some(outcome) = outcome else {
        eprintln!("Cancelled.");
        finish_session(session.as_ref(), None);
        return Ok(EXIT_CANCELLED);
    };

    print_outcome(&outcome, cfg.max_retries);
    if outcome.final_code != code {
        println!("\nRepaired code:\n\n{}", outcome.final_code);
        if let Some(log) = &session {
            println!("All versions are in {}", log.dir().display());
        }
    }
    finish_session(session.as_ref(), Some(&outcome));
    Ok(exit_code(&outcome))
}
