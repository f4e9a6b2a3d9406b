//! `codemend generate`: synthesize, run, repair.

use std::path::PathBuf;

use anyhow::{Context, Result};
use codemend_agent::LlmCollaborator;
use codemend_core::{Repairer, Synthesizer};
use codemend_executor::warn_on_err;
use codemend_sandbox::CancelToken;

use super::{
    engine_config, exit_code, finish_session, open_executor, open_session, print_outcome,
    print_rule, run_with_repair, EXIT_CANCELLED, EXIT_CONFIG,
};

pub struct GenerateArgs {
    pub request: String,
    pub no_execute: bool,
    pub save: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub runtime: Option<PathBuf>,
    pub timeout: Option<u64>,
}

pub fn run(args: GenerateArgs, cancel: &CancelToken) -> Result<i32> {
    let Some(collaborator) = LlmCollaborator::from_env() else {
        eprintln!(
            "No API key configured. Set CODEMEND_API_KEY (or ANTHROPIC_API_KEY / OPENAI_API_KEY)."
        );
        return Ok(EXIT_CONFIG);
    };
    let cfg = engine_config(args.runtime, args.timeout, args.max_retries);

    let mut session = open_session(&args.request);
    if let Some(log) = &session {
        warn_on_err(
            "step",
            log.log_step("generate", &format!("model {}", collaborator.model())),
        );
    }

    println!("Generating code...");
    let candidate = match collaborator.synthesize(&args.request) {
        Ok(c) => c,
        Err(e) => {
            if let Some(log) = &session {
                warn_on_err("error", log.log_error("generate", &e.to_string()));
                warn_on_err("finish", log.finish(Some("generation failed")));
            }
            return Err(e).context("Code generation failed");
        }
    };

    print_rule();
    println!("Generated code:\n\n{}\n", candidate.source);
    print_rule();
    println!("Explanation: {}", candidate.explanation);
    if !candidate.declared_dependencies.is_empty() {
        println!("Declared dependencies: {}", candidate.declared_dependencies.join(", "));
    }

    if let Some(log) = &session {
        warn_on_err(
            "code version",
            log.save_code(&candidate.source, &candidate.explanation, 1),
        );
    }
    if let Some(path) = &args.save {
        std::fs::write(path, &candidate.source)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }

    if args.no_execute {
        finish_session(session.as_ref(), None);
        return Ok(0);
    }

    let mut executor = open_executor(&cfg)?;
    println!("\nRunning (up to {} repair round(s))...", cfg.max_retries);
    let repairer: &dyn Repairer = &collaborator;
    let outcome = run_with_repair(
        &mut executor,
        Some(repairer),
        cfg.max_retries,
        true,
        &args.request,
        &candidate.source,
        session.as_mut(),
        cancel,
    )?;

    let Some(outcome) = outcome else {
        eprintln!("Cancelled.");
        finish_session(session.as_ref(), None);
        return Ok(EXIT_CANCELLED);
    };

    print_outcome(&outcome, cfg.max_retries);
    if outcome.final_code != candidate.source {
        println!("\nFinal code (after repair):\n\n{}", outcome.final_code);
        if let Some(path) = &args.save {
            std::fs::write(path, &outcome.final_code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Updated {} with the repaired code", path.display());
        }
    }
    finish_session(session.as_ref(), Some(&outcome));
    Ok(exit_code(&outcome))
}
