//! `codemend interactive`: a prompt loop, one session log per request.

use std::path::PathBuf;

use anyhow::Result;
use codemend_agent::LlmCollaborator;
use codemend_core::config::EngineConfig;
use codemend_core::{Repairer, Synthesizer};
use codemend_executor::warn_on_err;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::{
    engine_config, finish_session, open_executor, open_session, print_outcome, print_rule,
    run_with_repair, EXIT_CONFIG,
};
use crate::interrupt::Interrupt;

pub struct InteractiveArgs {
    pub no_execute: bool,
    pub max_retries: Option<u32>,
    pub runtime: Option<PathBuf>,
    pub timeout: Option<u64>,
}

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PromptInput<'a> {
    Skip,
    Quit,
    Request(&'a str),
}

pub(crate) fn classify(line: &str) -> PromptInput<'_> {
    let input = line.trim();
    if input.is_empty() {
        return PromptInput::Skip;
    }
    match input.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" | "/quit" | "/exit" | "/q" => PromptInput::Quit,
        _ => PromptInput::Request(input),
    }
}

/// Empty answer means yes.
pub(crate) fn is_confirmed(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "" | "y" | "yes"
    )
}

pub fn run(args: InteractiveArgs, interrupt: &Interrupt) -> Result<i32> {
    let Some(collaborator) = LlmCollaborator::from_env() else {
        eprintln!(
            "No API key configured. Set CODEMEND_API_KEY (or ANTHROPIC_API_KEY / OPENAI_API_KEY)."
        );
        return Ok(EXIT_CONFIG);
    };
    let cfg = engine_config(args.runtime, args.timeout, args.max_retries);

    eprintln!("codemend interactive  ·  model: {}", collaborator.model());
    eprintln!("Describe what the script should do. 'quit', 'exit' or 'q' leaves.");
    print_rule();

    let mut rl = DefaultEditor::new()
        .map_err(|e| anyhow::anyhow!("Failed to create line editor: {}", e))?;

    loop {
        match rl.readline("codemend> ") {
            Ok(line) => {
                let request = match classify(&line) {
                    PromptInput::Skip => continue,
                    PromptInput::Quit => {
                        eprintln!("Bye!");
                        break;
                    }
                    PromptInput::Request(r) => r.to_string(),
                };
                let _ = rl.add_history_entry(request.as_str());

                let execute = !args.no_execute
                    && match rl.readline("Run the generated code? [Y/n] ") {
                        Ok(answer) => is_confirmed(&answer),
                        Err(_) => false,
                    };
                if let Err(e) = handle_request(&collaborator, &cfg, &request, execute, interrupt) {
                    eprintln!("Error: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("^C");
                eprintln!("Bye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                eprintln!("Bye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    Ok(0)
}

fn handle_request(
    collaborator: &LlmCollaborator,
    cfg: &EngineConfig,
    request: &str,
    execute: bool,
    interrupt: &Interrupt,
) -> Result<()> {
    let cancel = interrupt.fresh_token();
    let mut session = open_session(request);
    if let Some(log) = &session {
        warn_on_err("step", log.log_step("interactive", request));
    }

    eprintln!("Generating code...");
    let candidate = match collaborator.synthesize(request) {
        Ok(c) => c,
        Err(e) => {
            if let Some(log) = &session {
                warn_on_err("error", log.log_error("generate", &e.to_string()));
                warn_on_err("finish", log.finish(Some("generation failed")));
            }
            return Err(e.into());
        }
    };
    if let Some(log) = &session {
        warn_on_err(
            "code version",
            log.save_code(&candidate.source, &candidate.explanation, 1),
        );
    }

    print_rule();
    println!("{}", candidate.source);
    print_rule();
    println!("Explanation: {}", candidate.explanation);
    if !candidate.declared_dependencies.is_empty() {
        println!("Declared dependencies: {}", candidate.declared_dependencies.join(", "));
    }

    if !execute || cancel.is_cancelled() {
        finish_session(session.as_ref(), None);
        return Ok(());
    }

    let mut executor = open_executor(cfg)?;
    let repairer: &dyn Repairer = collaborator;
    let outcome = run_with_repair(
        &mut executor,
        Some(repairer),
        cfg.max_retries,
        true,
        request,
        &candidate.source,
        session.as_mut(),
        &cancel,
    )?;

    match outcome {
        Some(outcome) => {
            print_outcome(&outcome, cfg.max_retries);
            if outcome.final_code != candidate.source {
                println!("\nFinal code (after repair):\n\n{}", outcome.final_code);
            }
            finish_session(session.as_ref(), Some(&outcome));
        }
        None => {
            eprintln!("Cancelled.");
            finish_session(session.as_ref(), None);
        }
    }
    Ok(())
}
