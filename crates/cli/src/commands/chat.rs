//! `gradwise chat`: interactive or single-message chat mode.

use crate::runtime::Runtime;
use gradwise_config::AppConfig;
use gradwise_core::event::DomainEvent;
use gradwise_core::turn::TurnReply;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub async fn run(message: Option<String>, session: &str, trace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::from_config(config)?;

    // Surface domain events in the debug log.
    let mut events = runtime.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log_event(&event);
        }
    });

    if let Some(msg) = message {
        let reply = runtime.sessions.process_turn(&msg, session).await;
        println!("{}", reply.response);
        if trace {
            print_trace(&reply);
        }
        return Ok(());
    }

    println!();
    println!("  Gradwise: interactive mode");
    println!();
    match &runtime.backend {
        Some(backend) => println!("  Backend:   {} ({})", backend.name(), backend.model()),
        None => println!("  Backend:   none (keyword rules and formatted replies)"),
    }
    println!("  Memory:    {}", runtime.config.memory.backend);
    println!("  Session:   {session}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let reply = runtime.sessions.process_turn(line, session).await;
        println!();
        for text in reply.response.lines() {
            println!("  Gradwise > {text}");
        }
        if trace {
            print_trace(&reply);
        }
        println!();
    }

    println!();
    println!("  Good luck with your applications!");
    println!();
    Ok(())
}

fn print_trace(reply: &TurnReply) {
    for step in &reply.trace {
        println!("    [{}] {}", step.stage, step.note);
    }
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::DecisionMade { path, tool_name, .. } => {
            debug!(path = path.as_str(), tool = ?tool_name, "decision");
        }
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, success, duration_ms, "tool executed"),
        DomainEvent::FallbackEngaged { stage, reason, .. } => {
            debug!(stage = %stage, reason = %reason, "fallback engaged");
        }
        DomainEvent::MemoryStored { record_id, kind, .. } => {
            debug!(record_id = %record_id, kind = %kind, "memory stored");
        }
        DomainEvent::TurnStarted { .. } | DomainEvent::TurnCompleted { .. } => {}
    }
}
