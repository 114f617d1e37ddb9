//! The decision engine: answer directly or invoke a tool.
//!
//! With a completion backend configured, the backend is asked for a
//! decision document. Any backend error, timeout, parse failure or unknown
//! tool name demotes the call to the keyword rules below, which need no
//! backend at all.

use crate::backend::CompletionBackend;
use chrono::NaiveDate;
use gradwise_core::decision::DecisionOutcome;
use gradwise_core::event::DecisionPath;
use gradwise_core::message::Message;
use gradwise_core::provider::ToolDefinition;
use gradwise_core::tool::ToolArgs;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const APPLICATION_DATABASE: &str = "application_database";
pub const PROGRAM_RESEARCH: &str = "program_research";
pub const ESSAY_ANALYZER: &str = "essay_analyzer";
pub const CALENDAR_TODO: &str = "calendar_todo";

const DECISION_SYSTEM_PROMPT: &str = "You are a tool selection assistant. Respond only with valid JSON.";

const APP_KEYWORDS: &[&str] = &[
    "add",
    "create",
    "new application",
    "track",
    "update",
    "status",
    "my applications",
    "delete",
    "remove",
    "list applications",
];
const RESEARCH_KEYWORDS: &[&str] = &[
    "deadline",
    "requirement",
    "requirements",
    "gre",
    "toefl",
    "tuition",
    "ranking",
    "faculty",
    "what does",
    "tell me about",
];
const ESSAY_KEYWORDS: &[&str] = &["essay", "sop", "statement of purpose", "analyze", "review my"];
const TASK_KEYWORDS: &[&str] = &["task", "to-do", "todo", "deadline", "due", "remind", "upcoming"];

/// Spoken school names and the name records are kept under.
const SCHOOLS: &[(&str, &str)] = &[
    ("mit", "MIT"),
    ("stanford", "Stanford"),
    ("berkeley", "UC Berkeley"),
    ("uc berkeley", "UC Berkeley"),
    ("cmu", "Carnegie Mellon"),
    ("carnegie mellon", "Carnegie Mellon"),
    ("georgia tech", "Georgia Tech"),
    ("harvard", "Harvard"),
    ("princeton", "Princeton"),
    ("caltech", "Caltech"),
    ("cornell", "Cornell"),
    ("columbia", "Columbia"),
];

const PROGRAMS: &[(&str, &str)] = &[
    ("computer science", "Computer Science"),
    ("electrical engineering", "Electrical Engineering"),
    ("eecs", "EECS"),
    ("data science", "Data Science"),
    ("machine learning", "Machine Learning"),
    ("robotics", "Robotics"),
    ("statistics", "Statistics"),
    ("mathematics", "Mathematics"),
];

const DEGREES: &[(&str, &str)] = &[
    ("phd", "PhD"),
    ("ms", "MS"),
    ("msc", "MS"),
    ("masters", "MS"),
    ("mba", "MBA"),
    ("meng", "MEng"),
    ("ma", "MA"),
];

const STATUSES: &[(&str, &str)] = &[
    ("researching", "researching"),
    ("in progress", "in_progress"),
    ("applied", "applied"),
    ("submitted", "applied"),
    ("interview", "interview"),
    ("decision", "decision"),
];

const DEFAULT_RESEARCH_PROGRAM: &str = "Computer Science";

/// A decision and the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub path: DecisionPath,
    /// Why the backend path was abandoned, when it was.
    pub fallback_reason: Option<String>,
}

pub struct DecisionEngine {
    backend: Option<CompletionBackend>,
    tools: Vec<ToolDefinition>,
    temperature: f32,
    max_tokens: u32,
}

impl DecisionEngine {
    /// An engine choosing among `tools`.
    pub fn new(backend: Option<CompletionBackend>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            backend,
            tools,
            temperature: 0.1,
            max_tokens: 500,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn decide(&self, message: &str, context: &str) -> Decision {
        let Some(backend) = &self.backend else {
            return Decision {
                outcome: rule_based(message),
                path: DecisionPath::RuleBased,
                fallback_reason: None,
            };
        };

        match self.ask_backend(backend, message, context).await {
            Ok(outcome) => {
                debug!(tool = ?outcome.tool_name(), "Backend decision accepted");
                Decision {
                    outcome,
                    path: DecisionPath::Backend,
                    fallback_reason: None,
                }
            }
            Err(reason) => {
                warn!(reason = %reason, "Backend decision unusable, using keyword rules");
                Decision {
                    outcome: rule_based(message),
                    path: DecisionPath::RuleBased,
                    fallback_reason: Some(reason),
                }
            }
        }
    }

    async fn ask_backend(&self, backend: &CompletionBackend, message: &str, context: &str) -> Result<DecisionOutcome, String> {
        let prompt = self.decision_prompt(message, context);
        let reply = backend
            .complete(DECISION_SYSTEM_PROMPT, vec![Message::user(prompt)], self.temperature, self.max_tokens)
            .await
            .map_err(|e| e.to_string())?;
        let outcome = DecisionOutcome::parse(&reply).map_err(|e| e.to_string())?;
        if let Some(name) = outcome.tool_name() {
            if !self.tools.iter().any(|t| t.name == name) {
                return Err(format!("unknown tool: {name}"));
            }
        }
        Ok(outcome)
    }

    fn decision_prompt(&self, message: &str, context: &str) -> String {
        let tools = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {} - {}", i + 1, t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = format!(
            "Based on the user's message, decide if you need to use a tool.\n\n\
             User message: \"{message}\"\n\n\
             Available tools:\n{tools}\n\n"
        );
        if !context.trim().is_empty() {
            prompt.push_str(&format!("Conversation context:\n{context}\n\n"));
        }
        prompt.push_str(
            "Respond with a JSON object:\n\
             {\n    \"use_tool\": true/false,\n    \"tool_name\": \"tool name if using tool, null otherwise\",\n    \
             \"tool_params\": {parameters for the tool},\n    \"reasoning\": \"brief explanation of your decision\"\n}\n\n\
             If the user is just having a conversation or asking a general question, set use_tool to false.\n\
             If they want to perform an action or need specific information, use the appropriate tool.",
        );
        prompt
    }
}

/// Lowercased words of `text`, punctuation removed. Hyphens inside a word
/// are kept.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` occurs in `words` as a contiguous run of whole words.
fn has_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
}

fn any_phrase(words: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|p| has_phrase(words, p))
}

/// The value of the first entry of `table` whose key occurs in `words`.
fn first_match(words: &[String], table: &[(&str, &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| has_phrase(words, key))
        .map(|&(_, value)| value)
}

fn iso_date(text: &str) -> Option<NaiveDate> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .find_map(|token| NaiveDate::parse_from_str(token, "%Y-%m-%d").ok())
}

fn first_number(words: &[String]) -> Option<u64> {
    words.iter().find_map(|w| w.trim_start_matches('#').parse().ok())
}

/// Pick a tool from keyword categories, checked in fixed priority:
/// applications, research, essays, tasks. First match wins.
pub fn rule_based(message: &str) -> DecisionOutcome {
    let words = words(message);

    if any_phrase(&words, APP_KEYWORDS) {
        return DecisionOutcome::tool(
            APPLICATION_DATABASE,
            application_arguments(message, &words),
            "User wants to manage applications",
        );
    }

    if any_phrase(&words, RESEARCH_KEYWORDS) {
        let mut args = ToolArgs::new();
        args.insert("school".into(), json!(first_match(&words, SCHOOLS).unwrap_or("unknown")));
        args.insert(
            "program".into(),
            json!(first_match(&words, PROGRAMS).unwrap_or(DEFAULT_RESEARCH_PROGRAM)),
        );
        args.insert("info_type".into(), json!("all"));
        return DecisionOutcome::tool(PROGRAM_RESEARCH, args, "User wants program information");
    }

    if any_phrase(&words, ESSAY_KEYWORDS) {
        let mut args = ToolArgs::new();
        args.insert("essay_text".into(), json!(message));
        args.insert("analysis_type".into(), json!("full"));
        return DecisionOutcome::tool(ESSAY_ANALYZER, args, "User wants essay feedback");
    }

    if any_phrase(&words, TASK_KEYWORDS) {
        return DecisionOutcome::tool(CALENDAR_TODO, task_arguments(message, &words), "User wants to manage tasks");
    }

    DecisionOutcome::direct("General conversation - no tool needed")
}

fn application_arguments(message: &str, words: &[String]) -> ToolArgs {
    let action = if any_phrase(words, &["add", "create", "new"]) {
        "create"
    } else if any_phrase(words, &["update", "change", "move"]) {
        "update"
    } else if any_phrase(words, &["delete", "remove"]) {
        "delete"
    } else {
        "read"
    };

    let mut args = ToolArgs::new();
    args.insert("action".into(), json!(action));
    match action {
        "create" => {
            if let Some(school) = first_match(words, SCHOOLS) {
                args.insert("school_name".into(), json!(school));
            }
            if let Some(program) = first_match(words, PROGRAMS) {
                args.insert("program_name".into(), json!(program));
            }
            if let Some(degree) = first_match(words, DEGREES) {
                args.insert("degree_type".into(), json!(degree));
            }
            if let Some(deadline) = iso_date(message) {
                args.insert("deadline".into(), json!(deadline));
            }
        }
        "update" => {
            if let Some(id) = first_number(words) {
                args.insert("app_id".into(), json!(id));
            }
            if let Some(status) = first_match(words, STATUSES) {
                args.insert("status".into(), json!(status));
            }
            if let Some(deadline) = iso_date(message) {
                args.insert("deadline".into(), json!(deadline));
            }
        }
        "delete" => {
            if let Some(id) = first_number(words) {
                args.insert("app_id".into(), json!(id));
            }
        }
        _ => {}
    }
    args
}

fn task_arguments(message: &str, words: &[String]) -> ToolArgs {
    let action = if any_phrase(words, &["upcoming", "due soon", "this week"]) {
        "upcoming"
    } else if any_phrase(words, &["create", "add", "new task"]) {
        "create_task"
    } else if any_phrase(words, &["complete", "done", "finish"]) {
        "complete_task"
    } else {
        "list_tasks"
    };

    let mut args = ToolArgs::new();
    args.insert("action".into(), json!(action));
    match action {
        "create_task" => {
            args.insert("title".into(), Value::String(message.trim().to_string()));
            if let Some(due) = iso_date(message) {
                args.insert("due_date".into(), json!(due));
            }
        }
        "complete_task" => {
            if let Some(id) = first_number(words) {
                args.insert("task_id".into(), json!(id));
            }
        }
        _ => {}
    }
    args
}
