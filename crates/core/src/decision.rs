//! The decision of whether (and which) tool to invoke for a message.
//!
//! [`DecisionOutcome`] cannot express a use-tool flag that disagrees with the
//! presence of a tool name: the flag is derived from the name. The wire form
//! exchanged with the completion backend is [`DecisionDocument`], parsed
//! strictly.

use crate::error::DecisionParseError;
use crate::tool::ToolArgs;
use serde::{Deserialize, Serialize};

/// Whether to invoke a tool, which one, with what, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DecisionDocument", try_from = "DecisionDocument")]
pub struct DecisionOutcome {
    tool_name: Option<String>,
    arguments: ToolArgs,
    rationale: String,
}

impl DecisionOutcome {
    /// Answer directly, no tool.
    pub fn direct(rationale: impl Into<String>) -> Self {
        Self {
            tool_name: None,
            arguments: ToolArgs::new(),
            rationale: rationale.into(),
        }
    }

    /// Invoke `tool_name` with `arguments`.
    pub fn tool(tool_name: impl Into<String>, arguments: ToolArgs, rationale: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            arguments,
            rationale: rationale.into(),
        }
    }

    pub fn use_tool(&self) -> bool {
        self.tool_name.is_some()
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn arguments(&self) -> &ToolArgs {
        &self.arguments
    }

    /// Shorthand for reading a string argument.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Parse a completion backend reply into a decision.
    ///
    /// Tolerates markdown code fences and prose around the JSON object;
    /// rejects unknown fields and flag/name disagreement.
    pub fn parse(reply: &str) -> Result<Self, DecisionParseError> {
        let json = extract_json_object(reply).ok_or(DecisionParseError::NoDocument)?;
        let document: DecisionDocument =
            serde_json::from_str(json).map_err(|e| DecisionParseError::Schema(e.to_string()))?;
        Self::try_from(document)
    }
}

/// The structured decision document the completion backend must return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionDocument {
    pub use_tool: bool,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_params: Option<ToolArgs>,
    #[serde(default)]
    pub reasoning: String,
}

impl From<DecisionOutcome> for DecisionDocument {
    fn from(outcome: DecisionOutcome) -> Self {
        Self {
            use_tool: outcome.use_tool(),
            tool_name: outcome.tool_name,
            tool_params: Some(outcome.arguments),
            reasoning: outcome.rationale,
        }
    }
}

impl TryFrom<DecisionDocument> for DecisionOutcome {
    type Error = DecisionParseError;

    fn try_from(doc: DecisionDocument) -> Result<Self, Self::Error> {
        let name = doc
            .tool_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        match (doc.use_tool, name) {
            (true, Some(name)) => Ok(Self::tool(name, doc.tool_params.unwrap_or_default(), doc.reasoning)),
            (false, None) => Ok(Self::direct(doc.reasoning)),
            (use_tool, _) => Err(DecisionParseError::InconsistentFlag {
                use_tool,
                tool_name: doc.tool_name,
            }),
        }
    }
}

fn extract_json_object(reply: &str) -> Option<&str> {
    let mut text = reply.trim();
    if let Some((_, rest)) = text.split_once("```json") {
        text = rest.split("```").next().unwrap_or(rest);
    } else if let Some((_, rest)) = text.split_once("```") {
        text = rest.split("```").next().unwrap_or(rest);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_document() {
        let reply = r#"{"use_tool": true, "tool_name": "calendar_todo", "tool_params": {"action": "upcoming"}, "reasoning": "asks about deadlines"}"#;
        let outcome = DecisionOutcome::parse(reply).unwrap();
        assert!(outcome.use_tool());
        assert_eq!(outcome.tool_name(), Some("calendar_todo"));
        assert_eq!(outcome.argument_str("action"), Some("upcoming"));
    }

    #[test]
    fn parses_fenced_document() {
        let reply = "Sure!\n```json\n{\"use_tool\": false, \"tool_name\": null, \"tool_params\": {}, \"reasoning\": \"chit-chat\"}\n```";
        let outcome = DecisionOutcome::parse(reply).unwrap();
        assert!(!outcome.use_tool());
        assert_eq!(outcome.rationale(), "chit-chat");
        assert!(outcome.arguments().is_empty());
    }

    #[test]
    fn rejects_flag_without_name() {
        let err = DecisionOutcome::parse(r#"{"use_tool": true, "tool_name": null}"#).unwrap_err();
        assert!(matches!(err, DecisionParseError::InconsistentFlag { use_tool: true, .. }));
    }

    #[test]
    fn rejects_name_without_flag() {
        let err = DecisionOutcome::parse(r#"{"use_tool": false, "tool_name": "essay_analyzer"}"#).unwrap_err();
        assert!(matches!(err, DecisionParseError::InconsistentFlag { use_tool: false, .. }));
    }

    #[test]
    fn rejects_unknown_fields_and_prose() {
        assert!(matches!(
            DecisionOutcome::parse(r#"{"use_tool": false, "confidence": 0.9}"#),
            Err(DecisionParseError::Schema(_))
        ));
        assert_eq!(
            DecisionOutcome::parse("I think you should use a tool."),
            Err(DecisionParseError::NoDocument)
        );
    }

    #[test]
    fn blank_tool_name_counts_as_absent() {
        let outcome = DecisionOutcome::parse(r#"{"use_tool": false, "tool_name": "  "}"#).unwrap();
        assert!(!outcome.use_tool());
    }

    #[test]
    fn serializes_to_wire_document() {
        let mut args = ToolArgs::new();
        args.insert("action".into(), json!("create"));
        let outcome = DecisionOutcome::tool("application_database", args, "wants to add a school");
        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire["use_tool"], true);
        assert_eq!(wire["tool_name"], "application_database");
        assert_eq!(wire["tool_params"]["action"], "create");
    }
}
