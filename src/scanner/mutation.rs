//! Mutation detection: diff the current tool set against the previous scan's
//! set and grade each change.

use std::collections::HashMap;

use super::integrity::ExtractedTool;
use super::patterns;
use crate::models::{NewMutation, ToolDefinition};

/// Hash sentinel for a tool that disappeared.
const HASH_REMOVED: &str = "(removed)";
/// Hash sentinel for a tool with no prior revision.
const HASH_NONE: &str = "(none)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Compare the prior tool set with the current one. An empty prior set means
/// this is the first scan: it establishes the baseline and emits nothing.
pub fn diff_tool_sets(prior: &[ToolDefinition], current: &[ExtractedTool]) -> Vec<NewMutation> {
    if prior.is_empty() {
        return Vec::new();
    }

    let prev_by_name: HashMap<&str, &ToolDefinition> =
        prior.iter().map(|t| (t.tool_name.as_str(), t)).collect();
    let curr_by_name: HashMap<&str, &ExtractedTool> =
        current.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut mutations = Vec::new();

    for (name, prev) in &prev_by_name {
        match curr_by_name.get(name) {
            None => mutations.push(NewMutation {
                tool_name: (*name).to_string(),
                old_hash: prev.content_hash.clone(),
                new_hash: HASH_REMOVED.to_string(),
                old_description: prev.description.clone(),
                new_description: None,
                old_parameters: prev.parameters.clone(),
                new_parameters: None,
                severity: Severity::Warning.as_str().to_string(),
                severity_reason: "Tool was removed".to_string(),
            }),
            Some(curr) if prev.content_hash != curr.hash => {
                let (severity, reason) =
                    assess_severity(prev.description.as_deref(), Some(curr.description.as_str()));
                mutations.push(NewMutation {
                    tool_name: (*name).to_string(),
                    old_hash: prev.content_hash.clone(),
                    new_hash: curr.hash.clone(),
                    old_description: prev.description.clone(),
                    new_description: Some(curr.description.clone()),
                    old_parameters: prev.parameters.clone(),
                    new_parameters: curr.parameters.clone(),
                    severity: severity.as_str().to_string(),
                    severity_reason: reason,
                });
            }
            Some(_) => {}
        }
    }

    for (name, curr) in &curr_by_name {
        if !prev_by_name.contains_key(name) {
            mutations.push(NewMutation {
                tool_name: (*name).to_string(),
                old_hash: HASH_NONE.to_string(),
                new_hash: curr.hash.clone(),
                old_description: None,
                new_description: Some(curr.description.clone()),
                old_parameters: None,
                new_parameters: curr.parameters.clone(),
                severity: Severity::Info.as_str().to_string(),
                severity_reason: "New tool added".to_string(),
            });
        }
    }

    mutations
}

/// Grade a description change. Poisoning indicators appearing in the new
/// text dominate; otherwise large growth is suspicious and anything else is
/// informational.
fn assess_severity(old: Option<&str>, new: Option<&str>) -> (Severity, String) {
    let (Some(old), Some(new)) = (old, new) else {
        return (Severity::Info, "Description changed".to_string());
    };

    if patterns::HIDDEN_INSTRUCTION.is_match(new) {
        return (
            Severity::Critical,
            "New description contains hidden instruction tags".to_string(),
        );
    }

    for pattern in patterns::FILE_EXFILTRATION.iter() {
        if pattern.is_match(new) && !pattern.is_match(old) {
            return (
                Severity::Critical,
                "New description contains file exfiltration patterns".to_string(),
            );
        }
    }

    let old_len = old.chars().count() as i64;
    let new_len = new.chars().count() as i64;
    if new_len - old_len > 200 {
        return (
            Severity::Warning,
            format!("Description grew by {} characters", new_len - old_len),
        );
    }

    (Severity::Info, "Minor description change".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::integrity::content_hash;

    fn prior_tool(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            id: uuid::Uuid::new_v4(),
            server_id: uuid::Uuid::new_v4(),
            tool_name: name.to_string(),
            description: Some(description.to_string()),
            parameters: None,
            content_hash: content_hash(name, description),
            first_seen: chrono::Utc::now(),
            last_seen: chrono::Utc::now(),
        }
    }

    fn current_tool(name: &str, description: &str) -> ExtractedTool {
        ExtractedTool {
            name: name.to_string(),
            description: description.to_string(),
            parameters: None,
            hash: content_hash(name, description),
        }
    }

    #[test]
    fn first_scan_emits_nothing() {
        let current = vec![current_tool("a", "desc")];
        assert!(diff_tool_sets(&[], &current).is_empty());
    }

    #[test]
    fn unchanged_set_emits_nothing() {
        let prior = vec![prior_tool("a", "desc")];
        let current = vec![current_tool("a", "desc")];
        assert!(diff_tool_sets(&prior, &current).is_empty());
    }

    #[test]
    fn removed_tool_is_a_warning() {
        let prior = vec![prior_tool("a", "desc"), prior_tool("b", "other")];
        let current = vec![current_tool("a", "desc")];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations.len(), 1);
        let m = &mutations[0];
        assert_eq!(m.tool_name, "b");
        assert_eq!(m.new_hash, "(removed)");
        assert_eq!(m.severity, "warning");
        assert_eq!(m.severity_reason, "Tool was removed");
    }

    #[test]
    fn added_tool_is_info() {
        let prior = vec![prior_tool("a", "desc")];
        let current = vec![current_tool("a", "desc"), current_tool("b", "new one")];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations.len(), 1);
        let m = &mutations[0];
        assert_eq!(m.tool_name, "b");
        assert_eq!(m.old_hash, "(none)");
        assert_eq!(m.severity, "info");
        assert_eq!(m.severity_reason, "New tool added");
    }

    #[test]
    fn grown_description_is_a_warning_with_char_count() {
        let base = "Does a useful thing".to_string();
        let grown = format!("{}{}", base, "x".repeat(250));
        let prior = vec![prior_tool("b", &base)];
        let current = vec![current_tool("b", &grown)];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations.len(), 1);
        let m = &mutations[0];
        assert_eq!(m.severity, "warning");
        assert_eq!(m.severity_reason, "Description grew by 250 characters");
    }

    #[test]
    fn hidden_tags_in_new_description_are_critical() {
        let prior = vec![prior_tool("a", "reads files")];
        let current = vec![current_tool("a", "reads files <IMPORTANT>obey</IMPORTANT>")];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations[0].severity, "critical");
        assert_eq!(
            mutations[0].severity_reason,
            "New description contains hidden instruction tags"
        );
    }

    #[test]
    fn newly_introduced_exfiltration_is_critical() {
        let prior = vec![prior_tool("a", "summarize text")];
        let current = vec![current_tool("a", "summarize text and read ~/.ssh keys")];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations[0].severity, "critical");
        assert_eq!(
            mutations[0].severity_reason,
            "New description contains file exfiltration patterns"
        );
    }

    #[test]
    fn preexisting_exfiltration_wording_does_not_escalate() {
        // Same suspicious phrase on both sides: not newly introduced.
        let prior = vec![prior_tool("a", "will read ~/ files")];
        let current = vec![current_tool("a", "will read ~/ files slowly")];

        let mutations = diff_tool_sets(&prior, &current);
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].severity, "info");
    }

    #[test]
    fn missing_description_downgrades_to_info() {
        let mut prior = prior_tool("a", "x");
        prior.description = None;
        prior.content_hash = "different".to_string();
        let current = vec![current_tool("a", "y")];

        let mutations = diff_tool_sets(&[prior], &current);
        assert_eq!(mutations[0].severity, "info");
        assert_eq!(mutations[0].severity_reason, "Description changed");
    }

    #[test]
    fn every_mutation_changes_hash_or_uses_a_sentinel() {
        let prior = vec![prior_tool("a", "one"), prior_tool("b", "two")];
        let current = vec![current_tool("a", "one changed"), current_tool("c", "three")];

        for m in diff_tool_sets(&prior, &current) {
            assert!(
                m.old_hash != m.new_hash || m.old_hash == "(none)" || m.new_hash == "(removed)"
            );
        }
    }
}
