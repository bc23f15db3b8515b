//! Terminal rendering of runs and topologies

use cohort_core::messages::history;
use cohort_core::{CompiledGraph, StepEvent, END};
use colored::Colorize;
use serde_json::Value;
use std::fmt::Write;

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn display_target(target: &str) -> &str {
    if target == END {
        "END"
    } else {
        target
    }
}

/// One step between `--- START ---` and `--- END ---` markers
pub fn format_step(event: &StepEvent, show_state: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "--- START ---".green().bold());
    let _ = writeln!(
        out,
        "step {}: {} {} {}",
        event.step,
        event.node.magenta().bold(),
        "->".dimmed(),
        display_target(&event.next).cyan()
    );
    let _ = writeln!(out, "{}\n{}", "update:".yellow(), pretty(&event.update));
    if show_state {
        let _ = writeln!(out, "{}\n{}", "state:".yellow(), pretty(&event.state));
    }
    let _ = write!(out, "{}", "--- END ---".green().bold());
    out
}

/// Closing summary: the last supervisor reasoning and the last message
pub fn format_summary(state: &Value) -> String {
    let mut out = String::new();
    if let Some(reasoning) = state.get("reasoning").and_then(Value::as_str) {
        let _ = writeln!(out, "{} {}", "Final reasoning:".bold(), reasoning);
    }
    if let Some(last) = history(state).last() {
        let author = last.name.as_deref().unwrap_or(last.role.as_str());
        let _ = writeln!(out, "{} ({})\n{}", "Last message".bold(), author, last.content);
    }
    out
}

/// Node and edge listing of a graph
pub fn format_topology(graph: &CompiledGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        graph.name().bold(),
        format!("(entry: {}, step limit: {})", graph.entry_point(), graph.step_limit()).dimmed()
    );
    let _ = writeln!(out, "  nodes: {}", graph.node_names().join(", "));
    for (source, label, target) in graph.transitions() {
        if label.is_empty() {
            let _ = writeln!(out, "  {} -> {}", source, display_target(&target));
        } else {
            let _ = writeln!(
                out,
                "  {} -[{}]-> {}",
                source,
                label.cyan(),
                display_target(&target)
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(next: &str) -> StepEvent {
        StepEvent {
            step: 2,
            node: "supervisor".into(),
            update: json!({"next": "FINISH"}),
            state: json!({"messages": [], "next": "FINISH"}),
            next: next.into(),
        }
    }

    #[test]
    fn test_format_step_markers() {
        colored::control::set_override(false);
        let text = format_step(&event(END), false);
        assert!(text.starts_with("--- START ---\nstep 2: supervisor -> END\n"));
        assert!(text.contains("\"next\": \"FINISH\""));
        assert!(!text.contains("state:"));
        assert!(text.ends_with("--- END ---"));

        assert!(format_step(&event("Search"), true).contains("state:"));
    }

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let state = json!({
            "reasoning": "all done",
            "messages": [
                {"role": "human", "content": "question"},
                {"role": "human", "content": "answer", "name": "ChartGeneratingTeam"}
            ]
        });
        let text = format_summary(&state);
        assert!(text.contains("Final reasoning: all done"));
        assert!(text.contains("Last message (ChartGeneratingTeam)\nanswer"));
    }
}
