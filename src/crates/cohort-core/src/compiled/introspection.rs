//! Topology listing

use super::CompiledGraph;
use crate::graph::END;
use std::fmt::Write;

impl CompiledGraph {
    /// All transitions as `(source, label, target)`; label is the branch key
    /// for conditional edges and empty for static ones.
    pub fn transitions(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for node in &self.plan.order {
            let Some(edges) = self.plan.edges.get(node) else {
                continue;
            };
            if let Some(target) = edges.direct() {
                out.push((node.clone(), String::new(), target.to_string()));
            }
            if let Some(conditional) = edges.conditional() {
                for (key, target) in conditional.branches() {
                    out.push((node.clone(), key.clone(), target.clone()));
                }
            }
        }
        out
    }

    /// Human-readable listing of nodes and edges
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} (entry: {})", self.plan.name, self.plan.entry);
        for (source, label, target) in self.transitions() {
            let target = if target == END { "END" } else { target.as_str() };
            if label.is_empty() {
                let _ = writeln!(out, "  {source} -> {target}");
            } else {
                let _ = writeln!(out, "  {source} -[{label}]-> {target}");
            }
        }
        out
    }
}
