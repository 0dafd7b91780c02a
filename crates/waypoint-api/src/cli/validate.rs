//! `wpt validate`: compile a configuration file without touching state.

use std::path::Path;

use anyhow::Result;
use console::style;

use waypoint_core::definition::load_graph;

pub fn validate(path: &Path, json: bool) -> Result<()> {
    match load_graph(path) {
        Ok(graph) => {
            let mut nodes: Vec<&str> = graph.node_ids().collect();
            nodes.sort_unstable();
            if json {
                let body = serde_json::json!({
                    "valid": true,
                    "root": graph.root_id(),
                    "actions": nodes,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!();
                println!(
                    "  {} {} is valid ({} actions, root '{}')",
                    style("✓").green().bold(),
                    style(path.display()).cyan(),
                    nodes.len(),
                    graph.root_id()
                );
                for node in graph.nodes() {
                    let edges = match (node.success_edge(), node.failure_edge()) {
                        (None, None) => String::new(),
                        (s, f) => format!(
                            " -> {} / {}",
                            s.unwrap_or("end"),
                            f.unwrap_or("fail")
                        ),
                    };
                    println!(
                        "    {} ({}){}",
                        style(node.id()).bold(),
                        node.action_type(),
                        style(edges).dim()
                    );
                }
                println!();
            }
            Ok(())
        }
        Err(err) => {
            if json {
                let body = serde_json::json!({
                    "valid": false,
                    "error": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(anyhow::Error::new(err).context(format!("{} is invalid", path.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_good_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(
            &path,
            r#"{"type":"Echo","config":{"actionId":"a1","constants":{"text":"Hola"}},
               "onSuccess":{"type":"Echo","config":{"actionId":"a2","inputSources":{"x":"GET:a1:text"}}}}"#,
        )
        .unwrap();

        validate(&path, true).unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        std::fs::write(
            &path,
            "type: Echo\nconfig:\n  actionId: a1\n  inputSources:\n    x: \"GET:nowhere:text\"\n",
        )
        .unwrap();

        let err = validate(&path, true).unwrap_err();
        assert!(err.to_string().contains("is invalid"), "got: {err}");
    }
}
