//! Pre-execution workflow validation: every dependency must name a task
//! that exists in the same workflow, and the dependency graph must be
//! acyclic.

use std::collections::HashMap;

use fleetwire_types::{AgentTask, FleetwireError, FleetwireResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

pub fn validate(tasks: &[AgentTask]) -> FleetwireResult<()> {
    let by_id: HashMap<&str, &AgentTask> =
        tasks.iter().map(|task| (task.task_id.as_str(), task)).collect();

    for task in tasks {
        for dep in &task.depends_on {
            if !by_id.contains_key(dep.as_str()) {
                return Err(FleetwireError::UnknownDependency {
                    task_id: task.task_id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }

    let mut colors: HashMap<&str, Color> =
        tasks.iter().map(|task| (task.task_id.as_str(), Color::White)).collect();

    for task in tasks {
        if colors[task.task_id.as_str()] == Color::White {
            let mut path = Vec::new();
            visit(task.task_id.as_str(), &by_id, &mut colors, &mut path)?;
        }
    }

    Ok(())
}

fn visit<'a>(
    task_id: &'a str,
    by_id: &HashMap<&'a str, &'a AgentTask>,
    colors: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
) -> FleetwireResult<()> {
    colors.insert(task_id, Color::Grey);
    path.push(task_id);

    for dep in &by_id[task_id].depends_on {
        let dep = dep.as_str();
        match colors[dep] {
            Color::White => visit(dep, by_id, colors, path)?,
            Color::Grey => {
                let start = path.iter().position(|id| *id == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(dep.to_string());
                return Err(FleetwireError::CircularDependency { cycle });
            }
            Color::Black => {}
        }
    }

    path.pop();
    colors.insert(task_id, Color::Black);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwire_types::Phase;
    use serde_json::json;

    fn task(id: &str, depends_on: &[&str]) -> AgentTask {
        AgentTask::new(
            id,
            "scout",
            Phase::Scout,
            json!({}),
            depends_on.iter().map(|d| d.to_string()).collect(),
        )
    }

    #[test]
    fn accepts_acyclic_graph() {
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["a", "b"])];
        assert!(validate(&tasks).is_ok());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let tasks = vec![task("a", &["missing"])];
        let err = validate(&tasks).unwrap_err();
        assert!(matches!(err, FleetwireError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_cycle() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let err = validate(&tasks).unwrap_err();
        assert!(matches!(err, FleetwireError::CircularDependency { .. }));
    }

    #[test]
    fn rejects_self_cycle() {
        let tasks = vec![task("a", &["a"])];
        let err = validate(&tasks).unwrap_err();
        assert!(matches!(err, FleetwireError::CircularDependency { .. }));
    }
}
