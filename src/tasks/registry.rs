//! Task name, priority, and prerequisite registry (C11).
//!
//! Ported from the constant tables on `SubmissionsStorage` in
//! `lib/storage/submissions.py`: `task_names`, `task_dependencies`, and
//! `expand_recalculation_tasks`. Six entries is small enough that a plain
//! slice beats a build-time map.

/// Canonical task set, in priority/declaration order.
pub const TASK_NAMES: &[&str] =
    &["split_topic_generation", "subtopics_generation", "summarization", "mindmap", "insides", "prefix_tree"];

/// `(task, [prerequisite, ...])` edges. Every non-root task depends on
/// `split_topic_generation` only — there is no inter-dependency among the
/// derived-artifact tasks themselves (`spec.md` §4.11).
const TASK_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("split_topic_generation", &[]),
    ("subtopics_generation", &["split_topic_generation"]),
    ("summarization", &["split_topic_generation"]),
    ("mindmap", &["split_topic_generation"]),
    ("insides", &["split_topic_generation"]),
    ("prefix_tree", &["split_topic_generation"]),
];

/// Priority class for a task name: lower claims first. `spec.md` §4.11
/// fixes `split_topic_generation=1`, `subtopics_generation=2`, the rest at
/// `3`.
pub fn priority_of(task_name: &str) -> i32 {
    match task_name {
        "split_topic_generation" => 1,
        "subtopics_generation" => 2,
        _ => 3,
    }
}

pub fn is_known_task(task_name: &str) -> bool {
    TASK_NAMES.contains(&task_name)
}

fn dependencies_of(task_name: &str) -> &'static [&'static str] {
    TASK_DEPENDENCIES.iter().find(|(name, _)| *name == task_name).map(|(_, deps)| *deps).unwrap_or(&[])
}

/// Expand a requested task set into its transitive downstream closure: if
/// `split_topic_generation` is requested, every other task is pulled in
/// (they all depend on it, directly); if only a leaf is requested, the
/// closure is just that leaf. `None` or the literal token `"all"` expands
/// to every known task. Unknown names are silently dropped (callers that
/// need to reject them, e.g. the HTTP refresh endpoint, validate before
/// calling this).
///
/// Returned in [`TASK_NAMES`] order, matching the original's `[name for
/// name in self.task_names if name in expanded]`.
pub fn expand_recalculation_tasks(requested: Option<&[String]>) -> Vec<String> {
    let requested = match requested {
        None => return TASK_NAMES.iter().map(|s| s.to_string()).collect(),
        Some(names) if names.iter().any(|n| n == "all") => {
            return TASK_NAMES.iter().map(|s| s.to_string()).collect()
        }
        Some(names) => names,
    };

    let mut expanded: Vec<bool> = vec![false; TASK_NAMES.len()];
    for name in requested {
        if let Some(idx) = TASK_NAMES.iter().position(|&t| t == name) {
            expanded[idx] = true;
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (idx, &task_name) in TASK_NAMES.iter().enumerate() {
            if expanded[idx] {
                continue;
            }
            let deps = dependencies_of(task_name);
            if deps.iter().any(|dep| {
                TASK_NAMES.iter().position(|&t| t == *dep).map(|i| expanded[i]).unwrap_or(false)
            }) {
                expanded[idx] = true;
                changed = true;
            }
        }
    }

    TASK_NAMES
        .iter()
        .enumerate()
        .filter(|(idx, _)| expanded[*idx])
        .map(|(_, &name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requesting_root_task_pulls_in_everything() {
        let expanded = expand_recalculation_tasks(Some(&["split_topic_generation".to_string()]));
        assert_eq!(expanded, TASK_NAMES.to_vec());
    }

    #[test]
    fn requesting_a_leaf_only_expands_to_itself() {
        let expanded = expand_recalculation_tasks(Some(&["mindmap".to_string()]));
        assert_eq!(expanded, vec!["mindmap".to_string()]);
    }

    #[test]
    fn all_token_expands_to_everything() {
        let expanded = expand_recalculation_tasks(Some(&["all".to_string()]));
        assert_eq!(expanded, TASK_NAMES.to_vec());
    }

    #[test]
    fn none_expands_to_everything() {
        assert_eq!(expand_recalculation_tasks(None), TASK_NAMES.to_vec());
    }

    #[test]
    fn unknown_names_are_dropped() {
        let expanded = expand_recalculation_tasks(Some(&["bogus".to_string(), "insides".to_string()]));
        assert_eq!(expanded, vec!["insides".to_string()]);
    }

    #[test]
    fn priorities_match_spec() {
        assert_eq!(priority_of("split_topic_generation"), 1);
        assert_eq!(priority_of("subtopics_generation"), 2);
        assert_eq!(priority_of("summarization"), 3);
        assert_eq!(priority_of("prefix_tree"), 3);
    }
}
