//! Indented outline rendering for project hierarchies.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Item, ItemType, ProjectSummary};

/// Render the outline and per-type totals for one project's items.
pub fn summarize(items: &[Item], depth: usize) -> ProjectSummary {
    ProjectSummary {
        text: render_outline(items, depth),
        counts: count_by_type(items),
    }
}

/// Render a forest as an indented bullet list.
///
/// Roots sit at level 0 and only levels below `depth` are emitted, so
/// `depth == 1` shows roots alone and `depth == 0` renders nothing. Siblings
/// appear in id order.
///
/// Example output:
/// ```text
/// - Epic: Onboarding
///   - Capability: Accounts
///     - Feature: Password Login
/// - Epic: Billing
/// ```
pub fn render_outline(items: &[Item], depth: usize) -> String {
    if depth == 0 {
        return String::new();
    }

    let mut children: HashMap<Option<i64>, Vec<&Item>> = HashMap::new();
    for item in items {
        children.entry(item.parent_id).or_default().push(item);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|item| item.id);
    }

    let mut lines = Vec::new();
    // Pre-order: push siblings in reverse so the lowest id pops first.
    let mut stack: Vec<(&Item, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|item| (*item, 0)).collect())
        .unwrap_or_default();

    while let Some((item, level)) = stack.pop() {
        lines.push(format!(
            "{}- {}: {}",
            "  ".repeat(level),
            item.item_type,
            item.title
        ));

        if level + 1 < depth {
            if let Some(kids) = children.get(&Some(item.id)) {
                stack.extend(kids.iter().rev().map(|kid| (*kid, level + 1)));
            }
        }
    }

    lines.join("\n")
}

/// Count items per type. Every type is present, zero when absent.
pub fn count_by_type(items: &[Item]) -> BTreeMap<ItemType, usize> {
    let mut counts: BTreeMap<ItemType, usize> = ItemType::ALL.iter().map(|t| (*t, 0)).collect();
    for item in items {
        *counts.entry(item.item_type).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(id: i64, parent_id: Option<i64>, item_type: ItemType, title: &str) -> Item {
        Item {
            id,
            project_id: 1,
            item_type,
            title: title.to_string(),
            description: None,
            status: "draft".to_string(),
            parent_id,
        }
    }

    fn sample() -> Vec<Item> {
        vec![
            make_item(1, None, ItemType::Epic, "Onboarding"),
            make_item(2, Some(1), ItemType::Capability, "Accounts"),
            make_item(3, Some(2), ItemType::Feature, "Password Login"),
            make_item(4, Some(3), ItemType::UserStory, "Reset password"),
            make_item(5, None, ItemType::Epic, "Billing"),
        ]
    }

    #[test]
    fn test_empty_project() {
        let summary = summarize(&[], 3);
        assert_eq!(summary.text, "");
        assert_eq!(summary.counts.len(), 5);
        assert!(summary.counts.values().all(|c| *c == 0));
    }

    #[test]
    fn test_depth_one_shows_roots_only() {
        let output = render_outline(&sample(), 1);
        assert_eq!(output, "- Epic: Onboarding\n- Epic: Billing");
    }

    #[test]
    fn test_default_depth_stops_at_third_level() {
        let output = render_outline(&sample(), 3);
        let expected = "- Epic: Onboarding\n  - Capability: Accounts\n    - Feature: Password Login\n- Epic: Billing";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_depth_zero_renders_nothing() {
        assert_eq!(render_outline(&sample(), 0), "");
    }

    #[test]
    fn test_siblings_render_in_id_order() {
        let items = vec![
            make_item(9, Some(1), ItemType::Feature, "Second"),
            make_item(1, None, ItemType::Epic, "Root"),
            make_item(4, Some(1), ItemType::Feature, "First"),
        ];
        let output = render_outline(&items, 2);
        assert_eq!(
            output,
            "- Epic: Root\n  - Feature: First\n  - Feature: Second"
        );
    }

    #[test]
    fn test_counts_ignore_depth() {
        let summary = summarize(&sample(), 1);
        assert_eq!(summary.counts[&ItemType::Epic], 2);
        assert_eq!(summary.counts[&ItemType::Capability], 1);
        assert_eq!(summary.counts[&ItemType::Feature], 1);
        assert_eq!(summary.counts[&ItemType::UserStory], 1);
        assert_eq!(summary.counts[&ItemType::UseCase], 0);
    }

    #[test]
    fn test_orphans_are_counted_but_not_rendered() {
        let items = vec![
            make_item(1, None, ItemType::Epic, "Root"),
            make_item(2, Some(99), ItemType::Feature, "Dangling"),
        ];
        let summary = summarize(&items, 3);
        assert_eq!(summary.text, "- Epic: Root");
        assert_eq!(summary.counts[&ItemType::Feature], 1);
    }
}
