//! grouping of field diffs into executable operations.

use crate::types::{DiffKind, FieldDiff, PlannedOp, PlannedUpdate};
use std::collections::BTreeSet;

/// group actionable diffs into operations.
///
/// every recreate diff lands in a single `Recreate` op; update diffs are
/// grouped per named operation in order of first appearance.
pub fn plan(diffs: &[FieldDiff]) -> Vec<PlannedOp> {
    let mut recreate = Vec::new();
    let mut updates: Vec<(&'static str, Vec<FieldDiff>)> = Vec::new();

    for diff in diffs {
        match diff.kind {
            DiffKind::Informational => {}
            DiffKind::Recreate => recreate.push(diff.clone()),
            DiffKind::Update(operation) => {
                match updates.iter_mut().find(|(name, _)| *name == operation) {
                    Some((_, grouped)) => grouped.push(diff.clone()),
                    None => updates.push((operation, vec![diff.clone()])),
                }
            }
        }
    }

    let mut ops = Vec::new();
    if !recreate.is_empty() {
        ops.push(PlannedOp::Recreate { diffs: recreate });
    }
    for (operation, diffs) in updates {
        ops.push(PlannedOp::Update(PlannedUpdate {
            operation,
            update_mask: update_mask(&diffs),
            diffs,
        }));
    }
    ops
}

/// sorted, deduplicated snake_case top-level fields touched by the diffs.
pub fn update_mask(diffs: &[FieldDiff]) -> Vec<String> {
    diffs
        .iter()
        .map(|diff| snake_case(diff.top_level_field()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff(field: &str, kind: DiffKind) -> FieldDiff {
        FieldDiff {
            field: field.to_string(),
            desired: json!("a"),
            actual: json!("b"),
            kind,
        }
    }

    #[test]
    fn recreate_diffs_collapse_into_one_op() {
        let ops = plan(&[
            diff("location", DiffKind::Recreate),
            diff("description", DiffKind::Update("update")),
            diff("name", DiffKind::Recreate),
        ]);
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            PlannedOp::Recreate { diffs } => assert_eq!(diffs.len(), 2),
            other => panic!("expected recreate, got {other:?}"),
        }
    }

    #[test]
    fn updates_group_by_operation_in_first_seen_order() {
        let ops = plan(&[
            diff("labels", DiffKind::Update("second")),
            diff("description", DiffKind::Update("first")),
            diff("annotations", DiffKind::Update("second")),
        ]);
        let names: Vec<_> = ops
            .iter()
            .map(|op| match op {
                PlannedOp::Update(update) => (update.operation, update.diffs.len()),
                PlannedOp::Recreate { .. } => ("recreate", 0),
            })
            .collect();
        assert_eq!(names, vec![("second", 2), ("first", 1)]);
    }

    #[test]
    fn informational_diffs_plan_nothing() {
        assert!(plan(&[diff("uid", DiffKind::Informational)]).is_empty());
        assert!(plan(&[]).is_empty());
    }

    #[test]
    fn mask_uses_snake_case_top_level_fields() {
        let mask = update_mask(&[
            diff("serialPipeline.stages[1].targetId", DiffKind::Update("u")),
            diff("serialPipeline.stages", DiffKind::Update("u")),
            diff("requireApproval", DiffKind::Update("u")),
            diff("executionConfigs[0].usages", DiffKind::Update("u")),
        ]);
        assert_eq!(
            mask,
            vec!["execution_configs", "require_approval", "serial_pipeline"]
        );
    }
}
