use super::error::{RecordKind, RuleError};
use std::collections::BTreeSet;

/// All-or-nothing check for bulk actions. `owned` is the set the caller
/// fetched for the acting tenant; any submitted id outside it rejects the
/// whole batch.
pub fn validate_selection<T>(
    submitted: &BTreeSet<T>,
    owned: &BTreeSet<T>,
    kind: RecordKind,
) -> Result<BTreeSet<T>, RuleError>
where
    T: Ord + Clone,
{
    if submitted.is_empty() {
        return Err(RuleError::NoSelection(kind));
    }
    if !submitted.is_subset(owned) {
        return Err(RuleError::PermissionDenied(kind));
    }
    Ok(submitted.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_submission_is_no_selection() {
        assert_eq!(
            validate_selection(&ids(&[]), &ids(&["a"]), RecordKind::Task),
            Err(RuleError::NoSelection(RecordKind::Task))
        );
    }

    #[test]
    fn any_foreign_id_rejects_batch() {
        assert_eq!(
            validate_selection(&ids(&["a", "z"]), &ids(&["a", "b"]), RecordKind::Task),
            Err(RuleError::PermissionDenied(RecordKind::Task))
        );
    }

    #[test]
    fn owned_submission_is_returned_exactly() {
        let owned = ids(&["a", "b", "c"]);
        assert_eq!(
            validate_selection(&ids(&["a", "c"]), &owned, RecordKind::Task),
            Ok(ids(&["a", "c"]))
        );
    }
}
