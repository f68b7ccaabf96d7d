use super::weekday::WeekdaySet;
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    SchoolYear,
    GradeLevel,
    Course,
    Task,
    Resource,
}

impl RecordKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::SchoolYear => "school year",
            Self::GradeLevel => "grade level",
            Self::Course => "course",
            Self::Task => "task",
            Self::Resource => "resource",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::SchoolYear => "school years",
            Self::GradeLevel => "grade levels",
            Self::Course => "courses",
            Self::Task => "tasks",
            Self::Resource => "resources",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-facing validation failures. None of these are fatal; the caller
/// reports them as a single non-field error and applies nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("A school year is missing.")]
    MissingSchoolYear,

    #[error("The course must run within school year days: {allowed}")]
    DaysOutsideSchoolYear {
        allowed: WeekdaySet,
        offending: WeekdaySet,
    },

    #[error("Invalid {0}.")]
    InvalidReference(RecordKind),

    #[error("{}", cross_tenant_message(.item, .target))]
    CrossTenantAccess {
        item: RecordKind,
        target: Option<RecordKind>,
    },

    #[error("You need to select at least one {0}.")]
    NoSelection(RecordKind),

    #[error("Sorry, you do not have permission to delete the selected {}.", .0.plural())]
    PermissionDenied(RecordKind),
}

fn cross_tenant_message(item: &RecordKind, target: &Option<RecordKind>) -> String {
    match target {
        Some(target) => format!("You may not add a {item} to another user's {target}."),
        None => format!("You may not change another user's {item}."),
    }
}

impl RuleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSchoolYear => "missing_school_year",
            Self::DaysOutsideSchoolYear { .. } => "days_outside_school_year",
            Self::InvalidReference(_) => "invalid_reference",
            Self::CrossTenantAccess { .. } => "cross_tenant_access",
            Self::NoSelection(_) => "no_selection",
            Self::PermissionDenied(_) => "permission_denied",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DaysOutsideSchoolYear { allowed, offending } => Some(json!({
                "allowedDays": allowed,
                "offendingDays": offending,
            })),
            Self::InvalidReference(kind) | Self::NoSelection(kind) | Self::PermissionDenied(kind) => {
                Some(json!({ "kind": kind.label() }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn messages_match_product_copy() {
        assert_eq!(
            RuleError::MissingSchoolYear.to_string(),
            "A school year is missing."
        );
        assert_eq!(
            RuleError::InvalidReference(RecordKind::Course).to_string(),
            "Invalid course."
        );
        assert_eq!(
            RuleError::CrossTenantAccess {
                item: RecordKind::Task,
                target: Some(RecordKind::Course),
            }
            .to_string(),
            "You may not add a task to another user's course."
        );
        assert_eq!(
            RuleError::CrossTenantAccess {
                item: RecordKind::GradeLevel,
                target: None,
            }
            .to_string(),
            "You may not change another user's grade level."
        );
        assert_eq!(
            RuleError::NoSelection(RecordKind::Task).to_string(),
            "You need to select at least one task."
        );
        assert_eq!(
            RuleError::PermissionDenied(RecordKind::Task).to_string(),
            "Sorry, you do not have permission to delete the selected tasks."
        );
    }

    #[test]
    fn days_error_lists_allowed_days_and_carries_offending_ones() {
        let allowed: WeekdaySet = [Weekday::Mon].into_iter().collect();
        let offending: WeekdaySet = [Weekday::Tue].into_iter().collect();
        let e = RuleError::DaysOutsideSchoolYear { allowed, offending };

        assert_eq!(
            e.to_string(),
            "The course must run within school year days: Monday"
        );
        assert_eq!(e.code(), "days_outside_school_year");
        let details = e.details().expect("details");
        assert_eq!(details["offendingDays"], json!(["Tuesday"]));
        assert_eq!(details["allowedDays"], json!(["Monday"]));
    }
}
