use super::error::RuleError;
use super::weekday::WeekdaySet;

/// Days a course asks for that its school year does not run.
pub fn offending_days(school_year_days: WeekdaySet, course_days: WeekdaySet) -> WeekdaySet {
    course_days.difference(school_year_days)
}

pub fn check_course_days(
    school_year_days: WeekdaySet,
    course_days: WeekdaySet,
) -> Result<(), RuleError> {
    if course_days.is_subset(school_year_days) {
        return Ok(());
    }
    Err(RuleError::DaysOutsideSchoolYear {
        allowed: school_year_days,
        offending: offending_days(school_year_days, course_days),
    })
}

/// A course is validated against the school year it will live in; without
/// one there is nothing to validate against.
pub fn validate_course_schedule(
    school_year_days: Option<WeekdaySet>,
    course_days: WeekdaySet,
) -> Result<(), RuleError> {
    let Some(allowed) = school_year_days else {
        return Err(RuleError::MissingSchoolYear);
    };
    check_course_days(allowed, course_days)
}
