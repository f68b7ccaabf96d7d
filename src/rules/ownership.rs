use super::error::{RecordKind, RuleError};

/// A record whose owning school has been resolved by walking
/// task -> course -> grade level -> school year -> school.
///
/// `None` means the chain is broken (e.g. a course with no grade levels),
/// in which case nobody owns the record.
pub trait Tenanted {
    fn owner_school_id(&self) -> Option<&str>;
}

/// The acting side of an ownership check.
pub trait Tenant {
    fn school_id(&self) -> &str;
}

pub fn owns<T, R>(tenant: &T, record: &R) -> bool
where
    T: Tenant + ?Sized,
    R: Tenanted + ?Sized,
{
    record.owner_school_id() == Some(tenant.school_id())
}

/// Resolves a submitted reference the way forms do: an unknown id is an
/// invalid reference, a known id owned by another school is cross-tenant.
///
/// `item` is what is being attached to the record (`None` for in-place edits).
pub fn check_reference<T, R>(
    tenant: &T,
    record: Option<R>,
    kind: RecordKind,
    item: Option<RecordKind>,
) -> Result<R, RuleError>
where
    T: Tenant + ?Sized,
    R: Tenanted,
{
    let Some(record) = record else {
        return Err(RuleError::InvalidReference(kind));
    };
    if !owns(tenant, &record) {
        return Err(match item {
            Some(item) => RuleError::CrossTenantAccess {
                item,
                target: Some(kind),
            },
            None => RuleError::CrossTenantAccess {
                item: kind,
                target: None,
            },
        });
    }
    Ok(record)
}

/// Read-path variant: foreign records are indistinguishable from missing ones.
pub fn visible_to<T, R>(tenant: &T, record: Option<R>) -> Option<R>
where
    T: Tenant + ?Sized,
    R: Tenanted,
{
    record.filter(|r| owns(tenant, r))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct School(&'static str);

    impl Tenant for School {
        fn school_id(&self) -> &str {
            self.0
        }
    }

    #[derive(Debug, PartialEq)]
    struct Record(Option<&'static str>);

    impl Tenanted for Record {
        fn owner_school_id(&self) -> Option<&str> {
            self.0
        }
    }

    #[test]
    fn owns_compares_resolved_school() {
        let me = School("s1");
        assert!(owns(&me, &Record(Some("s1"))));
        assert!(!owns(&me, &Record(Some("s2"))));
        assert!(!owns(&me, &Record(None)));
    }

    #[test]
    fn check_reference_distinguishes_missing_from_foreign() {
        let me = School("s1");
        assert_eq!(
            check_reference(&me, None::<Record>, RecordKind::Course, Some(RecordKind::Task)),
            Err(RuleError::InvalidReference(RecordKind::Course))
        );
        assert_eq!(
            check_reference(
                &me,
                Some(Record(Some("s2"))),
                RecordKind::Course,
                Some(RecordKind::Task)
            ),
            Err(RuleError::CrossTenantAccess {
                item: RecordKind::Task,
                target: Some(RecordKind::Course),
            })
        );
        assert_eq!(
            check_reference(&me, Some(Record(Some("s1"))), RecordKind::Course, None),
            Ok(Record(Some("s1")))
        );
    }

    #[test]
    fn orphaned_records_are_never_owned() {
        let me = School("s1");
        let err = check_reference(&me, Some(Record(None)), RecordKind::Task, None)
            .expect_err("orphan");
        assert_eq!(err.code(), "cross_tenant_access");
        assert_eq!(visible_to(&me, Some(Record(None))), None);
    }
}
