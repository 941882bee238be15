use crate::types::EnrollmentStatus;

/// Closed allow-list of statuses that permit validation to succeed.
///
/// This is deliberately an allow-list, not a deny-list: a status added to the
/// store before it is added here is denied, including any unrecognized value.
pub fn is_eligible(status: &EnrollmentStatus) -> bool {
    matches!(
        status,
        EnrollmentStatus::FullyPaid | EnrollmentStatus::PartiallyPaid
    )
}
