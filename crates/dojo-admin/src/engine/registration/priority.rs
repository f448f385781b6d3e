use super::RegistrationViolation;

/// Display priority, highest first. The ordering is a product decision
/// ("don't tell someone they're too old when they're already registered"):
/// changing it changes observable behavior and requires a test update. The
/// two structural members sit above the business ordering; they never occur
/// together with business violations.
const PRIORITY: [RegistrationViolation; 10] = [
    RegistrationViolation::EventNotFound,
    RegistrationViolation::SubjectNotFound,
    RegistrationViolation::AlreadyRegistered,
    RegistrationViolation::RegistrationNotOpen,
    RegistrationViolation::DeadlinePassed,
    RegistrationViolation::Full,
    RegistrationViolation::TooYoung,
    RegistrationViolation::TooOld,
    RegistrationViolation::RankTooLow,
    RegistrationViolation::RankTooHigh,
];

/// Select the single highest-priority member of a violation set. `None`
/// only for the empty set.
pub fn primary_violation(violations: &[RegistrationViolation]) -> Option<RegistrationViolation> {
    PRIORITY
        .iter()
        .copied()
        .find(|kind| violations.contains(kind))
}
