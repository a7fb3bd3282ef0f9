//! Closed registry of error categories and their stable wire codes.

use std::collections::HashSet;
use std::fmt;

use super::CustomError;

/// Category of failure carried by a [`CustomError`].
///
/// The set is closed: every variant owns exactly one entry in the descriptor
/// table, which carries its stable code and default message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Failure that fits no other kind.
    Unknown,
    /// Internal fault in the service itself.
    SystemInternal,
    /// A bounded resource such as a pool or quota ran out.
    ResourceExhausted,
    /// An operation exceeded its deadline.
    Timeout,
    /// A dependency could not be reached.
    Unavailable,
    /// No database connection could be obtained.
    DbConnection,
    /// A query failed for a reason other than a constraint.
    DbOperation,
    /// A check or foreign-key constraint rejected the write.
    DbConstraint,
    /// The requested row does not exist.
    DbNotFound,
    /// A unique constraint rejected the write.
    DbDuplicate,
    /// The request was malformed before validation ran.
    ApiRequest,
    /// An upstream API answered with an error.
    ApiResponse,
    /// The token bucket had no capacity left.
    RateLimit,
    /// The service is draining or not ready.
    ServiceUnavailable,
    /// The caller could not be identified.
    Authentication,
    /// The caller may not perform the operation.
    Authorization,
    /// The presented token is past its expiry.
    TokenExpired,
    /// The presented token did not verify.
    TokenInvalid,
    /// One or more request fields broke a rule.
    Validation,
    /// A value did not parse.
    InvalidFormat,
    /// A required field was absent.
    MissingField,
    /// The resource is in the wrong state for the operation.
    InvalidState,
    /// A domain rule rejected the operation.
    BusinessRule,
    /// A domain operation failed.
    OperationFailed,
    /// The operation is not allowed here.
    InvalidOperation,
    /// No route or resource matched the request.
    ResourceNotFound,
}

/// Stable code and default message registered for one [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    /// Kind this entry describes.
    pub kind: ErrorKind,
    /// Machine-readable code, e.g. `DB_DUPLICATE`.
    pub code: &'static str,
    /// Human-readable default message, safe to show to clients.
    pub message: &'static str,
}

const fn entry(kind: ErrorKind, code: &'static str, message: &'static str) -> KindDescriptor {
    KindDescriptor {
        kind,
        code,
        message,
    }
}

/// Descriptor table indexed by the kind's discriminant.
const DESCRIPTORS: &[KindDescriptor] = &[
    entry(ErrorKind::Unknown, "UNKNOWN_ERROR", "an unexpected error occurred"),
    entry(ErrorKind::SystemInternal, "SYSTEM_INTERNAL", "internal system error occurred"),
    entry(
        ErrorKind::ResourceExhausted,
        "RESOURCE_EXHAUSTED",
        "system resources have been exhausted",
    ),
    entry(ErrorKind::Timeout, "TIMEOUT", "operation timed out"),
    entry(ErrorKind::Unavailable, "UNAVAILABLE", "service is currently unavailable"),
    entry(
        ErrorKind::DbConnection,
        "DB_CONNECTION",
        "failed to establish database connection",
    ),
    entry(ErrorKind::DbOperation, "DB_OPERATION", "database operation failed"),
    entry(
        ErrorKind::DbConstraint,
        "DB_CONSTRAINT",
        "database constraint violation occurred",
    ),
    entry(
        ErrorKind::DbNotFound,
        "DB_NOT_FOUND",
        "requested record not found in database",
    ),
    entry(
        ErrorKind::DbDuplicate,
        "DB_DUPLICATE",
        "duplicate record detected in database",
    ),
    entry(ErrorKind::ApiRequest, "API_REQUEST", "invalid API request"),
    entry(ErrorKind::ApiResponse, "API_RESPONSE", "API response error occurred"),
    entry(ErrorKind::RateLimit, "RATE_LIMIT", "rate limit exceeded"),
    entry(
        ErrorKind::ServiceUnavailable,
        "SERVICE_UNAVAILABLE",
        "external service is unavailable",
    ),
    entry(ErrorKind::Authentication, "AUTHENTICATION", "authentication failed"),
    entry(ErrorKind::Authorization, "AUTHORIZATION", "authorization failed"),
    entry(
        ErrorKind::TokenExpired,
        "TOKEN_EXPIRED",
        "authentication token has expired",
    ),
    entry(ErrorKind::TokenInvalid, "TOKEN_INVALID", "invalid authentication token"),
    entry(ErrorKind::Validation, "VALIDATION", "validation error occurred"),
    entry(ErrorKind::InvalidFormat, "INVALID_FORMAT", "invalid format detected"),
    entry(ErrorKind::MissingField, "MISSING_FIELD", "required field is missing"),
    entry(ErrorKind::InvalidState, "INVALID_STATE", "invalid state detected"),
    entry(
        ErrorKind::BusinessRule,
        "BUSINESS_RULE",
        "business rule violation occurred",
    ),
    entry(
        ErrorKind::OperationFailed,
        "OPERATION_FAILED",
        "operation failed to complete",
    ),
    entry(
        ErrorKind::InvalidOperation,
        "INVALID_OPERATION",
        "invalid operation attempted",
    ),
    entry(
        ErrorKind::ResourceNotFound,
        "RESOURCE_NOT_FOUND",
        "requested resource not found",
    ),
];

const _: () = assert!(
    ErrorKind::ALL.len() == DESCRIPTORS.len(),
    "every ErrorKind needs exactly one descriptor"
);

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 26] = [
        Self::Unknown,
        Self::SystemInternal,
        Self::ResourceExhausted,
        Self::Timeout,
        Self::Unavailable,
        Self::DbConnection,
        Self::DbOperation,
        Self::DbConstraint,
        Self::DbNotFound,
        Self::DbDuplicate,
        Self::ApiRequest,
        Self::ApiResponse,
        Self::RateLimit,
        Self::ServiceUnavailable,
        Self::Authentication,
        Self::Authorization,
        Self::TokenExpired,
        Self::TokenInvalid,
        Self::Validation,
        Self::InvalidFormat,
        Self::MissingField,
        Self::InvalidState,
        Self::BusinessRule,
        Self::OperationFailed,
        Self::InvalidOperation,
        Self::ResourceNotFound,
    ];

    /// Number of registered kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// Registry entry for this kind.
    #[must_use]
    pub fn descriptor(self) -> &'static KindDescriptor {
        // The const assertion above keeps every discriminant in range.
        &DESCRIPTORS[self as usize]
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.descriptor().code
    }

    /// Default human-readable message.
    #[must_use]
    pub fn message(self) -> &'static str {
        self.descriptor().message
    }

    /// Code rendered as a lowercase, hyphenated slug for type URIs.
    ///
    /// # Examples
    /// ```
    /// use users_api::domain::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::DbDuplicate.slug(), "db-duplicate");
    /// ```
    #[must_use]
    pub fn slug(self) -> String {
        self.code().to_ascii_lowercase().replace('_', "-")
    }

    /// Create an error of this kind, capturing the caller's location and stack.
    ///
    /// # Examples
    /// ```
    /// use users_api::domain::ErrorKind;
    ///
    /// let err = ErrorKind::DbNotFound.new().with_message("user 42 missing");
    /// assert_eq!(err.code(), "DB_NOT_FOUND");
    /// assert_eq!(err.message(), "user 42 missing");
    /// ```
    #[allow(clippy::new_ret_no_self, reason = "kinds are factories for errors")]
    #[must_use]
    #[track_caller]
    pub fn new(self) -> CustomError {
        CustomError::new(self)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Inconsistencies detected by [`verify_registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The kind list and descriptor table disagree on length.
    #[error("{kinds} error kinds registered but {descriptors} descriptors defined")]
    CountMismatch { kinds: usize, descriptors: usize },
    /// A descriptor sits at the wrong index for its kind.
    #[error("descriptor at index {index} describes {found:?}, expected {expected:?}")]
    Misaligned {
        index: usize,
        expected: ErrorKind,
        found: ErrorKind,
    },
    /// Two kinds share a code.
    #[error("error code {code} registered more than once")]
    DuplicateCode { code: &'static str },
    /// A kind has no default message.
    #[error("error code {code} has an empty message")]
    EmptyMessage { code: &'static str },
}

/// Check the registry once at process start.
///
/// # Errors
/// Returns [`RegistryError`] when the kind list and descriptor table drift
/// apart; callers should treat this as fatal.
pub fn verify_registry() -> Result<(), RegistryError> {
    check_descriptors(&ErrorKind::ALL, DESCRIPTORS)
}

fn check_descriptors(
    kinds: &[ErrorKind],
    descriptors: &[KindDescriptor],
) -> Result<(), RegistryError> {
    if kinds.len() != descriptors.len() {
        return Err(RegistryError::CountMismatch {
            kinds: kinds.len(),
            descriptors: descriptors.len(),
        });
    }

    let mut seen = HashSet::with_capacity(descriptors.len());
    for (index, (kind, descriptor)) in kinds.iter().zip(descriptors).enumerate() {
        if descriptor.kind != *kind || *kind as usize != index {
            return Err(RegistryError::Misaligned {
                index,
                expected: *kind,
                found: descriptor.kind,
            });
        }
        if descriptor.message.is_empty() {
            return Err(RegistryError::EmptyMessage {
                code: descriptor.code,
            });
        }
        if !seen.insert(descriptor.code) {
            return Err(RegistryError::DuplicateCode {
                code: descriptor.code,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn registry_is_consistent() {
        assert_eq!(verify_registry(), Ok(()));
        assert_eq!(ErrorKind::COUNT, DESCRIPTORS.len());
    }

    #[rstest]
    fn missing_descriptor_is_reported() {
        let truncated = DESCRIPTORS.get(..DESCRIPTORS.len() - 1).expect("slice");
        assert_eq!(
            check_descriptors(&ErrorKind::ALL, truncated),
            Err(RegistryError::CountMismatch {
                kinds: ErrorKind::COUNT,
                descriptors: ErrorKind::COUNT - 1,
            })
        );
    }

    #[rstest]
    fn swapped_descriptors_are_reported() {
        let mut swapped = DESCRIPTORS.to_vec();
        swapped.swap(0, 1);
        assert!(matches!(
            check_descriptors(&ErrorKind::ALL, &swapped),
            Err(RegistryError::Misaligned { index: 0, .. })
        ));
    }

    #[rstest]
    fn duplicate_codes_are_reported() {
        let mut duplicated = DESCRIPTORS.to_vec();
        duplicated[1].code = duplicated[0].code;
        assert_eq!(
            check_descriptors(&ErrorKind::ALL, &duplicated),
            Err(RegistryError::DuplicateCode {
                code: "UNKNOWN_ERROR"
            })
        );
    }

    #[rstest]
    #[case(ErrorKind::Unknown, "UNKNOWN_ERROR", "an unexpected error occurred")]
    #[case(ErrorKind::DbNotFound, "DB_NOT_FOUND", "requested record not found in database")]
    #[case(ErrorKind::DbDuplicate, "DB_DUPLICATE", "duplicate record detected in database")]
    #[case(ErrorKind::RateLimit, "RATE_LIMIT", "rate limit exceeded")]
    #[case(ErrorKind::ResourceNotFound, "RESOURCE_NOT_FOUND", "requested resource not found")]
    fn codes_and_messages_are_stable(
        #[case] kind: ErrorKind,
        #[case] code: &str,
        #[case] message: &str,
    ) {
        assert_eq!(kind.code(), code);
        assert_eq!(kind.message(), message);
    }

    #[rstest]
    fn every_kind_constructs_an_error_with_its_code() {
        for kind in ErrorKind::ALL {
            let err = kind.new();
            assert_eq!(err.kind(), kind);
            assert_eq!(err.code(), kind.descriptor().code);
        }
    }

    #[rstest]
    #[case(ErrorKind::Unknown, "unknown-error")]
    #[case(ErrorKind::ApiRequest, "api-request")]
    #[case(ErrorKind::Timeout, "timeout")]
    fn slug_is_lowercase_and_hyphenated(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.slug(), expected);
    }
}
