/// Error code registry for lodes-flow
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Flow source errors
/// - 3000-3999: Membership (study area) errors
/// - 4000-4999: Output errors
/// - 5000-5999: Contract violations
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1004;

    // Flow source errors (2000-2999)
    pub const SOURCE_UNREADABLE: u16 = 2001;
    pub const SOURCE_MISSING_COLUMN: u16 = 2003;

    // Membership errors (3000-3999)
    pub const MEMBERSHIP_EMPTY: u16 = 3001;
    pub const MEMBERSHIP_UNREADABLE: u16 = 3002;
    pub const MEMBERSHIP_INVALID_ID: u16 = 3003;
    pub const MEMBERSHIP_MISSING_COLUMN: u16 = 3004;

    // Output errors (4000-4999)
    pub const OUTPUT_WRITE_FAILED: u16 = 4001;
    pub const OUTPUT_SERIALIZATION: u16 = 4002;

    // Contract violations (5000-5999)
    pub const CONTRACT_GENERIC: u16 = 5000;
    pub const CONTRACT_UNKNOWN_ENDPOINT: u16 = 5001;
    pub const CONTRACT_NOT_RUN: u16 = 5002;
    pub const CONTRACT_MEASURE_OVERFLOW: u16 = 5003;
    pub const CONTRACT_WORKER_FAILED: u16 = 5004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_TOML => "Invalid TOML syntax in configuration",
        ErrorCode::CONFIG_MISSING_REQUIRED => "Required configuration field missing",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",

        ErrorCode::SOURCE_UNREADABLE => "Flow source could not be opened or read",
        ErrorCode::SOURCE_MISSING_COLUMN => "Required column missing from flow source",

        ErrorCode::MEMBERSHIP_EMPTY => "Study area contains no location identifiers",
        ErrorCode::MEMBERSHIP_UNREADABLE => "Block list could not be read",
        ErrorCode::MEMBERSHIP_INVALID_ID => "Block list contains an invalid identifier",
        ErrorCode::MEMBERSHIP_MISSING_COLUMN => "Block list is missing its key column",

        ErrorCode::OUTPUT_WRITE_FAILED => "Failed to write output",
        ErrorCode::OUTPUT_SERIALIZATION => "Failed to serialize output",

        ErrorCode::CONTRACT_GENERIC => "Programming contract violation",
        ErrorCode::CONTRACT_UNKNOWN_ENDPOINT => "Unknown endpoint selector",
        ErrorCode::CONTRACT_NOT_RUN => "Results requested before the pipeline ran",
        ErrorCode::CONTRACT_MEASURE_OVERFLOW => "Measure sum exceeded 64-bit range",
        ErrorCode::CONTRACT_WORKER_FAILED => "Pipeline worker task failed",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert_eq!(
            describe_error_code(ErrorCode::MEMBERSHIP_EMPTY),
            "Study area contains no location identifiers"
        );
        assert_eq!(
            describe_error_code(ErrorCode::SOURCE_MISSING_COLUMN),
            "Required column missing from flow source"
        );
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe_error_code(1234), "Unknown error code");
    }
}
