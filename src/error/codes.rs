/// Error code registry for tallygrid
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 3000-3999: Source errors
/// - 4000-4999: Dispatch errors
/// - 5000-5999: Reduce errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_INVALID_TOML: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_UNKNOWN_PRESET: u16 = 1006;
    pub const CONFIG_UNSUPPORTED_FORMAT: u16 = 1007;

    // Source errors (3000-3999)
    pub const SOURCE_GENERIC: u16 = 3000;
    pub const SOURCE_NOT_FOUND: u16 = 3001;
    pub const SOURCE_PERMISSION_DENIED: u16 = 3002;
    pub const SOURCE_NOT_A_FILE: u16 = 3003;
    pub const SOURCE_READ_FAILED: u16 = 3004;

    // Dispatch errors (4000-4999)
    pub const DISPATCH_GENERIC: u16 = 4000;
    pub const DISPATCH_WORKER_FAILED: u16 = 4001;
    pub const DISPATCH_UNIT_PANICKED: u16 = 4002;
    pub const DISPATCH_TIMEOUT: u16 = 4003;
    pub const DISPATCH_NO_WORKERS: u16 = 4004;

    // Reduce errors (5000-5999)
    pub const REDUCE_GENERIC: u16 = 5000;
    pub const REDUCE_SHAPE_MISMATCH: u16 = 5001;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid YAML syntax in configuration",
        1003 => "Invalid TOML syntax in configuration",
        1005 => "Invalid value in configuration",
        1006 => "Unknown query preset",
        1007 => "Unsupported configuration file format",

        3000 => "Generic source error",
        3001 => "Input file does not exist",
        3002 => "Input file is read protected",
        3003 => "Input path is not a regular file",
        3004 => "Failed to read from input",

        4000 => "Generic dispatch error",
        4001 => "Worker failed to execute a work unit",
        4002 => "Work unit panicked",
        4003 => "Dispatch round timed out",
        4004 => "Worker pool has no workers",

        5000 => "Generic reduce error",
        5001 => "Partial result does not match the aggregate shape",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_described() {
        for code in [
            ErrorCode::CONFIG_GENERIC,
            ErrorCode::CONFIG_UNKNOWN_PRESET,
            ErrorCode::SOURCE_NOT_FOUND,
            ErrorCode::DISPATCH_TIMEOUT,
            ErrorCode::REDUCE_SHAPE_MISMATCH,
        ] {
            assert_ne!(describe_error_code(code), "Unknown error code");
        }
        assert_eq!(describe_error_code(8123), "Unknown error code");
    }
}
