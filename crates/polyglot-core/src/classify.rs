//! User-facing classification of execution failures.
//!
//! Classification only rewrites the text stored in
//! [`CodeExecution::error`](crate::CodeExecution::error); it never changes
//! control flow.

/// Coarse category of a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote service could not be reached.
    Network,
    /// Compile or run exceeded its time limit.
    Timeout,
    /// The compiler rejected the code.
    Compilation,
    /// A cross-origin policy blocked the request.
    CrossOrigin,
    /// Anything else.
    Generic,
}

/// Classify a raw failure message by the signals it contains.
///
/// Compiler diagnostics are checked first: they quote user code, which may
/// itself mention "fetch" or "timeout".
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();

    if lower.contains("compiler_error") {
        ErrorClass::Compilation
    } else if lower.contains("fetch") {
        ErrorClass::Network
    } else if lower.contains("timeout") || lower.contains("aborterror") || lower.contains("timed out")
    {
        ErrorClass::Timeout
    } else if lower.contains("cors") {
        ErrorClass::CrossOrigin
    } else {
        ErrorClass::Generic
    }
}

/// Turn a raw failure message into the text shown to the user.
pub fn describe(message: &str) -> String {
    match classify(message) {
        ErrorClass::Network => format!(
            "Network error: {message}\nCheck your internet connection or proxy settings, then try again."
        ),
        ErrorClass::Timeout => format!(
            "Timed out: {message}\nTry simplifying your code, then run it again."
        ),
        ErrorClass::Compilation => message.to_string(),
        ErrorClass::CrossOrigin => format!(
            "Request blocked by cross-origin policy: {message}\nRetry in a moment, or refresh the page."
        ),
        ErrorClass::Generic => format!(
            "{message}\nIf this keeps happening, refresh the page or switch to another language."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_signals() {
        assert_eq!(classify("TypeError: Failed to fetch"), ErrorClass::Network);
        assert_eq!(
            classify("Execution timeout after 15000ms"),
            ErrorClass::Timeout
        );
        assert_eq!(
            classify("AbortError: The operation was aborted"),
            ErrorClass::Timeout
        );
        assert_eq!(
            classify("compiler_error:\nprog.cc:3:5: error: 'x' was not declared"),
            ErrorClass::Compilation
        );
        assert_eq!(classify("blocked by CORS policy"), ErrorClass::CrossOrigin);
        assert_eq!(
            classify("Execution failed: NameError: name 'y' is not defined"),
            ErrorClass::Generic
        );
    }

    #[test]
    fn test_compiler_diagnostic_wins_over_other_signals() {
        let diagnostic = "compiler_error:\nprog.cc:1: error: 'fetch_timeout' was not declared";
        assert_eq!(classify(diagnostic), ErrorClass::Compilation);
        assert_eq!(describe(diagnostic), diagnostic);
    }

    #[test]
    fn test_describe_appends_guidance() {
        let text = describe("Execution timeout after 15000ms");
        assert!(text.starts_with("Timed out: Execution timeout after 15000ms"));
        assert!(text.contains("simplifying"));

        let text = describe("Failed to fetch https://wandbox.org: connection refused");
        assert!(text.contains("proxy"));

        let text = describe("something odd");
        assert!(text.contains("switch to another language"));
    }
}
