//! Supported languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RuntimeError;

/// A language that has its own execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python, run by an external interpreter process.
    Python,
    /// JavaScript, run by an external interpreter process.
    JavaScript,
    /// C++, compiled and run by a remote compile service.
    Cpp,
    /// WebAssembly text format, run in-process by Wasmtime.
    Wat,
}

impl Language {
    /// Every supported language, in preload order.
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::JavaScript,
        Language::Cpp,
        Language::Wat,
    ];

    /// Stable lowercase key used in messages, URLs and config files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Cpp => "cpp",
            Language::Wat => "wat",
        }
    }

    /// Returns `true` if runs go through the remote compile service.
    pub const fn is_network_backed(self) -> bool {
        matches!(self, Language::Cpp)
    }

    /// Returns `true` if the runtime accepts package installs.
    pub const fn supports_packages(self) -> bool {
        matches!(self, Language::Python)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "cpp" | "c++" => Ok(Language::Cpp),
            "wat" | "wasm" => Ok(Language::Wat),
            _ => Err(RuntimeError::unknown_language(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("JS".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!(" wat ".parse::<Language>().unwrap(), Language::Wat);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "cobol".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown language: cobol");
    }

    #[test]
    fn test_display_matches_serde() {
        for language in Language::ALL {
            let json = serde_json::to_string(&language).unwrap();
            assert_eq!(json, format!("\"{language}\""));
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Language::Cpp.is_network_backed());
        assert!(!Language::Python.is_network_backed());
        assert!(Language::Python.supports_packages());
        assert!(!Language::Wat.supports_packages());
    }
}
