//! C1 — the static, process-wide language profile table (§4.1).

use crate::error::GradingError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    Java,
    Cpp,
    CSharp,
}

impl FromStr for Language {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Python" => Ok(Language::Python),
            "JavaScript" => Ok(Language::JavaScript),
            "Java" => Ok(Language::Java),
            "C++" => Ok(Language::Cpp),
            "C#" => Ok(Language::CSharp),
            other => Err(GradingError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Immutable per-language metadata: source extension, container image, and the
/// in-container path the source is bind-mounted to.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub extension: &'static str,
    pub image: &'static str,
    pub container_path: &'static str,
    pub writable_mount: bool,
}

static PROFILES: Lazy<HashMap<Language, LanguageProfile>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        Language::Python,
        LanguageProfile {
            language: Language::Python,
            extension: "py",
            image: "python:3.8",
            container_path: "/app/code.py",
            writable_mount: false,
        },
    );
    m.insert(
        Language::JavaScript,
        LanguageProfile {
            language: Language::JavaScript,
            extension: "js",
            image: "node:14",
            container_path: "/app/code.js",
            writable_mount: false,
        },
    );
    m.insert(
        Language::Java,
        LanguageProfile {
            language: Language::Java,
            extension: "java",
            image: "openjdk:11",
            container_path: "/app/code.java",
            writable_mount: true,
        },
    );
    m.insert(
        Language::Cpp,
        LanguageProfile {
            language: Language::Cpp,
            extension: "cpp",
            image: "gcc:latest",
            container_path: "/app/code.cpp",
            writable_mount: true,
        },
    );
    m.insert(
        Language::CSharp,
        LanguageProfile {
            language: Language::CSharp,
            extension: "cs",
            image: "mcr.microsoft.com/dotnet/sdk:6.0",
            container_path: "/code/Program.cs",
            writable_mount: true,
        },
    );
    m
});

pub fn profile_for(language: Language) -> &'static LanguageProfile {
    PROFILES
        .get(&language)
        .expect("every Language variant has a registered profile")
}

/// Builds the `sh -c` command line run inside the container, single-quoting `arg_string`
/// per the ABI in spec §6 (embedded single quotes escaped as `'\''`).
pub fn build_command(language: Language, arg_string: &str) -> Vec<String> {
    let escaped_args = shell_single_quote(arg_string);
    let inner = match language {
        Language::Python => format!("python3 /app/code.py {}", escaped_args),
        Language::JavaScript => format!("node /app/code.js {}", escaped_args),
        Language::Java => format!(
            "javac /app/code.java && java -cp /app Main {}",
            escaped_args
        ),
        Language::Cpp => format!(
            "g++ /app/code.cpp -o /app/a.out && /app/a.out {}",
            escaped_args
        ),
        Language::CSharp => format!(
            "mkdir /app/P && cd /app/P && dotnet new console && mv /code/Program.cs /app/P/Program.cs && dotnet run --project . {}",
            escaped_args
        ),
    };
    vec!["/bin/sh".to_string(), "-c".to_string(), inner]
}

fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// §4.1 output post-processing, applied after `TrimSpace`.
pub fn postprocess_output(language: Language, trimmed: &str) -> String {
    match language {
        Language::Python => strip_python_brackets(trimmed),
        Language::JavaScript => strip_js_undefined(trimmed),
        _ => trimmed.to_string(),
    }
}

fn strip_python_brackets(s: &str) -> String {
    let bracket_pairs: [(char, char); 3] = [('[', ']'), ('\'', '\''), ('"', '"')];
    for (open, close) in bracket_pairs {
        if s.len() >= 2 && s.starts_with(open) && s.ends_with(close) {
            return s[open.len_utf8()..s.len() - close.len_utf8()].to_string();
        }
    }
    s.to_string()
}

fn strip_js_undefined(s: &str) -> String {
    if s == "undefined" || s == "null" {
        return String::new();
    }
    if let Some(stripped) = s.strip_suffix("undefined") {
        return stripped.to_string();
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_language_tags() {
        assert_eq!(Language::from_str("Python").unwrap(), Language::Python);
        assert_eq!(Language::from_str("C++").unwrap(), Language::Cpp);
        assert_eq!(Language::from_str("C#").unwrap(), Language::CSharp);
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(Language::from_str("COBOL").is_err());
    }

    #[test]
    fn python_strips_outer_brackets() {
        assert_eq!(postprocess_output(Language::Python, "[1, 2, 3]"), "1, 2, 3");
        assert_eq!(postprocess_output(Language::Python, "'hello'"), "hello");
        assert_eq!(postprocess_output(Language::Python, "\"hi\""), "hi");
        assert_eq!(postprocess_output(Language::Python, "42"), "42");
    }

    #[test]
    fn javascript_collapses_undefined_and_null() {
        assert_eq!(postprocess_output(Language::JavaScript, "undefined"), "");
        assert_eq!(postprocess_output(Language::JavaScript, "null"), "");
        assert_eq!(
            postprocess_output(Language::JavaScript, "resultundefined"),
            "result"
        );
        assert_eq!(
            postprocess_output(Language::JavaScript, "{\"a\":1}"),
            "{\"a\":1}"
        );
    }

    #[test]
    fn command_single_quotes_and_escapes_argument() {
        let cmd = build_command(Language::Python, "it's");
        assert_eq!(cmd[0], "/bin/sh");
        assert_eq!(cmd[1], "-c");
        assert!(cmd[2].contains("'it'\\''s'"));
    }
}
