//! Configuration validation.
//!
//! Detects unknown/misspelled fields, unknown CalDAV providers, broken
//! account references and insecure credential transport.

use crate::schema::CalmcpConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "unknown-provider", "type-error",
    /// "account", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "caldav.accounts.work.url"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

const TOP_LEVEL_KEYS: &[&str] = &["caldav"];
const CALDAV_KEYS: &[&str] = &["enabled", "default_account", "accounts"];
const ACCOUNT_KEYS: &[&str] = &["provider", "url", "username", "password", "timeout_seconds"];

/// Provider names understood by base URL discovery.
const KNOWN_PROVIDERS: &[&str] = &["fastmail", "icloud", "generic"];

/// Providers that need no explicit URL.
const WELL_KNOWN_PROVIDERS: &[&str] = &["fastmail", "icloud"];

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Find the closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, levenshtein(needle, candidate)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(candidate, _)| candidate)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult { diagnostics };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&toml_value, &mut diagnostics);

    // 3. Types, then semantics on the parsed config
    match toml::from_str::<CalmcpConfig>(toml_str) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult { diagnostics }
}

/// Run semantic checks on an already parsed config.
#[must_use]
pub fn validate_config(config: &CalmcpConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let caldav = &config.caldav;

    if caldav.enabled && caldav.accounts.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "account",
            path: "caldav.accounts".into(),
            message: "CalDAV is enabled but no accounts are configured".into(),
        });
    }

    if let Some(default) = &caldav.default_account
        && !caldav.accounts.contains_key(default)
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "account",
            path: "caldav.default_account".into(),
            message: format!("default account \"{default}\" is not defined"),
        });
    }

    let mut names: Vec<&String> = caldav.accounts.keys().collect();
    names.sort();
    for name in names {
        let account = &caldav.accounts[name];
        let path = format!("caldav.accounts.{name}");
        let provider = account.provider.as_deref().unwrap_or("generic");

        if !KNOWN_PROVIDERS.contains(&provider) {
            let message = match suggest(provider, KNOWN_PROVIDERS, 3) {
                Some(s) => format!("unknown provider \"{provider}\" (did you mean \"{s}\"?)"),
                None => format!("unknown provider \"{provider}\"; the URL is used as-is"),
            };
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "unknown-provider",
                path: format!("{path}.provider"),
                message,
            });
        }

        match account.url.as_deref() {
            None if !WELL_KNOWN_PROVIDERS.contains(&provider) => {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "account",
                    path: format!("{path}.url"),
                    message: format!("provider \"{provider}\" requires a url"),
                });
            },
            None => {},
            Some(raw) => match url::Url::parse(raw) {
                Ok(parsed) if parsed.scheme() == "http" && account.password.is_some() => {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        category: "security",
                        path: format!("{path}.url"),
                        message: "password would be sent over plain http".into(),
                    });
                },
                Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        category: "account",
                        path: format!("{path}.url"),
                        message: format!("unsupported URL scheme \"{}\"", parsed.scheme()),
                    });
                },
                Ok(_) => {},
                Err(e) => diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "account",
                    path: format!("{path}.url"),
                    message: format!("invalid url: {e}"),
                }),
            },
        }

        if account.password.is_some() && account.username.is_none() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "account",
                path: format!("{path}.username"),
                message: "password is set without a username".into(),
            });
        }

        if account.timeout_seconds == 0 {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "account",
                path: format!("{path}.timeout_seconds"),
                message: "timeout must be at least one second".into(),
            });
        }
    }

    ValidationResult { diagnostics }
}

fn check_unknown_fields(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_table() else {
        return;
    };
    flag_unknown(root, TOP_LEVEL_KEYS, "", diagnostics);

    let Some(caldav) = root.get("caldav").and_then(toml::Value::as_table) else {
        return;
    };
    flag_unknown(caldav, CALDAV_KEYS, "caldav", diagnostics);

    let Some(accounts) = caldav.get("accounts").and_then(toml::Value::as_table) else {
        return;
    };
    for (name, account) in accounts {
        if let Some(account) = account.as_table() {
            flag_unknown(
                account,
                ACCOUNT_KEYS,
                &format!("caldav.accounts.{name}"),
                diagnostics,
            );
        }
    }
}

fn flag_unknown(
    table: &toml::map::Map<String, toml::Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for key in table.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let message = match suggest(key, known, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".into(),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message,
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[rstest]
    #[case("hello", "hello", 0)]
    #[case("", "abc", 3)]
    #[case("abc", "", 3)]
    #[case("icloud", "iclod", 1)]
    #[case("fastmail", "fastmial", 2)]
    fn levenshtein_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein(a, b), expected);
    }

    #[test]
    fn valid_config_has_no_errors() {
        let result = validate_toml_str(
            r#"
[caldav]
default_account = "fm"

[caldav.accounts.fm]
provider = "fastmail"
username = "me@fastmail.com"
password = "app-password"
"#,
        );
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.count(Severity::Warning), 0);
    }

    #[test]
    fn syntax_error_stops_early() {
        let result = validate_toml_str("[caldav\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn unknown_account_field_with_suggestion() {
        let result = validate_toml_str(
            "[caldav.accounts.a]\nurl = \"https://dav.example.com\"\nusernme = \"x\"\n",
        );
        let d = find(&result, "caldav.accounts.a.usernme").unwrap();
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("username"));
    }

    #[test]
    fn unknown_top_level_key() {
        let result = validate_toml_str("[caldva]\nenabled = true\n");
        let d = find(&result, "caldva").unwrap();
        assert!(d.message.contains("caldav"));
    }

    #[test]
    fn type_errors_are_reported() {
        let result = validate_toml_str("[caldav]\nenabled = \"yes\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn missing_default_account() {
        let result = validate_toml_str("[caldav]\ndefault_account = \"ghost\"\n");
        let d = find(&result, "caldav.default_account").unwrap();
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn generic_provider_requires_url() {
        let result = validate_toml_str("[caldav.accounts.a]\nprovider = \"generic\"\n");
        assert_eq!(
            find(&result, "caldav.accounts.a.url").unwrap().severity,
            Severity::Error
        );
    }

    #[test]
    fn misspelled_provider_gets_suggestion() {
        let result = validate_toml_str(
            "[caldav.accounts.a]\nprovider = \"iclod\"\nurl = \"https://x.example.com\"\n",
        );
        let d = find(&result, "caldav.accounts.a.provider").unwrap();
        assert_eq!(d.severity, Severity::Warning);
        assert!(d.message.contains("icloud"));
    }

    #[rstest]
    #[case("http://dav.example.com", "security", Severity::Warning)]
    #[case("ftp://dav.example.com", "account", Severity::Error)]
    #[case("not a url", "account", Severity::Error)]
    fn url_checks(#[case] url: &str, #[case] category: &str, #[case] severity: Severity) {
        let toml = format!(
            "[caldav.accounts.a]\nurl = \"{url}\"\nusername = \"u\"\npassword = \"p\"\n"
        );
        let result = validate_toml_str(&toml);
        let d = find(&result, "caldav.accounts.a.url").unwrap();
        assert_eq!(d.category, category);
        assert_eq!(d.severity, severity);
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let result = validate_toml_str(
            "[caldav.accounts.a]\nurl = \"https://x.example.com\"\ntimeout_seconds = 0\n",
        );
        assert!(find(&result, "caldav.accounts.a.timeout_seconds").is_some());
    }

    #[test]
    fn enabled_without_accounts_is_informational() {
        let result = validate_config(&CalmcpConfig::default());
        assert_eq!(result.count(Severity::Info), 1);
        assert!(!result.has_errors());
    }
}
