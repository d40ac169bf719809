//! Language name and code resolution.
//!
//! Output directories are segmented by an ISO-ish language code while the
//! completion prompts use the full language name. The built-in table maps
//! between the two; unknown languages fall back to lower-casing the given
//! name as their code.

/// Built-in language table: (English name, code).
static LANGUAGE_CODES: &[(&str, &str)] = &[
    ("English", "en"),
    ("Spanish", "es"),
    ("French", "fr"),
    ("German", "de"),
    ("Italian", "it"),
    ("Portuguese", "pt"),
    ("Dutch", "nl"),
    ("Russian", "ru"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Arabic", "ar"),
    ("Hindi", "hi"),
    ("Turkish", "tr"),
    ("Polish", "pl"),
    ("Swedish", "sv"),
    ("Danish", "da"),
    ("Finnish", "fi"),
    ("Norwegian", "no"),
    ("Czech", "cs"),
    ("Greek", "el"),
    ("Hebrew", "he"),
    ("Hungarian", "hu"),
    ("Romanian", "ro"),
    ("Ukrainian", "uk"),
    ("Vietnamese", "vi"),
    ("Thai", "th"),
    ("Indonesian", "id"),
    ("Chinese", "zh"),
    ("Simplified Chinese", "zh-CN"),
    ("Traditional Chinese", "zh-TW"),
];

/// A resolved target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    name: String,
    code: String,
}

impl Language {
    /// Resolve a language from either its English name or its code.
    ///
    /// Matching is case-insensitive. Chinese variants get their dedicated
    /// codes. Anything not in the table keeps the given name and uses its
    /// lower-cased form as the code.
    pub fn resolve(input: &str) -> Language {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();

        for (name, code) in LANGUAGE_CODES {
            if name.to_lowercase() == lowered || code.to_lowercase() == lowered {
                return Language {
                    name: (*name).to_string(),
                    code: (*code).to_string(),
                };
            }
        }

        // Unlisted Chinese variants still map onto the zh family.
        if lowered.contains("chinese") {
            let code = if lowered.contains("simplified") {
                "zh-CN"
            } else if lowered.contains("traditional") {
                "zh-TW"
            } else {
                "zh"
            };
            return Language {
                name: trimmed.to_string(),
                code: code.to_string(),
            };
        }

        Language {
            name: trimmed.to_string(),
            code: lowered,
        }
    }

    /// The English name of the language, used in prompts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The language code, used for output directories and checkpoint keys.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
