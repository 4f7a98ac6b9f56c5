use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// A project language with the locale-derived codes used as substitution values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub two_letters_code: String,
    pub three_letters_code: String,
    pub locale: String,
    pub android_code: String,
    pub osx_code: String,
    pub osx_locale: String,
}

impl Language {
    /// The language's own value for a placeholder kind, before any mapping.
    pub fn attribute(&self, kind: PlaceholderKind) -> String {
        match kind {
            PlaceholderKind::Name => self.name.clone(),
            PlaceholderKind::Locale => self.locale.clone(),
            PlaceholderKind::LocaleWithUnderscore => self.locale.replace('-', "_"),
            PlaceholderKind::TwoLettersCode => self.two_letters_code.clone(),
            PlaceholderKind::ThreeLettersCode => self.three_letters_code.clone(),
            PlaceholderKind::AndroidCode => self.android_code.clone(),
            PlaceholderKind::OsxCode => self.osx_code.clone(),
            PlaceholderKind::OsxLocale => self.osx_locale.clone(),
        }
    }
}

/// The language-dependent placeholders a template may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaceholderKind {
    Name,
    Locale,
    LocaleWithUnderscore,
    TwoLettersCode,
    ThreeLettersCode,
    AndroidCode,
    OsxCode,
    OsxLocale,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 8] = [
        Self::Name,
        Self::Locale,
        Self::LocaleWithUnderscore,
        Self::TwoLettersCode,
        Self::ThreeLettersCode,
        Self::AndroidCode,
        Self::OsxCode,
        Self::OsxLocale,
    ];

    /// Key used for this kind in language mapping tables.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Locale => "locale",
            Self::LocaleWithUnderscore => "locale_with_underscore",
            Self::TwoLettersCode => "two_letters_code",
            Self::ThreeLettersCode => "three_letters_code",
            Self::AndroidCode => "android_code",
            Self::OsxCode => "osx_code",
            Self::OsxLocale => "osx_locale",
        }
    }

    /// Token as it appears in a path template.
    pub fn token(self) -> &'static str {
        match self {
            Self::Name => "%language%",
            Self::Locale => "%locale%",
            Self::LocaleWithUnderscore => "%locale_with_underscore%",
            Self::TwoLettersCode => "%two_letters_code%",
            Self::ThreeLettersCode => "%three_letters_code%",
            Self::AndroidCode => "%android_code%",
            Self::OsxCode => "%osx_code%",
            Self::OsxLocale => "%osx_locale%",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Override table: placeholder kind key -> language id -> replacement.
///
/// Kind keys are kept as strings so custom kinds survive a round trip
/// through configuration, even though only [`PlaceholderKind`] keys are
/// ever substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LanguageMapping {
    kinds: BTreeMap<String, BTreeMap<String, String>>,
}

impl LanguageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the per-language shape the remote API reports:
    /// language id -> kind key -> replacement.
    pub fn from_languages(by_language: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut mapping = Self::new();
        for (language_id, kinds) in by_language {
            for (kind, value) in kinds {
                mapping.insert(kind, language_id.clone(), value);
            }
        }
        mapping
    }

    pub fn insert(
        &mut self,
        kind: impl Into<String>,
        language_id: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.kinds
            .entry(kind.into())
            .or_default()
            .insert(language_id.into(), value.into());
    }

    pub fn get(&self, kind: &str, language_id: &str) -> Option<&str> {
        self.kinds
            .get(kind)
            .and_then(|languages| languages.get(language_id))
            .map(String::as_str)
    }

    /// The mapped value for `language`, or its intrinsic attribute when unmapped.
    pub fn value_or_attribute(&self, kind: PlaceholderKind, language: &Language) -> String {
        self.get(kind.key(), &language.id)
            .map(str::to_owned)
            .unwrap_or_else(|| language.attribute(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(BTreeMap::is_empty)
    }

    /// Effective table for one file entry: file-level values win per
    /// (kind, language) pair, project-level values fill the rest.
    pub fn merge(file_level: &LanguageMapping, project_level: Option<&LanguageMapping>) -> Self {
        let mut merged = project_level.cloned().unwrap_or_default();
        for (kind, languages) in &file_level.kinds {
            for (language_id, value) in languages {
                merged.insert(kind.clone(), language_id.clone(), value.clone());
            }
        }
        merged
    }
}
