use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::language::{Language, LanguageMapping, PlaceholderKind};

pub const ORIGINAL_FILE_NAME: &str = "%original_file_name%";
pub const FILE_NAME: &str = "%file_name%";
pub const FILE_EXTENSION: &str = "%file_extension%";
pub const ORIGINAL_PATH: &str = "%original_path%";
pub const DOUBLE_ASTERISK: &str = "**";

/// Prefix `/` unless the template already starts with a separator.
pub fn anchor(template: &str) -> String {
    let template = template.replace('\\', "/");
    if template.starts_with('/') {
        template
    } else {
        format!("/{template}")
    }
}

/// Convert backslashes to `/` and collapse runs of separators.
pub fn normalize_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// The directory segments of `source_file` matched by the first `**` of
/// `source_pattern`, joined with `/`. Empty when the pattern has no `**`
/// or the file is too shallow to capture anything.
///
/// The capture is positional: segments before the `**` and segments after
/// it are peeled off both ends of the file path, and whatever remains in the
/// middle is the capture. Any later `**` in the pattern counts as a single
/// fixed segment.
pub fn capture_double_asterisk(source_pattern: &str, source_file: &str) -> String {
    let pattern = normalize_separators(source_pattern);
    let Some(at) = pattern.find(DOUBLE_ASTERISK) else {
        return String::new();
    };

    let leading = segments(&pattern[..at]).count();
    let trailing = segments(&pattern[at + DOUBLE_ASTERISK.len()..]).count();

    let file = normalize_separators(source_file);
    let parts: Vec<&str> = segments(&file).collect();
    if parts.len() < leading + trailing {
        return String::new();
    }

    parts[leading..parts.len() - trailing].join("/")
}

/// Substitute the first `**` in `translation` with the directory segments
/// captured from `source_file` by `source_pattern`.
pub fn replace_double_asterisk(source_pattern: &str, translation: &str, source_file: &str) -> String {
    let Some(at) = translation.find(DOUBLE_ASTERISK) else {
        return translation.to_owned();
    };

    let captured = capture_double_asterisk(source_pattern, source_file);
    let replaced = format!(
        "{}{}{}",
        &translation[..at],
        captured,
        &translation[at + DOUBLE_ASTERISK.len()..]
    );
    normalize_separators(&replaced)
}

/// Verbatim find/replace pass, applied in key order.
pub fn apply_translation_replace(path: &str, replace: &BTreeMap<String, String>) -> String {
    replace
        .iter()
        .fold(path.to_owned(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

/// Expands path templates against local files and project languages.
#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    languages: Vec<Language>,
    base_path: PathBuf,
}

impl PlaceholderResolver {
    pub fn new(languages: Vec<Language>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            languages,
            base_path: base_path.into(),
        }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `/`-joined path of `file` relative to the base path, without a
    /// leading separator. Paths outside the base path are returned whole.
    pub fn relative_path(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.base_path).unwrap_or(file);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        normalize_separators(&joined)
            .trim_start_matches('/')
            .to_owned()
    }

    /// Replace the file-dependent placeholders using `relative_file`, a
    /// `/`-separated path relative to the base path.
    pub fn replace_file_dependent(&self, template: &str, relative_file: &str) -> String {
        let file = normalize_separators(relative_file);
        let file = file.trim_start_matches('/');
        let (parent, file_name) = match file.rfind('/') {
            Some(idx) => (&file[..idx], &file[idx + 1..]),
            None => ("", file),
        };
        let (stem, extension) = match file_name.rfind('.') {
            Some(idx) => (&file_name[..idx], &file_name[idx + 1..]),
            None => (file_name, ""),
        };

        let resolved = template
            .replace(ORIGINAL_FILE_NAME, file_name)
            .replace(FILE_NAME, stem)
            .replace(FILE_EXTENSION, extension)
            .replace(ORIGINAL_PATH, parent);
        normalize_separators(&resolved)
    }

    /// Replace the language-dependent placeholders for one language.
    pub fn replace_language_dependent(
        &self,
        template: &str,
        mapping: &LanguageMapping,
        language: &Language,
    ) -> String {
        PlaceholderKind::ALL
            .into_iter()
            .fold(template.to_owned(), |acc, kind| {
                if acc.contains(kind.token()) {
                    acc.replace(kind.token(), &mapping.value_or_attribute(kind, language))
                } else {
                    acc
                }
            })
    }

    /// One expansion per project language, computed as the iterator is driven.
    pub fn expand_languages<'a>(
        &'a self,
        template: &'a str,
        mapping: &'a LanguageMapping,
    ) -> impl Iterator<Item = String> + 'a {
        self.languages
            .iter()
            .map(move |language| self.replace_language_dependent(template, mapping, language))
    }

    /// Fully expand `template` for a source file and one language: anchor,
    /// language placeholders, `**` capture, then file placeholders.
    pub fn expand_for(
        &self,
        template: &str,
        source_pattern: &str,
        relative_file: &str,
        language: &Language,
        mapping: &LanguageMapping,
    ) -> String {
        let with_language = self.replace_language_dependent(&anchor(template), mapping, language);
        let captured = replace_double_asterisk(source_pattern, &with_language, relative_file);
        self.replace_file_dependent(&captured, relative_file)
    }

    /// Like [`expand_for`](Self::expand_for), for `language` or, when absent,
    /// every project language.
    pub fn expand(
        &self,
        template: &str,
        source_pattern: &str,
        relative_file: &str,
        language: Option<&Language>,
        mapping: &LanguageMapping,
    ) -> Vec<String> {
        match language {
            Some(language) => vec![self.expand_for(
                template,
                source_pattern,
                relative_file,
                language,
                mapping,
            )],
            None => self
                .languages
                .iter()
                .map(|language| {
                    self.expand_for(template, source_pattern, relative_file, language, mapping)
                })
                .collect(),
        }
    }
}
