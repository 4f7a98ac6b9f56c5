use std::path::Path;

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::FileEntry;
use crate::language::{Language, LanguageMapping, PlaceholderKind};
use crate::placeholder::{PlaceholderResolver, anchor, normalize_separators, replace_double_asterisk};

/// Errors raised while matching local source files.
#[derive(Debug, thiserror::Error)]
pub enum SourceMatchError {
    #[error("invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("failed to walk {path}: {message}")]
    Walk { path: String, message: String },
}

/// Compiled source glob plus its ignore globs.
///
/// Patterns are matched against `/`-separated paths relative to the base
/// path; `*` never crosses a separator while `**` spans any depth.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    source: GlobMatcher,
    ignore: GlobSet,
}

impl SourceMatcher {
    pub fn new(source: &str, ignore: &[String]) -> Result<Self, SourceMatchError> {
        let source = compile(source)?.compile_matcher();

        let mut builder = GlobSetBuilder::new();
        for pattern in ignore {
            builder.add(compile(pattern)?);
        }
        let ignore = builder.build().map_err(|e| SourceMatchError::Pattern {
            pattern: ignore.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self { source, ignore })
    }

    /// True if `relative` matches the source glob and neither it nor any of
    /// its parent directories matches an ignore glob.
    pub fn is_match(&self, relative: &str) -> bool {
        self.source.is_match(relative) && !self.is_ignored(relative)
    }

    fn is_ignored(&self, relative: &str) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        let mut prefix = String::new();
        for segment in relative.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if self.ignore.is_match(&prefix) {
                return true;
            }
        }
        false
    }
}

fn compile(pattern: &str) -> Result<globset::Glob, SourceMatchError> {
    let trimmed = normalize_separators(pattern);
    let trimmed = trimmed.trim_start_matches('/');
    GlobBuilder::new(trimmed)
        .literal_separator(true)
        .build()
        .map_err(|e| SourceMatchError::Pattern {
            pattern: pattern.to_owned(),
            message: e.to_string(),
        })
}

/// Ignore patterns with language placeholders expanded for every language.
pub fn expand_ignores(
    ignore: &[String],
    resolver: &PlaceholderResolver,
    mapping: &LanguageMapping,
) -> Vec<String> {
    let mut expanded = Vec::new();
    for pattern in ignore {
        let has_language = PlaceholderKind::ALL
            .into_iter()
            .any(|kind| pattern.contains(kind.token()));
        if has_language {
            for resolved in resolver.expand_languages(pattern, mapping) {
                if !expanded.contains(&resolved) {
                    expanded.push(resolved);
                }
            }
        } else if !expanded.contains(pattern) {
            expanded.push(pattern.clone());
        }
    }
    expanded
}

/// Local files under `base_path` matching the entry's source glob, as
/// `/`-separated paths relative to `base_path`, in file-name order.
pub fn find_sources(
    base_path: &Path,
    entry: &FileEntry,
    resolver: &PlaceholderResolver,
    mapping: &LanguageMapping,
) -> Result<Vec<String>, SourceMatchError> {
    let ignore = expand_ignores(&entry.ignore, resolver, mapping);
    let matcher = SourceMatcher::new(&entry.source, &ignore)?;

    let mut found = Vec::new();
    for item in WalkDir::new(base_path).sort_by_file_name() {
        let item = item.map_err(|e| SourceMatchError::Walk {
            path: base_path.display().to_string(),
            message: e.to_string(),
        })?;
        if !item.file_type().is_file() {
            continue;
        }
        let relative = resolver.relative_path(item.path());
        if matcher.is_match(&relative) {
            found.push(relative);
        }
    }

    tracing::debug!(source = %entry.source, matched = found.len(), "matched local sources");
    Ok(found)
}

/// Longest directory prefix shared by every source, without separators at
/// either end. Empty when sources share no directory.
pub fn common_directory<S: AsRef<str>>(sources: &[S]) -> String {
    let mut common: Option<Vec<&str>> = None;
    for source in sources {
        let source = source.as_ref();
        let directory: Vec<&str> = match source.rfind('/') {
            Some(idx) => source[..idx].split('/').filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        };
        common = Some(match common {
            None => directory,
            Some(current) => current
                .into_iter()
                .zip(directory)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default().join("/")
}

/// Remote path for an uploaded source, without a leading separator.
///
/// A `dest` override wins, with its file placeholders resolved. Otherwise
/// the relative path is used, minus `common_prefix` when hierarchy is
/// flattened.
pub fn remote_source_path(
    relative: &str,
    common_prefix: &str,
    dest: Option<&str>,
    resolver: &PlaceholderResolver,
) -> String {
    let path = match dest {
        Some(dest) => resolver.replace_file_dependent(&anchor(dest), relative),
        None if !common_prefix.is_empty() => relative
            .strip_prefix(common_prefix)
            .unwrap_or(relative)
            .to_owned(),
        None => relative.to_owned(),
    };
    normalize_separators(&path).trim_start_matches('/').to_owned()
}

/// Export pattern registered with the server for one source file.
pub fn export_pattern(translation: &str, source_pattern: &str, relative: &str) -> String {
    normalize_separators(&replace_double_asterisk(
        source_pattern,
        &anchor(translation),
        relative,
    ))
}

/// Languages an operation applies to: the selected one, or all project languages.
pub fn selected_languages(resolver: &PlaceholderResolver, language: Option<&Language>) -> Vec<Language> {
    match language {
        Some(language) => vec![language.clone()],
        None => resolver.languages().to_vec(),
    }
}
