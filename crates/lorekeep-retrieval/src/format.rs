use std::fmt::Write as _;
use std::str::FromStr;

use lorekeep_core::{KnowledgeError, Scope};
use lorekeep_memory::SearchResult;

const RULE_WIDTH: usize = 50;
const PREVIEW_CHARS: usize = 100;

/// How retrieved fragments are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatStyle {
    /// A delimited block meant to be injected into a prompt.
    #[default]
    Context,
    /// A numbered listing with ids and scores for people.
    List,
}

impl FromStr for FormatStyle {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "context" => Ok(FormatStyle::Context),
            "list" => Ok(FormatStyle::List),
            other => Err(KnowledgeError::Config(format!("unknown format style '{other}'"))),
        }
    }
}

/// Render `results` in `style`.
pub fn format_results(results: &[SearchResult], style: FormatStyle) -> String {
    match style {
        FormatStyle::Context => format_context(results),
        FormatStyle::List => format_list(results),
    }
}

fn scope_marker(scope: Scope) -> &'static str {
    match scope {
        Scope::Shared => "[project]",
        Scope::Personal => "[personal]",
    }
}

/// Context block; empty string for no results.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}\nRELEVANT KNOWLEDGE\n{rule}\n");
    for result in results {
        let fragment = &result.fragment;
        out.push_str(scope_marker(fragment.scope));
        if !fragment.tags.is_empty() {
            let _ = write!(out, " [{}]", fragment.tags.join(", "));
        }
        let _ = writeln!(out, "\n{}\n", fragment.content);
    }
    out.push_str(&rule);
    out
}

/// Numbered listing with a truncated content preview.
pub fn format_list(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No relevant knowledge found.".to_string();
    }
    let mut out = String::from("Found knowledge fragments:\n\n");
    for (i, result) in results.iter().enumerate() {
        let fragment = &result.fragment;
        let tags = if fragment.tags.is_empty() {
            "no tags".to_string()
        } else {
            fragment.tags.join(", ")
        };
        let _ = writeln!(
            out,
            "{}. [{}] ({}, {})\n   Score: {:.3}\n   {}\n",
            i + 1,
            fragment.id,
            fragment.scope,
            tags,
            result.score,
            preview(&fragment.content)
        );
    }
    out
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use lorekeep_core::Fragment;

    fn result(fragment: Fragment, score: f64) -> SearchResult {
        SearchResult { fragment, score }
    }

    #[test]
    fn test_context_block() {
        let out = format_context(&[
            result(Fragment::shared("Use zod").with_tags(["forms", "zod"]), 0.5),
            result(Fragment::personal("Squash before merge"), 0.2),
        ]);
        assert!(out.contains("RELEVANT KNOWLEDGE"));
        assert!(out.contains("[project] [forms, zod]\nUse zod\n"));
        assert!(out.contains("[personal]\nSquash before merge\n"));
        assert!(out.ends_with(&"-".repeat(RULE_WIDTH)));
    }

    #[test]
    fn test_empty_outputs() {
        assert_eq!(format_context(&[]), "");
        assert_eq!(format_list(&[]), "No relevant knowledge found.");
    }

    #[test]
    fn test_list_truncates_long_content() {
        let long = "é".repeat(150);
        let out = format_list(&[result(Fragment::shared(long).with_id("abc"), 1.23456)]);
        assert!(out.contains("1. [abc] (shared, no tags)"));
        assert!(out.contains("Score: 1.235"));
        assert!(out.contains(&format!("{}...", "é".repeat(PREVIEW_CHARS))));
    }

    #[test]
    fn test_style_parse() {
        assert_eq!("list".parse::<FormatStyle>().unwrap(), FormatStyle::List);
        assert!("xml".parse::<FormatStyle>().is_err());
    }
}
