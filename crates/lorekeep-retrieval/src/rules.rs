use serde::Serialize;

/// A named mapping from prompt keywords to the tags worth boosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextRule {
    /// Rule identifier.
    pub name: &'static str,
    /// Lowercase substrings that trigger the rule.
    pub keywords: &'static [&'static str],
    /// Tags boosted when the rule fires.
    pub boost_tags: &'static [&'static str],
}

impl ContextRule {
    /// Whether any keyword occurs in `prompt_lower`.
    pub fn matches(&self, prompt_lower: &str) -> bool {
        self.keywords.iter().any(|kw| prompt_lower.contains(kw))
    }
}

/// The built-in rule table.
pub const CONTEXT_RULES: &[ContextRule] = &[
    ContextRule {
        name: "forms",
        keywords: &["form", "input", "validation", "submit", "field", "formgen", "zod"],
        boost_tags: &["forms", "react-forms", "validation", "zod", "formgen"],
    },
    ContextRule {
        name: "tables",
        keywords: &["table", "grid", "ag-grid", "datagrid", "columns", "sorting"],
        boost_tags: &["tables", "ag-grid", "grid", "data-grid"],
    },
    ContextRule {
        name: "api",
        keywords: &["api", "fetch", "query", "mutation", "tanstack", "react-query"],
        boost_tags: &["api", "data-fetching", "tanstack-query", "react-query"],
    },
    ContextRule {
        name: "components",
        keywords: &["component", "modal", "dialog", "button", "page", "view"],
        boost_tags: &["components", "react", "ui", "design-patterns"],
    },
    ContextRule {
        name: "styling",
        keywords: &["style", "css", "tailwind", "design", "layout", "responsive"],
        boost_tags: &["styling", "tailwind", "css", "design"],
    },
    ContextRule {
        name: "testing",
        keywords: &["test", "spec", "playwright", "e2e", "unit", "browser"],
        boost_tags: &["testing", "playwright", "e2e", "unit-tests"],
    },
    ContextRule {
        name: "state",
        keywords: &["state", "zustand", "redux", "context", "store"],
        boost_tags: &["state", "zustand", "state-management"],
    },
    ContextRule {
        name: "backend",
        keywords: &["service", "controller", "entity", "dotnet", "csharp", "api endpoint"],
        boost_tags: &["backend", "dotnet", "csharp", "services", "api"],
    },
    ContextRule {
        name: "database",
        keywords: &["database", "migration", "sql", "query", "entity"],
        boost_tags: &["database", "sql", "migrations", "entity-framework"],
    },
    ContextRule {
        name: "workflow",
        keywords: &["workflow", "preference", "setting", "configure"],
        boost_tags: &["workflow", "preference", "personal", "settings"],
    },
];

/// Tags that signal the caller is asking about personal workflow rather
/// than project knowledge.
pub const PERSONAL_INTENT_TAGS: &[&str] = &["workflow", "preference", "personal"];

/// Tags to boost for `prompt` under the built-in rules.
pub fn detect_context_tags(prompt: &str) -> Vec<String> {
    detect_with_rules(CONTEXT_RULES, prompt)
}

/// Union of the boost tags of every rule in `rules` that matches `prompt`
/// (case-insensitive substring match), deduplicated in first-seen order.
pub fn detect_with_rules(rules: &[ContextRule], prompt: &str) -> Vec<String> {
    let prompt_lower = prompt.to_lowercase();
    let mut tags: Vec<String> = Vec::new();
    for rule in rules.iter().filter(|r| r.matches(&prompt_lower)) {
        for tag in rule.boost_tags {
            if !tags.iter().any(|t| t == tag) {
                tags.push((*tag).to_string());
            }
        }
    }
    tags
}

/// Whether the detected tags point at personal/workflow intent.
pub fn has_personal_intent(tags: &[String]) -> bool {
    tags.iter().any(|t| PERSONAL_INTENT_TAGS.contains(&t.as_str()))
}
