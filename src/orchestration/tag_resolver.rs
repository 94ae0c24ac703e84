//! Tag template resolution against release metadata
//!
//! Templates are expanded by literal substitution only. Conditional templates
//! (anything containing `{{if`) are dropped rather than evaluated.

use crate::core::traits::ReleaseContext;

/// Marker of a conditional template
const CONDITIONAL_MARKER: &str = "{{if";

/// Expand every template in order, dropping conditional and empty results
pub fn resolve_tags(templates: &[String], context: &ReleaseContext) -> Vec<String> {
    templates
        .iter()
        .filter_map(|template| resolve_tag(template, context))
        .collect()
}

/// Expand a single template; `None` when it is dropped
pub fn resolve_tag(template: &str, context: &ReleaseContext) -> Option<String> {
    if template.contains(CONDITIONAL_MARKER) {
        return None;
    }

    let mut result = template.to_string();
    for (placeholders, value) in [
        (["{{version}}", "{{.Version}}"], &context.version),
        (
            ["{{previous_version}}", "{{.PreviousVersion}}"],
            &context.previous_version,
        ),
        (["{{tag_name}}", "{{.TagName}}"], &context.tag_name),
        (["{{release_type}}", "{{.ReleaseType}}"], &context.release_type),
    ] {
        for placeholder in placeholders {
            result = result.replace(placeholder, value);
        }
    }

    // Branch placeholders stay verbatim when no branch is known
    if !context.branch.is_empty() {
        let safe_branch = context.branch.replace('/', "-");
        for placeholder in ["{{branch}}", "{{.Branch}}"] {
            result = result.replace(placeholder, &safe_branch);
        }
    }

    if result.is_empty() { None } else { Some(result) }
}
