use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::config::Theme;
use crate::github::types::PullRequestRef;
use crate::github::{ApiError, Category};

/// One category's fetch result, ready for rendering.
pub struct CategoryResult {
    pub category: Category,
    pub result: Result<Vec<PullRequestRef>, ApiError>,
}

/// Whether to colorize output. NO_COLOR always wins; the `system` theme
/// additionally requires a TTY, while explicit themes force colors on.
pub fn should_use_colors(theme: Theme) -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match theme {
        Theme::System => std::io::stdout().is_terminal(),
        Theme::Light | Theme::Dark => true,
    }
}

/// Render one category section: a header with the count, then one line per
/// PR (or a placeholder for empty/failed fetches).
pub fn format_category_section(section: &CategoryResult, use_colors: bool) -> String {
    let mut out = String::new();

    match &section.result {
        Ok(prs) => {
            out.push_str(&format_header(section.category.label(), &prs.len().to_string(), use_colors));
            if prs.is_empty() {
                out.push_str("  (none)\n");
            } else {
                for pr in prs {
                    out.push_str(&format_pr_line(pr, use_colors));
                    out.push('\n');
                }
            }
        }
        Err(e) => {
            out.push_str(&format_header(section.category.label(), "!", use_colors));
            out.push_str(&format!("  could not load: {}\n", e));
        }
    }

    out
}

fn format_header(label: &str, count: &str, use_colors: bool) -> String {
    if use_colors {
        format!("{} ({})\n", label.bold(), count.cyan())
    } else {
        format!("{} ({})\n", label, count)
    }
}

/// Format a single PR as one line: "  [repo] title (by author) branches url"
fn format_pr_line(pr: &PullRequestRef, use_colors: bool) -> String {
    let branches = match (&pr.base_branch, &pr.head_branch) {
        (Some(base), Some(head)) => format!(" {} <- {}", base, head),
        _ => String::new(),
    };

    if use_colors {
        format!(
            "  [{}] {} (by {}){} {}",
            pr.repo_name().cyan(),
            pr.title.bold(),
            pr.author.yellow(),
            branches,
            pr.url.underline()
        )
    } else {
        format!(
            "  [{}] {} (by {}){} {}",
            pr.repo_name(),
            pr.title,
            pr.author,
            branches,
            pr.url
        )
    }
}

/// The optional footer line, honoring the persisted preference.
pub fn format_footer(show_footer: bool) -> Option<String> {
    show_footer.then(|| format!("prscout {}", env!("CARGO_PKG_VERSION")))
}
