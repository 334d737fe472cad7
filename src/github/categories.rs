/// The four PR categories prscout tracks, each mapped to its search query.
///
/// Only `Assigned` feeds the reconciliation engine; the others exist for
/// the `status` and `open` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Assigned,
    Authored,
    ReviewRequested,
    Mentioned,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Assigned,
        Category::Authored,
        Category::ReviewRequested,
        Category::Mentioned,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Assigned => "Assigned",
            Category::Authored => "Authored",
            Category::ReviewRequested => "Review requested",
            Category::Mentioned => "Mentioned",
        }
    }

    /// Search query for this category. `archived:false` is appended by the
    /// client, not here.
    pub fn query(&self, login: &str) -> String {
        match self {
            Category::Assigned => format!("is:open is:pr assignee:{}", login),
            Category::Authored => format!("is:open is:pr author:{}", login),
            Category::ReviewRequested => format!("is:open is:pr review-requested:{}", login),
            Category::Mentioned => format!("is:open is:pr mentions:{}", login),
        }
    }
}
