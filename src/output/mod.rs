pub mod formatter;

pub use formatter::{format_category_section, format_footer, should_use_colors, CategoryResult};
