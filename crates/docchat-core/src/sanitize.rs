//! Strips markup that carries no searchable text: inline SVG blocks and PNG image references.

use std::sync::LazyLock;

use regex::Regex;

static SVG_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b.*?</svg>").expect("valid regex"));

/// `![alt](target.png)` and `![shot.png](target)`; an optional `"title"` may follow the target.
static PNG_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)!\[[^\]]*\]\([^)]*?\.png(?:\s+"[^"]*")?\)|!\[[^\]]*?\.png\]\([^)]*\)"#)
        .expect("valid regex")
});

/// Removes inline SVG blocks (across line breaks) and Markdown image references to `.png` files.
pub fn sanitize(text: &str) -> String {
    let without_svg = SVG_BLOCK.replace_all(text, "");
    PNG_IMAGE.replace_all(&without_svg, "").into_owned()
}
