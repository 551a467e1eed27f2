//! Coverage bar and symbol list markup used inside `## Test Coverage` sections.
//!
//! The classes (`cov-row`, `cov-fill`, ...) and colour variables are styled by
//! the site templates.

/// CSS colour for a coverage percentage: green at 80 % and up, orange above 0, red at 0.
pub fn coverage_color(pct: f64) -> &'static str {
    if pct >= 80.0 {
        "var(--green)"
    } else if pct > 0.0 {
        "var(--orange)"
    } else {
        "var(--red)"
    }
}

/// One coverage bar row: fill width, percentage, label and `(tested/total)`.
pub fn coverage_bar(label: &str, pct: f64, tested: usize, total: usize) -> String {
    format!(
        concat!(
            r#"<div class="cov-row">"#,
            r#"<div class="cov-bar"><div class="cov-fill" style="width:{pct:.1}%;background:{color}"></div></div>"#,
            r#"<span class="cov-pct">{pct:.1}%</span>"#,
            r#"<span class="cov-label">{label}</span>"#,
            r#"<span class="cov-ratio">({tested}/{total})</span>"#,
            r#"</div>"#,
        ),
        pct = pct,
        color = coverage_color(pct),
        label = label,
        tested = tested,
        total = total,
    )
}

/// A tick or cross followed by the symbol name.
pub fn symbol_line(name: &str, tested: bool) -> String {
    if tested {
        format!(r#"<span class="cov-func"><span class="cov-check">✓</span> {name}</span>"#)
    } else {
        format!(r#"<span class="cov-func"><span class="cov-x">✗</span> {name}</span>"#)
    }
}

/// Render items as a markdown bullet list.
pub fn list_items<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
