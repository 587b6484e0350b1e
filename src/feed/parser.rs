/// Extracts indicators from semicolon-delimited drop-list text.
///
/// Blank lines and `#` comment lines are skipped. For every other line the
/// text before the first `;` is kept, trimmed, even when it is empty (the
/// `; Spamhaus DROP List` header style). Source order is preserved and
/// duplicates are left for the store's unique index to reject.
pub fn parse_drop_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| first_field(line).to_string())
        .collect()
}

fn first_field(line: &str) -> &str {
    line.split(';').next().unwrap_or_default().trim()
}
