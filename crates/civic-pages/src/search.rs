/// Case-insensitive match of a search box against a record's text fields.
/// Every whitespace-separated term must occur in at least one field; an
/// empty query matches everything. Extending the query can only narrow the
/// result.
pub fn matches(query: &str, fields: &[&str]) -> bool {
    let fields: Vec<String> = fields.iter().map(|f| fold(f)).collect();
    query
        .split_whitespace()
        .map(fold)
        .all(|term| fields.iter().any(|f| f.contains(&term)))
}

/// Lower-case char by char, so a prefix of a query always folds to a prefix
/// of the folded query. `str::to_lowercase` maps a final sigma by context.
fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Keep the items whose fields match `query`, in their original order.
pub fn filter<'a, T, F>(items: &'a [T], query: &str, fields: F) -> Vec<&'a T>
where
    F: Fn(&T) -> Vec<&str>,
{
    items
        .iter()
        .filter(|item| matches(query, &fields(item)))
        .collect()
}
