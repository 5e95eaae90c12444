/// Keyword gate in front of enrichment.
///
/// With no keywords every page is relevant. Otherwise a page is relevant when
/// any keyword occurs, ignoring case, in the title or the body text.
pub fn is_relevant(title: &str, body: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }

    let haystack = format!("{title} {body}").to_lowercase();
    keywords
        .iter()
        .any(|keyword| haystack.contains(&keyword.to_lowercase()))
}
