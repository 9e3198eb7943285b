use crate::matchers::LinkMatchers;

/// Number of characters shown before an internal link so it can be found and
/// fixed by hand.
pub const CONTEXT_CHARS: usize = 60;

/// A link to another page of the same wiki. These are reported, never
/// rewritten: the target's exported location is not known while the current
/// page is being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalLink {
    pub book_slug: String,
    pub page_slug: String,
    pub offset: usize,
    pub context: String,
}

impl InternalLink {
    pub fn context_lines(&self) -> Vec<&str> {
        self.context.lines().collect()
    }
}

pub fn find_internal_links(text: &str, matchers: &LinkMatchers) -> Vec<InternalLink> {
    matchers
        .internal()
        .captures_iter(text)
        .filter_map(|captures| {
            let span = captures.get(0)?;
            Some(InternalLink {
                book_slug: captures.get(1)?.as_str().to_string(),
                page_slug: captures.get(2)?.as_str().to_string(),
                offset: span.start(),
                context: preceding_context(text, span.start(), CONTEXT_CHARS).to_string(),
            })
        })
        .collect()
}

pub fn has_internal_links(text: &str, matchers: &LinkMatchers) -> bool {
    matchers.internal().is_match(text)
}

fn preceding_context(text: &str, end: usize, max_chars: usize) -> &str {
    let start = text[..end]
        .char_indices()
        .rev()
        .take(max_chars)
        .last()
        .map_or(end, |(index, _)| index);
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::{find_internal_links, has_internal_links, preceding_context};
    use crate::images::tests::matchers;

    #[test]
    fn finds_links_left_to_right_with_slugs() {
        let text = "See [setup](https://wiki.example.org/books/ops-guide/page/initial-setup) and [faq](https://wiki.example.org/books/help/page/faq).";

        let links = find_internal_links(text, &matchers());

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].book_slug, "ops-guide");
        assert_eq!(links[0].page_slug, "initial-setup");
        assert_eq!(links[1].book_slug, "help");
        assert_eq!(links[1].page_slug, "faq");
        assert!(links[0].offset < links[1].offset);
        assert_eq!(links[0].context, "See [setup](");
    }

    #[test]
    fn book_link_without_page_does_not_bleed_into_next_link() {
        let text = "[book](https://wiki.example.org/books/ops) then [p](https://wiki.example.org/books/help/page/faq)";

        let links = find_internal_links(text, &matchers());

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].book_slug, "help");
        assert_eq!(links[0].page_slug, "faq");
        assert_eq!(
            links[0].offset,
            text.find("https://wiki.example.org/books/help").expect("offset")
        );
        assert!(links[0].context.ends_with("then [p]("));
    }

    #[test]
    fn other_wiki_links_on_the_line_are_not_reported() {
        let text = "[shelf](https://wiki.example.org/shelves/x) [p](https://wiki.example.org/books/a/page/b) [edit](https://wiki.example.org/books/a/page/c/edit)";

        let links = find_internal_links(text, &matchers());

        let slugs: Vec<_> = links
            .iter()
            .map(|link| (link.book_slug.as_str(), link.page_slug.as_str()))
            .collect();
        assert_eq!(slugs, vec![("a", "b"), ("a", "c/edit")]);
    }

    #[test]
    fn detection_never_mutates_text() {
        let text = String::from("[x](https://wiki.example.org/books/a/page/b)");
        let before = text.clone();

        assert!(has_internal_links(&text, &matchers()));
        let _ = find_internal_links(&text, &matchers());

        assert_eq!(text.as_bytes(), before.as_bytes());
    }

    #[test]
    fn returns_false_without_links() {
        let text = "[external](https://example.com/books/a/page/b)\n[shelf](https://wiki.example.org/shelves/x)";
        assert!(!has_internal_links(text, &matchers()));
        assert!(find_internal_links(text, &matchers()).is_empty());
    }

    #[test]
    fn context_is_limited_to_sixty_characters_and_split_into_lines() {
        let prefix = format!("{}\nsecond line ", "a".repeat(80));
        let text = format!("{prefix}[link](https://wiki.example.org/books/b/page/p)");

        let links = find_internal_links(&text, &matchers());

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].context.chars().count(), 60);
        assert_eq!(
            links[0].context_lines(),
            vec!["a".repeat(40).as_str(), "second line [link]("]
        );
    }

    #[test]
    fn context_respects_multibyte_characters() {
        let text = "héllo wörld";
        assert_eq!(preceding_context(text, text.len(), 5), "wörld");
        assert_eq!(preceding_context("abc", 3, 60), "abc");
        assert_eq!(preceding_context("abc", 0, 60), "");
    }
}
