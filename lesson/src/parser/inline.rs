use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};

/// An image that makes up a whole paragraph.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StandaloneImage {
    pub alt: String,
    pub dest: String,
    pub title: String,
}

/// Recognize `![alt](dest "title")` standing alone on a line.
///
/// Anything else in the paragraph (text around the image, a second image,
/// a link wrapping it) means the line is ordinary prose.
pub(crate) fn standalone_image(text: &str) -> Option<StandaloneImage> {
    let mut events = CmarkParser::new(text.trim());

    if !matches!(events.next(), Some(Event::Start(Tag::Paragraph))) {
        return None;
    }
    let (dest, title) = match events.next() {
        Some(Event::Start(Tag::Image {
            dest_url, title, ..
        })) => (dest_url.to_string(), title.to_string()),
        _ => return None,
    };

    let mut alt = String::new();
    let mut depth = 0u32;
    loop {
        match events.next()? {
            Event::End(TagEnd::Image) if depth == 0 => break,
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(s) | Event::Code(s) => alt.push_str(&s),
            Event::SoftBreak | Event::HardBreak => alt.push(' '),
            _ => {}
        }
    }

    match (events.next(), events.next()) {
        (Some(Event::End(TagEnd::Paragraph)), None) => Some(StandaloneImage { alt, dest, title }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_alone_on_a_line() {
        let image = standalone_image(r#"![Editor settings](images/tabs.png "Soft tabs")"#).unwrap();
        assert_eq!(image.alt, "Editor settings");
        assert_eq!(image.dest, "images/tabs.png");
        assert_eq!(image.title, "Soft tabs");
    }

    #[test]
    fn emphasis_in_alt_text_is_flattened() {
        let image = standalone_image("![the *tab* key](tab.png)").unwrap();
        assert_eq!(image.alt, "the tab key");
        assert_eq!(image.title, "");
    }

    #[test]
    fn images_inside_prose_are_not_blocks() {
        assert!(standalone_image("See ![this](a.png) for details").is_none());
        assert!(standalone_image("![a](a.png) ![b](b.png)").is_none());
        assert!(standalone_image("plain text").is_none());
    }
}
