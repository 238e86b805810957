use scraper::{ElementRef, Html, Selector};

/// A fetched page: the raw text plus its parsed tree. Never mutated after parsing;
/// every strategy reads it through a shared reference. `Send`, so a page fetched
/// on one thread can be extracted on another.
pub struct Document {
    raw: String,
    html: Html,
}

impl Document {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let html = Html::parse_document(&raw);
        Document { raw, html }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// First `max` bytes of the raw text, cut back to a char boundary.
    pub fn head(&self, max: usize) -> &str {
        head(&self.raw, max)
    }

    /// All nodes matching `css`, in document order. Bad selectors match nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        let sel = Selector::parse(css).ok()?;
        self.html.select(&sel).next()
    }
}

pub fn head(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// First match of `css` below `node`.
pub fn first_in<'a>(node: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    node.select(&sel).next()
}

/// Concatenated text content of a node.
pub fn text_of(node: ElementRef<'_>) -> String {
    node.text().collect::<String>()
}

pub fn attr_of<'a>(node: ElementRef<'a>, name: &str) -> Option<&'a str> {
    node.value().attr(name)
}

/// Text of the first descendant declared with `slot="<slot>"`.
pub fn slot_text(node: ElementRef<'_>, slot: &str) -> Option<String> {
    first_in(node, &format!("[slot=\"{}\"]", slot)).map(text_of)
}

/// Nearest ancestor element, if any.
pub fn parent_of(node: ElementRef<'_>) -> Option<ElementRef<'_>> {
    node.parent().and_then(ElementRef::wrap)
}
