use scraper::{ElementRef, Html, Selector};
use tracing::warn;

pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 900.0;

/// Attribute written by capture tools with the element's rendered top offset.
const OFFSET_ATTR: &str = "data-offset-top";
const CHARS_PER_LINE: usize = 80;
const LINE_HEIGHT_PX: f32 = 20.0;

/// One parsed, immutable view of the page. Every read in a pass goes through
/// the same snapshot so a pass always sees a consistent document.
pub struct Snapshot {
    html: Html,
    viewport_height: f32,
}

/// A text-bearing element together with its approximate vertical position.
#[derive(Debug, Clone)]
pub struct Leaf<'a> {
    pub scope: Scope<'a>,
    pub text: String,
    pub top: f32,
}

#[derive(Clone, Copy)]
pub struct Scope<'a> {
    el: ElementRef<'a>,
}

impl std::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.el.value().name())
    }
}

pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(selector = css, error = %e, "Invalid selector skipped");
            None
        }
    }
}

impl Snapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }

    pub fn with_viewport_height(mut self, height: f32) -> Self {
        self.viewport_height = height;
        self
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn root(&self) -> Scope<'_> {
        Scope {
            el: self.html.root_element(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.html
            .root_element()
            .descendants()
            .filter(|n| n.value().is_element())
            .count()
    }

    /// `<link rel="canonical">`, falling back to `og:url`.
    pub fn canonical_url(&self) -> Option<String> {
        let root = self.root();
        root.first(r#"link[rel="canonical"]"#)
            .and_then(|s| s.attr("href"))
            .or_else(|| {
                root.first(r#"meta[property="og:url"]"#)
                    .and_then(|s| s.attr("content"))
            })
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
    }

    /// All elements matching `css`, with the vertical offset of each.
    ///
    /// Offsets come from `data-offset-top` on the element or its nearest
    /// ancestor when present; otherwise they are estimated from the amount of
    /// text that precedes the element in document order.
    pub fn text_leaves(&self, css: &str) -> Vec<Leaf<'_>> {
        let Some(sel) = selector(css) else {
            return Vec::new();
        };
        let mut leaves = Vec::new();
        let mut chars_before = 0usize;

        for node in self.html.root_element().descendants() {
            if let Some(t) = node.value().as_text() {
                chars_before += t.trim().chars().count();
                continue;
            }
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if !sel.matches(&el) {
                continue;
            }
            let scope = Scope { el };
            let top = scope
                .explicit_offset()
                .unwrap_or_else(|| estimate_offset(chars_before));
            leaves.push(Leaf {
                scope,
                text: scope.text(),
                top,
            });
        }
        leaves
    }

    /// Approximate vertical offset of one element.
    pub fn vertical_offset(&self, target: Scope<'_>) -> f32 {
        if let Some(top) = target.explicit_offset() {
            return top;
        }
        let target_id = target.el.id();
        let mut chars_before = 0usize;
        for node in self.html.root_element().descendants() {
            if node.id() == target_id {
                break;
            }
            if let Some(t) = node.value().as_text() {
                chars_before += t.trim().chars().count();
            }
        }
        estimate_offset(chars_before)
    }
}

fn estimate_offset(chars_before: usize) -> f32 {
    (chars_before / CHARS_PER_LINE) as f32 * LINE_HEIGHT_PX
}

impl<'a> Scope<'a> {
    pub fn first(&self, css: &str) -> Option<Scope<'a>> {
        let sel = selector(css)?;
        self.el.select(&sel).next().map(|el| Scope { el })
    }

    pub fn all(&self, css: &str) -> Vec<Scope<'a>> {
        let Some(sel) = selector(css) else {
            return Vec::new();
        };
        self.el.select(&sel).map(|el| Scope { el }).collect()
    }

    /// Nearest inclusive ancestor matching `css`.
    pub fn closest(&self, css: &str) -> Option<Scope<'a>> {
        let sel = selector(css)?;
        std::iter::once(self.el)
            .chain(self.el.ancestors().filter_map(ElementRef::wrap))
            .find(|el| sel.matches(el))
            .map(|el| Scope { el })
    }

    pub fn parent(&self) -> Option<Scope<'a>> {
        self.el
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| Scope { el })
    }

    pub fn matches(&self, css: &str) -> bool {
        selector(css).is_some_and(|sel| sel.matches(&self.el))
    }

    /// Text content with runs of whitespace collapsed.
    pub fn text(&self) -> String {
        self.el
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    fn explicit_offset(&self) -> Option<f32> {
        std::iter::once(self.el)
            .chain(self.el.ancestors().filter_map(ElementRef::wrap))
            .find_map(|el| el.value().attr(OFFSET_ATTR))
            .and_then(|v| v.trim().parse::<f32>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><link rel="canonical" href="https://www.linkedin.com/in/jane-doe/"></head>
        <body>
          <section id="s1"><div id="about"></div>
            <div class="box"><span aria-hidden="true">  Hello
               world </span></div>
          </section>
          <div data-offset-top="640"><p><span aria-hidden="true">Deep text</span></p></div>
        </body></html>"#;

    #[test]
    fn first_all_and_text() {
        let doc = Snapshot::parse(PAGE);
        let root = doc.root();
        let span = root.first(r#"span[aria-hidden="true"]"#).unwrap();
        assert_eq!(span.text(), "Hello world");
        assert_eq!(root.all(r#"span[aria-hidden="true"]"#).len(), 2);
        assert!(root.first(".missing").is_none());
    }

    #[test]
    fn closest_includes_self_and_ancestors() {
        let doc = Snapshot::parse(PAGE);
        let about = doc.root().first("#about").unwrap();
        assert_eq!(about.closest("section").unwrap().attr("id"), Some("s1"));
        assert!(about.closest("#about").is_some());
        assert!(about.closest("article").is_none());
    }

    #[test]
    fn sibling_combinator_is_supported() {
        let doc = Snapshot::parse(PAGE);
        let hit = doc.root().first(r#"#about ~ .box span[aria-hidden="true"]"#);
        assert_eq!(hit.map(|s| s.text()), Some("Hello world".to_string()));
    }

    #[test]
    fn offsets_prefer_attribute() {
        let doc = Snapshot::parse(PAGE);
        let leaves = doc.text_leaves(r#"span[aria-hidden="true"]"#);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].top, 0.0);
        assert_eq!(leaves[1].top, 640.0);
        assert_eq!(doc.vertical_offset(leaves[1].scope), 640.0);
    }

    #[test]
    fn canonical_url_and_invalid_selector() {
        let doc = Snapshot::parse(PAGE);
        assert_eq!(
            doc.canonical_url().as_deref(),
            Some("https://www.linkedin.com/in/jane-doe/")
        );
        assert!(doc.root().first("[[nope").is_none());
    }
}
