// src/services/extract.rs

//! Page content extraction.
//!
//! Selects nodes with an XPath (or CSS) expression, rebuilds them into a
//! fragment, and reduces the fragment to plain text.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::services::XPath;

/// A compiled page selector.
#[derive(Debug, Clone)]
pub enum PageSelector {
    XPath(XPath),
    Css { source: String, selector: Selector },
}

impl PageSelector {
    /// Compile an expression.
    ///
    /// Expressions starting with `/`, `./`, `..` or `(` are XPath. Anything else
    /// is tried as CSS first (`#post`, `div.entry`) and then as a relative
    /// XPath (`html/body/div`).
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if looks_like_xpath(expr) {
            return XPath::parse(expr).map(Self::XPath);
        }

        match Selector::parse(expr) {
            Ok(selector) => Ok(Self::Css {
                source: expr.to_string(),
                selector,
            }),
            Err(css_error) => XPath::parse(expr)
                .map(Self::XPath)
                .map_err(|_| AppError::selector(expr, format!("{css_error:?}"))),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::XPath(xpath) => xpath.source(),
            Self::Css { source, .. } => source,
        }
    }

    /// Matching elements in document order.
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match self {
            Self::XPath(xpath) => xpath.select(document),
            Self::Css { selector, .. } => document.select(selector).collect(),
        }
    }
}

fn looks_like_xpath(expr: &str) -> bool {
    expr.starts_with('/')
        || expr.starts_with("./")
        || expr.starts_with("..")
        || expr.starts_with('(')
        || expr == "."
}

/// Result of extracting a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Text of the page `<title>`, if any
    pub title: Option<String>,

    /// Selected text with markup stripped and entities decoded
    pub content: String,

    /// Markup of the selected nodes, concatenated in document order
    pub raw_content: String,
}

/// Extract the selected content and the title of an HTML page.
///
/// Never fails: broken markup is parsed leniently and a selector that
/// matches nothing yields empty content.
pub fn extract(html: &str, selector: &PageSelector) -> Extraction {
    let document = Html::parse_document(html);

    let raw_content: String = match selector {
        PageSelector::XPath(xpath) if xpath.selects_text() => xpath
            .select_text(&document)
            .iter()
            .map(|text| escape_text(text))
            .collect(),
        // Each match is copied whole, so nested matches repeat their text.
        _ => selector
            .select(&document)
            .iter()
            .map(|element| element.html())
            .collect(),
    };

    Extraction {
        title: page_title(&document),
        content: strip_markup(&raw_content),
        raw_content,
    }
}

/// Remove tags from a markup fragment and decode its entities.
pub fn strip_markup(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }
    Html::parse_fragment(markup).root_element().text().collect()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
