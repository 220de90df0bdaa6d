//! Document-query capability used by the extraction engine.
//!
//! The engine only talks to these traits, so any HTML engine that can parse a
//! body, run a CSS selector and describe the matched nodes can be plugged in.
//! [`HtmlParser`] is the default implementation on top of `scraper`.

use crate::ExtractError;
use scraper::{ElementRef, Html, Selector};

pub trait QueryNode {
    /// Full outer markup of the node, descendants included.
    fn serialize(&self) -> String;
    /// Concatenated text content of the node and its descendants.
    fn text(&self) -> String;
    fn attribute(&self, name: &str) -> Option<String>;
}

pub trait QueryDocument {
    type Node<'a>: QueryNode
    where
        Self: 'a;

    /// Matches in document order.
    fn query<'a>(&'a self, selector: &str) -> Result<Vec<Self::Node<'a>>, ExtractError>;
}

pub trait DocumentParser {
    type Document: QueryDocument;

    fn parse(&self, body: &str) -> Result<Self::Document, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    type Document = Html;

    fn parse(&self, body: &str) -> Result<Html, ExtractError> {
        // html5ever recovers from any malformed input
        Ok(Html::parse_document(body))
    }
}

impl QueryDocument for Html {
    type Node<'a> = ElementRef<'a>;

    fn query<'a>(&'a self, selector: &str) -> Result<Vec<ElementRef<'a>>, ExtractError> {
        let parsed = Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{:?}", e),
        })?;
        Ok(self.select(&parsed).collect())
    }
}

impl QueryNode for ElementRef<'_> {
    fn serialize(&self) -> String {
        self.html()
    }

    fn text(&self) -> String {
        ElementRef::text(self).collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(ToString::to_string)
    }
}
