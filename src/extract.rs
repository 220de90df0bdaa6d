use crate::{
    query::{DocumentParser, QueryDocument, QueryNode},
    ExtractError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MISSING_SELECTOR: &str = "Please provide a CSS selector using the --selector option.";

/// Attribute value that selects the text content instead of an attribute.
const TEXT_MODE: &str = "text";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedOutput {
    pub count: usize,
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapedOutput {
    pub fn new(items: Vec<String>) -> Self {
        ScrapedOutput {
            count: items.len(),
            items,
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(error: S) -> Self {
        ScrapedOutput {
            count: 0,
            items: vec![],
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

impl From<&str> for OutputFormat {
    /// Anything other than `json` falls back to plain text.
    fn from(s: &str) -> Self {
        if s == "json" {
            OutputFormat::Json
        } else {
            OutputFormat::Plain
        }
    }
}

/// How a matched node becomes a single output string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Markup,
    Text,
    Attribute(String),
}

impl Projection {
    pub fn from_attribute(attribute: Option<&str>) -> Self {
        match attribute {
            None | Some("") => Projection::Markup,
            Some(TEXT_MODE) => Projection::Text,
            Some(name) => Projection::Attribute(name.to_string()),
        }
    }

    pub fn apply<N: QueryNode>(&self, node: &N) -> String {
        match self {
            Projection::Markup => node.serialize(),
            Projection::Text => node.text().trim().to_string(),
            Projection::Attribute(name) => node.attribute(name).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSpec {
    pub selector: Option<String>,
    pub attribute: Option<String>,
    pub format: OutputFormat,
}

impl SelectionSpec {
    pub fn new<S: Into<String>>(selector: S) -> Self {
        SelectionSpec {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn with_attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn projection(&self) -> Projection {
        Projection::from_attribute(self.attribute.as_deref())
    }
}

/// Result of an extraction. `FatalUsage` carries an output whose `error` is
/// set; the caller is expected to stop with a non-zero status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Complete(ScrapedOutput),
    FatalUsage(ScrapedOutput),
}

impl Extraction {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Extraction::FatalUsage(_))
    }

    pub fn output(&self) -> &ScrapedOutput {
        match self {
            Extraction::Complete(output) | Extraction::FatalUsage(output) => output,
        }
    }

    pub fn into_output(self) -> ScrapedOutput {
        match self {
            Extraction::Complete(output) | Extraction::FatalUsage(output) => output,
        }
    }
}

pub fn extract<P: DocumentParser>(
    parser: &P,
    body: &str,
    spec: &SelectionSpec,
) -> Result<Extraction, ExtractError> {
    let selector = match spec.selector.as_deref() {
        Some(selector) if !selector.is_empty() => selector,
        _ => return Ok(Extraction::FatalUsage(ScrapedOutput::failed(MISSING_SELECTOR))),
    };

    let document = parser.parse(body)?;
    let nodes = document.query(selector)?;

    let projection = spec.projection();
    let items: Vec<String> = nodes.iter().map(|node| projection.apply(node)).collect();
    debug!("Selector {:?} matched {} node(s)", selector, items.len());

    Ok(Extraction::Complete(ScrapedOutput::new(items)))
}
