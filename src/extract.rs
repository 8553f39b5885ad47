use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::SAMPLE_FIELD_COUNT;
use crate::error::HarvestError;

const SAMPLE_MARKER: &str = "Sample information";

/// Raw content scraped from one record's detail frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub sequence: String,
    pub fields: Vec<String>,
}

/// Parses a detail frame document: the first `<pre>` holds the sequence
/// text, and the sample-information fields sit in the rows following the
/// marker heading.
pub fn parse_detail(html: &str) -> Result<DetailPage, HarvestError> {
    let document = Html::parse_document(html);

    let pre = Selector::parse("pre").unwrap();
    let sequence = document
        .select(&pre)
        .next()
        .map(|element| element.text().collect::<String>())
        .ok_or(HarvestError::MissingSequence)?;

    Ok(DetailPage {
        sequence,
        fields: sample_fields(&document),
    })
}

fn sample_fields(document: &Html) -> Vec<String> {
    let mut fields = Vec::with_capacity(SAMPLE_FIELD_COUNT);
    let Some(marker_row) = marker_row(document) else {
        return fields;
    };
    for node in marker_row.next_siblings() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if element.value().name() != "tr" {
            continue;
        }
        fields.push(field_value(element));
        if fields.len() == SAMPLE_FIELD_COUNT {
            break;
        }
    }
    fields
}

/// The `<tr>` enclosing the bold marker heading; the field rows are its
/// following siblings.
fn marker_row(document: &Html) -> Option<ElementRef<'_>> {
    let bold = Selector::parse("b").unwrap();
    let marker = document
        .select(&bold)
        .find(|element| element.text().any(|text| text.contains(SAMPLE_MARKER)))?;
    marker
        .ancestors()
        .find_map(|node| ElementRef::wrap(node).filter(|el| el.value().name() == "tr"))
}

/// A field row reads `Label: value`. A row without the separator yields an
/// empty value so the column layout stays aligned.
fn field_value(row: ElementRef<'_>) -> String {
    let text = row.text().collect::<String>();
    match text.split_once(':') {
        Some((_, value)) => value.trim().replace('\n', ""),
        None => String::new(),
    }
}

/// Reads the sample count out of the listing page's `Total: N` label.
pub fn parse_total(text: &str) -> Option<usize> {
    let pattern = Regex::new(r"Total:\s*([0-9][0-9,]*)").unwrap();
    let captures = pattern.captures(text)?;
    captures[1].replace(',', "").parse().ok()
}
