//! Result-set pagination.
//!
//! Remote result sets larger than one page are walked with a cursor the
//! server returns in a `<set>` page descriptor.  A request either asks for
//! the first page (just a size limit) or for the page after a previously
//! returned last-item marker.

use serde::{Deserialize, Serialize};

use arkiv_shared::constants::RSM_NS;

use crate::element::Element;
use crate::error::{ProtoError, Result};

/// A page boundary token decoded from a response.
///
/// A default-constructed cursor represents "no prior page" and can only be
/// used to request the first page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageCursor {
    first: Option<String>,
    first_index: Option<u32>,
    last: Option<String>,
    count: Option<u32>,
}

impl PageCursor {
    /// Build the request fragment for the first page of a result set.
    pub fn first_page(max_items: u32) -> Element {
        Element::new("set")
            .with_attr("xmlns", RSM_NS)
            .with_child(Element::new("max").with_text(max_items.to_string()))
    }

    /// Build the request fragment for the page after this cursor.
    ///
    /// Fails with [`ProtoError::InvalidCursor`] when the cursor carries no
    /// last-item marker, i.e. it was never populated from a real response.
    pub fn next_page(&self, max_items: u32) -> Result<Element> {
        let last = self.last.as_deref().ok_or(ProtoError::InvalidCursor)?;
        Ok(Self::first_page(max_items).with_child(Element::new("after").with_text(last)))
    }

    /// Decode the page descriptor found in `response`.
    ///
    /// The descriptor must be exactly one `<set>` element in the
    /// pagination namespace with no other attributes, whose
    /// `first`/`last`/`count` children, when present, are non-empty and
    /// numeric where numbers are expected.
    pub fn from_response(response: &Element) -> Result<Self> {
        let descriptor = response.find("set").ok_or_else(|| {
            ProtoError::MalformedPageDescriptor("no <set> descriptor in response".to_string())
        })?;

        if descriptor.attr("xmlns") != Some(RSM_NS) {
            return Err(ProtoError::MalformedPageDescriptor(format!(
                "descriptor namespace is {:?}",
                descriptor.attr("xmlns")
            )));
        }
        if descriptor.attr_count() != 1 {
            return Err(ProtoError::MalformedPageDescriptor(
                "descriptor carries unexpected attributes".to_string(),
            ));
        }

        let mut cursor = Self::default();

        if let Some(first) = descriptor.first_child("first") {
            let marker = first.text();
            if marker.is_empty() {
                return Err(ProtoError::MalformedPageDescriptor(
                    "<first> has no item marker".to_string(),
                ));
            }
            let index = first.attr("index").ok_or_else(|| {
                ProtoError::MalformedPageDescriptor("<first> has no index".to_string())
            })?;
            cursor.first_index = Some(parse_number(index, "first index")?);
            cursor.first = Some(marker);
        }

        if let Some(last) = descriptor.first_child("last") {
            let marker = last.text();
            if marker.is_empty() {
                return Err(ProtoError::MalformedPageDescriptor(
                    "<last> has no item marker".to_string(),
                ));
            }
            cursor.last = Some(marker);
        }

        if let Some(count) = descriptor.first_child("count") {
            cursor.count = Some(parse_number(&count.text(), "count")?);
        }

        Ok(cursor)
    }

    /// Marker of the first item on the decoded page.
    pub fn first(&self) -> Option<&str> {
        self.first.as_deref()
    }

    /// Index of the first item within the whole result set.
    pub fn first_index(&self) -> Option<u32> {
        self.first_index
    }

    /// Marker of the last item on the decoded page; the "after" value of a
    /// continuation request.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Total number of items in the whole result set, when reported.
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    /// Whether this cursor can build a continuation request.
    pub fn has_marker(&self) -> bool {
        self.last.is_some()
    }

    /// Terminal condition of a pagination loop: the server reported a
    /// total count but no item markers, meaning the page was empty and
    /// there is nothing further to request.
    pub fn is_last_page(&self) -> bool {
        self.count.is_some() && self.first.is_none() && self.last.is_none()
    }
}

fn parse_number(text: &str, what: &str) -> Result<u32> {
    text.parse().map_err(|_| {
        ProtoError::MalformedPageDescriptor(format!("{what} is not a non-negative integer: {text:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(descriptor_body: &str) -> Element {
        Element::parse(&format!(
            r#"<iq type="result"><list xmlns="urn:xmpp:archive">
                 <set xmlns="{RSM_NS}">{descriptor_body}</set>
               </list></iq>"#
        ))
        .unwrap()
    }

    #[test]
    fn first_page_fragment_carries_only_a_limit() {
        let fragment = PageCursor::first_page(30);
        assert_eq!(fragment.name(), "set");
        assert_eq!(fragment.attr("xmlns"), Some(RSM_NS));
        assert_eq!(fragment.first_child("max").unwrap().text(), "30");
        assert!(fragment.first_child("after").is_none());
    }

    #[test]
    fn count_only_descriptor_is_the_last_page() {
        let cursor =
            PageCursor::from_response(&response("<count>250</count>")).unwrap();
        assert!(cursor.is_last_page());
        assert_eq!(cursor.count(), Some(250));
        assert!(!cursor.has_marker());
        assert!(matches!(
            cursor.next_page(30),
            Err(ProtoError::InvalidCursor)
        ));
    }

    #[test]
    fn populated_descriptor_continues_the_chain() {
        let cursor = PageCursor::from_response(&response(
            r#"<first index="0">item-one</first><last>item-thirty</last><count>250</count>"#,
        ))
        .unwrap();

        assert!(!cursor.is_last_page());
        assert_eq!(cursor.first(), Some("item-one"));
        assert_eq!(cursor.first_index(), Some(0));
        assert_eq!(cursor.last(), Some("item-thirty"));

        let fragment = cursor.next_page(30).unwrap();
        assert_eq!(fragment.first_child("after").unwrap().text(), "item-thirty");
        assert_eq!(fragment.first_child("max").unwrap().text(), "30");
    }

    #[test]
    fn default_cursor_is_invalid() {
        let cursor = PageCursor::default();
        assert!(!cursor.is_last_page());
        assert!(matches!(
            cursor.next_page(30),
            Err(ProtoError::InvalidCursor)
        ));
    }

    #[test]
    fn missing_descriptor_is_a_protocol_violation() {
        let bare = Element::parse(r#"<iq type="result"><list xmlns="urn:xmpp:archive"/></iq>"#)
            .unwrap();
        assert!(matches!(
            PageCursor::from_response(&bare),
            Err(ProtoError::MalformedPageDescriptor(_))
        ));
    }

    #[test]
    fn extra_descriptor_attributes_are_rejected() {
        let doc = Element::parse(&format!(
            r#"<iq><set xmlns="{RSM_NS}" extra="1"><count>5</count></set></iq>"#
        ))
        .unwrap();
        assert!(matches!(
            PageCursor::from_response(&doc),
            Err(ProtoError::MalformedPageDescriptor(_))
        ));
    }

    #[test]
    fn numeric_fields_must_parse() {
        assert!(matches!(
            PageCursor::from_response(&response("<count>many</count>")),
            Err(ProtoError::MalformedPageDescriptor(_))
        ));
        assert!(matches!(
            PageCursor::from_response(&response(
                r#"<first index="x">a</first><last>b</last>"#
            )),
            Err(ProtoError::MalformedPageDescriptor(_))
        ));
        assert!(matches!(
            PageCursor::from_response(&response("<first>a</first><last>b</last>")),
            Err(ProtoError::MalformedPageDescriptor(_))
        ));
    }
}
