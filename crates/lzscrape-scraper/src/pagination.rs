//! Listing URL construction from a country's `url_template`.
//!
//! Placeholders:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{query}` | search phrase, form-encoded (`hair care` → `hair+care`) |
//! | `{tag}` | tag slug (`Bath & Body` → `bath-and-body`) |
//! | `{page}` | 1-based page number |
//! | `{first_request}` | `true` on page 1, else `false` |

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ScraperError;

/// Characters left bare by HTML form encoding, apart from space.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Form-encodes a search phrase, spaces as `+`.
#[must_use]
pub fn encode_query(query: &str) -> String {
    utf8_percent_encode(query, FORM)
        .to_string()
        .replace("%20", "+")
}

/// Slug used by tag-style listing paths: lowercase, spaces to `-`,
/// `&` to `and`, commas dropped.
#[must_use]
pub fn tag_slug(query: &str) -> String {
    query
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .replace('&', "and")
        .replace(',', "")
}

/// Fills `template` for one page of `query`.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if the result is not a valid URL.
pub fn listing_url(template: &str, query: &str, page: u32) -> Result<String, ScraperError> {
    let tag = utf8_percent_encode(&tag_slug(query), FORM).to_string();
    let url = template
        .replace("{first_request}", if page == 1 { "true" } else { "false" })
        .replace("{page}", &page.to_string())
        .replace("{query}", &encode_query(query))
        .replace("{tag}", &tag);

    reqwest::Url::parse(&url).map_err(|e| ScraperError::InvalidUrl {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: &str = "https://www.lazada.co.th/catalog/?ajax=true&isFirstRequest={first_request}&page={page}&q={query}";
    const ID: &str = "https://www.lazada.co.id/tag/{tag}/?ajax=true&isFirstRequest={first_request}&page={page}&q={query}";

    #[test]
    fn encode_query_uses_plus_for_spaces() {
        assert_eq!(encode_query("hair care"), "hair+care");
        assert_eq!(encode_query("bath & body"), "bath+%26+body");
        assert_eq!(encode_query("men's_grooming-kit"), "men%27s_grooming-kit");
    }

    #[test]
    fn tag_slug_matches_site_tag_paths() {
        assert_eq!(tag_slug("Hair Care"), "hair-care");
        assert_eq!(tag_slug("Bath & Body"), "bath-and-body");
        assert_eq!(tag_slug("Pens, Pencils"), "pens-pencils");
    }

    #[test]
    fn listing_url_first_page() {
        let url = listing_url(TH, "hair care", 1).unwrap();
        assert_eq!(
            url,
            "https://www.lazada.co.th/catalog/?ajax=true&isFirstRequest=true&page=1&q=hair+care"
        );
    }

    #[test]
    fn listing_url_later_page_with_tag() {
        let url = listing_url(ID, "skin care", 2).unwrap();
        assert_eq!(
            url,
            "https://www.lazada.co.id/tag/skin-care/?ajax=true&isFirstRequest=false&page=2&q=skin+care"
        );
    }

    #[test]
    fn listing_url_rejects_relative_template() {
        let err = listing_url("/catalog?page={page}&q={query}", "x", 1).unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }));
    }
}
