//! A fetched page and its lazily parsed tree.

use crate::document::Document;
use crate::error::Result;
use crate::wrapper::Chainy;
use once_cell::unsync::OnceCell;
use std::fmt;

/// URLs longer than this are shortened in `Display`.
const URL_DISPLAY_LEN: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub method: Option<String>,
    pub url: Option<String>,
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    document: OnceCell<Document>,
}

impl Response {
    pub fn new(body: impl Into<String>) -> Self {
        Response { body: body.into(), ..Response::default() }
    }

    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: u16, reason: impl Into<String>) -> Self {
        self.status = Some(status);
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// The parsed body. Parsed on first access, then reused.
    pub fn document(&self) -> &Document {
        self.document.get_or_init(|| Document::parse(&self.body))
    }

    /// The `<html>` element, ready for eager operations.
    pub fn root(&self) -> Chainy {
        Chainy::new(self.document().root())
    }

    pub fn css(&self, selector: &str) -> Result<Chainy> {
        self.root().css(selector)
    }

    pub fn xpath(&self, query: &str) -> Result<Chainy> {
        self.root().xpath(query)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.map_or_else(|| "-".to_string(), |s| s.to_string());
        let method = self.method.as_deref().unwrap_or("-");
        let url = match self.url.as_deref() {
            Some(url) if url.chars().count() > URL_DISPLAY_LEN => {
                format!("{}...", url.chars().take(URL_DISPLAY_LEN - 3).collect::<String>())
            }
            Some(url) => url.to_string(),
            None => "-".to_string(),
        };
        write!(f, "Response({status}, {method} {url}, {} chars)", self.body.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    const PAGE: &str = "<html><body><h1>Title</h1><p class='x'>a</p><p>b</p></body></html>";

    #[test]
    fn root_is_parsed_once() {
        let response = Response::new(PAGE);
        let first = response.root();
        let again = response.root();
        assert_eq!(first, again);
        assert_eq!(response.css("h1").unwrap().op("text").unwrap().into_value(), Value::from("Title"));
        assert_eq!(response.xpath("//p[@class='x']").unwrap().op("text").unwrap().into_value(), Value::from("a"));
    }

    #[test]
    fn display_shortens_long_urls() {
        let url = format!("https://example.com/{}", "a".repeat(60));
        let response = Response::new("abc").with_request("GET", url).with_status(200, "OK");
        let shown = response.to_string();
        assert!(shown.starts_with("Response(200, GET https://example.com/aaa"));
        assert!(shown.ends_with("..., 3 chars)"));

        let short = Response::new("").with_request("GET", "https://x.org");
        assert_eq!(short.to_string(), "Response(-, GET https://x.org, 0 chars)");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let response = Response::new("").with_header("Content-Type", "text/html");
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.header("x-missing"), None);
    }
}
