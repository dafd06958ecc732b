use crate::UrlError;
use url::Url;

/// Normalizes an absolute URL string into the crawler's canonical form
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Reject anything that is not `http` or `https`
/// 3. Reject URLs without a host
/// 4. Remove the fragment (everything after #)
///
/// Scheme and host are lower-cased and default ports dropped by the parser
/// itself. Path and query are kept as-is because servers may route on their
/// case.
///
/// # Examples
///
/// ```
/// use site_crawler::url::normalize_url;
///
/// let url = normalize_url("HTTP://Site.Test:80/Docs/Page#intro").unwrap();
/// assert_eq!(url.as_str(), "http://site.test/Docs/Page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Resolves a raw `href` against the page it was found on and normalizes it
///
/// Relative (`b.html`, `../x`), root-relative (`/b`), protocol-relative
/// (`//host/x`) and absolute forms are all resolved per the WHATWG URL
/// standard. Links that cannot be crawled at all (`mailto:`, `javascript:`,
/// `tel:`, `data:`, malformed syntax) come back as an error so the caller can
/// drop them.
///
/// # Examples
///
/// ```
/// use site_crawler::url::normalize_href;
/// use url::Url;
///
/// let base = Url::parse("http://site.test/docs/a.html").unwrap();
/// let url = normalize_href("../b.html#top", &base).unwrap();
/// assert_eq!(url.as_str(), "http://site.test/b.html");
///
/// assert!(normalize_href("mailto:someone@site.test", &base).is_err());
/// ```
pub fn normalize_href(href: &str, base: &Url) -> Result<Url, UrlError> {
    let url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    Ok(url)
}
