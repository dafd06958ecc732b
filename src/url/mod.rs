//! URL handling module for the crawler
//!
//! This module provides href resolution, URL normalization and the
//! same-origin admission check that keeps a crawl on one server.

mod normalize;
mod origin;

pub use normalize::{normalize_href, normalize_url};
pub use origin::Origin;

use ::url::Url;

/// Outcome of running a discovered href through normalization and admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Same-origin URL that may be offered to the frontier
    Admitted(Url),
    /// Valid URL on a foreign origin
    OffOrigin(Url),
    /// The href could not be turned into a crawlable URL
    Unresolvable,
}

/// Resolves `href` against `base` and checks it against the run's origin
///
/// # Examples
///
/// ```
/// use site_crawler::url::{admit_href, Admission, Origin};
/// use url::Url;
///
/// let page = Url::parse("http://site.test/a").unwrap();
/// let origin = Origin::from_url(&page).unwrap();
///
/// assert!(matches!(admit_href("/b", &page, &origin), Admission::Admitted(_)));
/// assert!(matches!(
///     admit_href("http://other.test/x", &page, &origin),
///     Admission::OffOrigin(_)
/// ));
/// assert_eq!(admit_href("mailto:a@b.c", &page, &origin), Admission::Unresolvable);
/// ```
pub fn admit_href(href: &str, base: &Url, origin: &Origin) -> Admission {
    match normalize_href(href, base) {
        Ok(url) if origin.admits(&url) => Admission::Admitted(url),
        Ok(url) => Admission::OffOrigin(url),
        Err(_) => Admission::Unresolvable,
    }
}
