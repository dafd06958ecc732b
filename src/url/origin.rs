use crate::UrlError;
use std::fmt;
use url::Url;

/// The (scheme, host, port) triple identifying the crawled server
///
/// Derived once from the seed URL. Ports are always explicit, so
/// `http://site.test/` and `http://site.test:80/` share an origin while
/// `https://site.test/` does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    /// Derives the origin of a URL
    ///
    /// # Examples
    ///
    /// ```
    /// use site_crawler::url::Origin;
    /// use url::Url;
    ///
    /// let origin = Origin::from_url(&Url::parse("http://Site.Test/a").unwrap()).unwrap();
    /// assert_eq!(origin.to_string(), "http://site.test:80");
    /// ```
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        let host = url.host_str().ok_or(UrlError::MissingHost)?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| UrlError::InvalidScheme(url.scheme().to_string()))?;

        Ok(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    /// Returns true if `url` lives on this origin
    pub fn admits(&self, url: &Url) -> bool {
        url.scheme().eq_ignore_ascii_case(&self.scheme)
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default() == Some(self.port)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(seed: &str) -> Origin {
        Origin::from_url(&Url::parse(seed).unwrap()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin_admitted() {
        let origin = origin("http://site.test/a");
        assert!(origin.admits(&url("http://site.test/b")));
        assert!(origin.admits(&url("http://site.test/deep/path?q=1")));
    }

    #[test]
    fn test_default_port_equivalence() {
        let origin = origin("http://site.test/");
        assert!(origin.admits(&url("http://site.test:80/x")));
        assert_eq!(origin.port(), 80);

        let secure = self::origin("https://site.test/");
        assert!(secure.admits(&url("https://site.test:443/x")));
        assert_eq!(secure.port(), 443);
    }

    #[test]
    fn test_different_host_rejected() {
        let origin = origin("http://site.test/a");
        assert!(!origin.admits(&url("http://other.test/x")));
        assert!(!origin.admits(&url("http://sub.site.test/x")));
    }

    #[test]
    fn test_different_scheme_rejected() {
        let origin = origin("http://site.test/a");
        assert!(!origin.admits(&url("https://site.test/a")));
    }

    #[test]
    fn test_different_port_rejected() {
        let origin = origin("http://site.test/a");
        assert!(!origin.admits(&url("http://site.test:8080/a")));
    }

    #[test]
    fn test_host_case_insensitive() {
        let origin = origin("http://SITE.test/a");
        assert_eq!(origin.host(), "site.test");
        assert!(origin.admits(&url("http://Site.Test/b")));
    }

    #[test]
    fn test_ip_host_with_port() {
        let origin = origin("http://127.0.0.1:4321/");
        assert!(origin.admits(&url("http://127.0.0.1:4321/page")));
        assert!(!origin.admits(&url("http://127.0.0.1:4322/page")));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            origin("https://site.test/a").to_string(),
            "https://site.test:443"
        );
    }
}
