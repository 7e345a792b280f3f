//! Host runtime identification.
//!
//! The runtime check reads a user-agent like string and tells if the host is one of the
//! runtime families known to ship GPU compute, and if its version is recent enough.
//! The verdict is advisory: the prober records it but keeps going.

use crate::errors::ProbeError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref EDGE_VERSION: Regex = Regex::new(r"Edg/(\d+)").unwrap();
    static ref FIREFOX_VERSION: Regex = Regex::new(r"Firefox/(\d+)").unwrap();
    static ref CHROME_VERSION: Regex = Regex::new(r"Chrome/(\d+)").unwrap();
    static ref SAFARI_VERSION: Regex = Regex::new(r"Version/(\d+)").unwrap();
}

/// What the prober knows about the environment it runs in, apart from the GPU api itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    /// The context satisfies the transport security preconditions (HTTPS or local)
    pub secure_context: bool,
    pub user_agent: String,
}

impl HostContext {
    pub fn new(secure_context: bool, user_agent: &str) -> Self {
        HostContext {
            secure_context,
            user_agent: user_agent.to_string(),
        }
    }

    /// The host context of a native process: always secure, identified by the crate name
    pub fn native() -> Self {
        HostContext::new(
            true,
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Reads the secure context flag and the user agent from the browser window
    #[cfg(target_arch = "wasm32")]
    pub fn from_window() -> Self {
        match web_sys::window() {
            Some(window) => HostContext {
                secure_context: window.is_secure_context(),
                user_agent: window.navigator().user_agent().unwrap_or_default(),
            },
            None => HostContext::new(false, ""),
        }
    }
}

/// The runtime families known to expose GPU compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFamily {
    Chrome,
    Edge,
    Safari,
    Firefox,
}

impl RuntimeFamily {
    /// Identifies the family from the user agent
    ///
    /// Edge and Chrome user agents also carry the `Safari/` token and Edge carries
    /// `Chrome/` too, so the most specific tokens are matched first.
    pub fn detect(user_agent: &str) -> Option<Self> {
        if user_agent.contains("Edg/") {
            Some(RuntimeFamily::Edge)
        } else if user_agent.contains("Firefox/") {
            Some(RuntimeFamily::Firefox)
        } else if user_agent.contains("Chrome/") {
            Some(RuntimeFamily::Chrome)
        } else if user_agent.contains("Safari/") {
            Some(RuntimeFamily::Safari)
        } else {
            None
        }
    }

    pub fn minimum_version(&self) -> f64 {
        match self {
            RuntimeFamily::Chrome | RuntimeFamily::Edge | RuntimeFamily::Firefox => 113.0,
            RuntimeFamily::Safari => 16.4,
        }
    }

    /// Parses the major version out of the user agent, `0` when it can't be found
    pub fn parse_version(&self, user_agent: &str) -> u32 {
        let pattern: &Regex = match self {
            RuntimeFamily::Chrome => &CHROME_VERSION,
            RuntimeFamily::Edge => &EDGE_VERSION,
            RuntimeFamily::Safari => &SAFARI_VERSION,
            RuntimeFamily::Firefox => &FIREFOX_VERSION,
        };
        pattern
            .captures(user_agent)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFamily::Chrome => write!(f, "Chrome"),
            RuntimeFamily::Edge => write!(f, "Edge"),
            RuntimeFamily::Safari => write!(f, "Safari"),
            RuntimeFamily::Firefox => write!(f, "Firefox"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeVerdict {
    Compatible { family: RuntimeFamily, version: u32 },
    TooOld { family: RuntimeFamily, version: u32 },
    Unsupported,
}

impl RuntimeVerdict {
    pub fn family(&self) -> Option<RuntimeFamily> {
        match self {
            RuntimeVerdict::Compatible { family, .. } | RuntimeVerdict::TooOld { family, .. } => {
                Some(*family)
            }
            RuntimeVerdict::Unsupported => None,
        }
    }

    /// The diagnostic to record, if any
    pub fn to_error(&self) -> Option<ProbeError> {
        match self {
            RuntimeVerdict::Compatible { .. } => None,
            RuntimeVerdict::TooOld { family, version } => Some(ProbeError::BrowserVersionTooOld {
                family: family.to_string(),
                version: *version,
                minimum: family.minimum_version().to_string(),
            }),
            RuntimeVerdict::Unsupported => Some(ProbeError::UnsupportedBrowser),
        }
    }
}

pub fn check_runtime(user_agent: &str) -> RuntimeVerdict {
    let Some(family) = RuntimeFamily::detect(user_agent) else {
        return RuntimeVerdict::Unsupported;
    };
    let version = family.parse_version(user_agent);
    if f64::from(version) < family.minimum_version() {
        RuntimeVerdict::TooOld { family, version }
    } else {
        RuntimeVerdict::Compatible { family, version }
    }
}

#[cfg(test)]
mod runtime_test {
    use super::*;

    const CHROME_120: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE_112: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36 Edg/112.0.1722.39";
    const SAFARI_17: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15";
    const SAFARI_16: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Safari/605.1.15";
    const FIREFOX_115: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0";

    #[test]
    fn families_are_detected() {
        assert_eq!(RuntimeFamily::detect(CHROME_120), Some(RuntimeFamily::Chrome));
        assert_eq!(RuntimeFamily::detect(EDGE_112), Some(RuntimeFamily::Edge));
        assert_eq!(RuntimeFamily::detect(SAFARI_17), Some(RuntimeFamily::Safari));
        assert_eq!(RuntimeFamily::detect(FIREFOX_115), Some(RuntimeFamily::Firefox));
        assert_eq!(RuntimeFamily::detect("curl/8.4.0"), None);
    }

    #[test]
    fn versions_against_minimums() {
        assert_eq!(
            check_runtime(CHROME_120),
            RuntimeVerdict::Compatible {
                family: RuntimeFamily::Chrome,
                version: 120
            }
        );
        assert_eq!(
            check_runtime(EDGE_112),
            RuntimeVerdict::TooOld {
                family: RuntimeFamily::Edge,
                version: 112
            }
        );
        assert!(matches!(
            check_runtime(SAFARI_17),
            RuntimeVerdict::Compatible { version: 17, .. }
        ));
        assert!(matches!(
            check_runtime(FIREFOX_115),
            RuntimeVerdict::Compatible { version: 115, .. }
        ));
    }

    #[test]
    fn only_the_major_version_counts() {
        // 16.4 parses as 16, which is below the 16.4 minimum
        assert!(matches!(
            check_runtime(SAFARI_16),
            RuntimeVerdict::TooOld { version: 16, .. }
        ));
    }

    #[test]
    fn unparsable_version_is_too_old() {
        let verdict = check_runtime("SomeShell Chrome/beta");
        assert_eq!(
            verdict,
            RuntimeVerdict::TooOld {
                family: RuntimeFamily::Chrome,
                version: 0
            }
        );
        assert_eq!(verdict.to_error().unwrap().code(), "BROWSER_VERSION_TOO_OLD");
    }

    #[test]
    fn unknown_runtime_is_unsupported() {
        let verdict = check_runtime(&HostContext::native().user_agent);
        assert_eq!(verdict, RuntimeVerdict::Unsupported);
        assert_eq!(verdict.family(), None);
        assert_eq!(verdict.to_error(), Some(ProbeError::UnsupportedBrowser));
    }
}
