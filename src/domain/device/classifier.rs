//! Device classification from override parameter, CDN edge headers or user agent

use http::header::USER_AGENT;
use http::HeaderMap;
use url::form_urlencoded;

use super::DeviceType;

/// Query parameter that forces a device type
pub const DEFAULT_OVERRIDE_PARAM: &str = "mobify_devicetype";

pub const CDN_TABLET_HEADER: &str = "cloudfront-is-tablet-viewer";
pub const CDN_MOBILE_HEADER: &str = "cloudfront-is-mobile-viewer";
pub const CDN_DESKTOP_HEADER: &str = "cloudfront-is-desktop-viewer";

/// Derives a `DeviceType` for a request. Never fails; desktop is the fallback.
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    override_param: String,
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_PARAM)
    }
}

impl DeviceClassifier {
    pub fn new(override_param: impl Into<String>) -> Self {
        Self {
            override_param: override_param.into(),
        }
    }

    pub fn override_param(&self) -> &str {
        &self.override_param
    }

    /// Classifies a request from its query string and headers
    pub fn classify(&self, query: Option<&str>, headers: &HeaderMap) -> DeviceType {
        if let Some(device) = self.from_override(query) {
            return device;
        }

        if let Some(device) = Self::from_cdn_headers(headers) {
            return device;
        }

        headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(Self::from_user_agent)
            .unwrap_or_default()
    }

    fn from_override(&self, query: Option<&str>) -> Option<DeviceType> {
        let query = query?;

        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == self.override_param.as_str())
            .and_then(|(_, value)| value.parse().ok())
    }

    fn from_cdn_headers(headers: &HeaderMap) -> Option<DeviceType> {
        let flag = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
        };

        let tablet = flag(CDN_TABLET_HEADER);
        let mobile = flag(CDN_MOBILE_HEADER);
        let desktop = flag(CDN_DESKTOP_HEADER);

        if tablet.is_none() && mobile.is_none() && desktop.is_none() {
            return None;
        }

        if tablet == Some(true) {
            Some(DeviceType::Tablet)
        } else if mobile == Some(true) {
            Some(DeviceType::Phone)
        } else {
            Some(DeviceType::Desktop)
        }
    }

    fn from_user_agent(user_agent: &str) -> DeviceType {
        let Some(parsed) = woothee::parser::Parser::new().parse(user_agent) else {
            return DeviceType::Desktop;
        };

        match parsed.category {
            "smartphone" | "mobilephone" => {
                // woothee files tablets under smartphone; split them by OS
                let android_tablet = parsed.os == "Android" && !user_agent.contains("Mobile");

                if parsed.os == "iPad" || android_tablet {
                    DeviceType::Tablet
                } else {
                    DeviceType::Phone
                }
            }
            _ => DeviceType::Desktop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID_PHONE_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36";
    const ANDROID_TABLET_UA: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

    fn headers_with_ua(ua: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(ua).unwrap());
        headers
    }

    #[test]
    fn test_override_wins_over_desktop_user_agent() {
        let classifier = DeviceClassifier::default();
        let headers = headers_with_ua(DESKTOP_UA);

        let device = classifier.classify(Some("mobify_devicetype=TABLET"), &headers);
        assert_eq!(device, DeviceType::Tablet);
    }

    #[test]
    fn test_override_is_case_insensitive() {
        let classifier = DeviceClassifier::default();

        let device = classifier.classify(Some("a=1&mobify_devicetype=phone"), &HeaderMap::new());
        assert_eq!(device, DeviceType::Phone);
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        let classifier = DeviceClassifier::default();
        let headers = headers_with_ua(IPHONE_UA);

        let device = classifier.classify(Some("mobify_devicetype=watch"), &headers);
        assert_eq!(device, DeviceType::Phone);
    }

    #[test]
    fn test_custom_override_param() {
        let classifier = DeviceClassifier::new("device");

        let device = classifier.classify(Some("device=tablet"), &HeaderMap::new());
        assert_eq!(device, DeviceType::Tablet);
    }

    #[test]
    fn test_cdn_tablet_header_beats_mobile() {
        let classifier = DeviceClassifier::default();
        let mut headers = headers_with_ua(IPHONE_UA);
        headers.insert(CDN_MOBILE_HEADER, HeaderValue::from_static("true"));
        headers.insert(CDN_TABLET_HEADER, HeaderValue::from_static("true"));

        assert_eq!(classifier.classify(None, &headers), DeviceType::Tablet);
    }

    #[test]
    fn test_cdn_mobile_header() {
        let classifier = DeviceClassifier::default();
        let mut headers = headers_with_ua(DESKTOP_UA);
        headers.insert(CDN_TABLET_HEADER, HeaderValue::from_static("false"));
        headers.insert(CDN_MOBILE_HEADER, HeaderValue::from_static("true"));

        assert_eq!(classifier.classify(None, &headers), DeviceType::Phone);
    }

    #[test]
    fn test_cdn_headers_present_but_false_is_desktop() {
        let classifier = DeviceClassifier::default();
        let mut headers = headers_with_ua(IPHONE_UA);
        headers.insert(CDN_DESKTOP_HEADER, HeaderValue::from_static("false"));

        assert_eq!(classifier.classify(None, &headers), DeviceType::Desktop);
    }

    #[test]
    fn test_mobile_user_agent_is_phone() {
        let classifier = DeviceClassifier::default();

        assert_eq!(
            classifier.classify(None, &headers_with_ua(IPHONE_UA)),
            DeviceType::Phone
        );
        assert_eq!(
            classifier.classify(None, &headers_with_ua(ANDROID_PHONE_UA)),
            DeviceType::Phone
        );
    }

    #[test]
    fn test_tablet_user_agent_is_tablet() {
        let classifier = DeviceClassifier::default();

        assert_eq!(
            classifier.classify(None, &headers_with_ua(IPAD_UA)),
            DeviceType::Tablet
        );
        assert_eq!(
            classifier.classify(None, &headers_with_ua(ANDROID_TABLET_UA)),
            DeviceType::Tablet
        );
    }

    #[test]
    fn test_missing_or_unknown_user_agent_is_desktop() {
        let classifier = DeviceClassifier::default();

        assert_eq!(classifier.classify(None, &HeaderMap::new()), DeviceType::Desktop);
        assert_eq!(
            classifier.classify(None, &headers_with_ua("curl/8.0")),
            DeviceType::Desktop
        );
        assert_eq!(
            classifier.classify(None, &headers_with_ua(DESKTOP_UA)),
            DeviceType::Desktop
        );
    }
}
