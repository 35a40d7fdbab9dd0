//! User-agent parsing, isolated behind a small struct so the rest of the
//! crate never touches `woothee`'s API directly.

/// The platform/browser facts pulled out of a `User-Agent` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub platform_name: Option<String>,
    pub platform_version: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub is_robot: bool,
}

const UNKNOWN: &str = "UNKNOWN";

fn normalize(value: &str) -> Option<String> {
    if value.is_empty() || value == UNKNOWN {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a raw `User-Agent` string. Unrecognised agents come back with every
/// field `None` and `is_robot` false, matching woothee's own "UNKNOWN"
/// sentinel convention.
pub fn parse(user_agent: &str) -> UserAgentInfo {
    match woothee::parser::Parser::new().parse(user_agent) {
        Some(result) => UserAgentInfo {
            platform_name: normalize(result.os),
            platform_version: normalize(result.os_version.as_ref()),
            browser_name: normalize(result.name),
            browser_version: normalize(result.version),
            is_robot: result.category == "crawler",
        },
        None => UserAgentInfo {
            platform_name: None,
            platform_version: None,
            browser_name: None,
            browser_version: None,
            is_robot: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_agent_has_no_facts() {
        let info = parse("");
        assert_eq!(info.platform_name, None);
        assert!(!info.is_robot);
    }

    #[test]
    fn googlebot_is_a_robot() {
        let info = parse(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        );
        assert!(info.is_robot);
    }

    #[test]
    fn firefox_is_not_a_robot() {
        let info = parse(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:75.0) Gecko/20100101 Firefox/75.0",
        );
        assert!(!info.is_robot);
        assert_eq!(info.browser_name.as_deref(), Some("Firefox"));
    }
}
