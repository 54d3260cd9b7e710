//! Device detection from the User-Agent header.

use serde::{Deserialize, Serialize};
use woothee::parser::Parser;

/// What the gateway writes under `data.device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub browser: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    pub os: String,
    /// desktop, mobile, bot, other or unknown
    pub category: String,
}

/// Wraps the woothee parser.
pub struct DeviceParser {
    parser: Parser,
}

impl DeviceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// `None` for empty or unrecognizable user agents.
    pub fn parse(&self, user_agent: &str) -> Option<DeviceInfo> {
        let user_agent = user_agent.trim();
        if user_agent.is_empty() {
            return None;
        }

        let result = self.parser.parse(user_agent)?;
        let known = |v: &str| !v.is_empty() && v != "UNKNOWN";

        // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
        let category = match result.category {
            "pc" => "desktop",
            "smartphone" | "mobilephone" => "mobile",
            "crawler" => "bot",
            "appliance" => "other",
            _ => "unknown",
        };

        Some(DeviceInfo {
            browser: if known(result.name) { result.name } else { "unknown" }.to_string(),
            browser_version: known(result.version).then(|| result.version.to_string()),
            os: if known(result.os) { result.os } else { "unknown" }.to_string(),
            category: category.to_string(),
        })
    }
}

impl Default for DeviceParser {
    fn default() -> Self {
        Self::new()
    }
}
