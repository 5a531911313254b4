use std::fmt;

use serde::{Deserialize, Serialize};

/// Known HTTP status codes and their short descriptions, sorted by code.
const STATUS_DESCRIPTIONS: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (102, "Processing"),
    (103, "Early Hints"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Info"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (207, "Multi-Status"),
    (208, "Already Reported"),
    (226, "IM Used"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (306, "Unused"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Payload Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "I'm a Teapot"),
    (421, "Misdirected Request"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (425, "Too Early"),
    (426, "Upgrade Required"),
    (428, "Precondition Required"),
    (429, "Too Many Requests"),
    (431, "Request Header Fields Too Large"),
    (451, "Unavailable for Legal Reasons"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (506, "Variant Also Negotiates"),
    (507, "Insufficient Storage"),
    (508, "Loop Detected"),
    (510, "Not Extended"),
    (511, "Network Authentication Required"),
];

/// Description used for codes missing from the table.
pub const UNKNOWN_DESCRIPTION: &str = "(Unknown Status Code)";

/// Status class selected by the hundreds digit of a code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 5] = [
        StatusClass::Informational,
        StatusClass::Success,
        StatusClass::Redirection,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    /// `None` for codes outside 100..=599.
    pub fn of(code: u16) -> Option<Self> {
        match code / 100 {
            1 => Some(StatusClass::Informational),
            2 => Some(StatusClass::Success),
            3 => Some(StatusClass::Redirection),
            4 => Some(StatusClass::ClientError),
            5 => Some(StatusClass::ServerError),
            _ => None,
        }
    }

    /// Bucket name, e.g. `4xx`.
    pub fn name(self) -> &'static str {
        match self {
            StatusClass::Informational => "1xx",
            StatusClass::Success => "2xx",
            StatusClass::Redirection => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up the description of a status code.
pub fn describe(code: u16) -> Option<&'static str> {
    STATUS_DESCRIPTIONS
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|idx| STATUS_DESCRIPTIONS[idx].1)
}

pub fn describe_or_unknown(code: u16) -> &'static str {
    describe(code).unwrap_or(UNKNOWN_DESCRIPTION)
}

pub fn is_known(code: u16) -> bool {
    describe(code).is_some()
}

/// Every code in the table, in ascending order.
pub fn known_codes() -> impl Iterator<Item = u16> {
    STATUS_DESCRIPTIONS.iter().map(|&(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        let codes: Vec<u16> = known_codes().collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn describes_known_codes() {
        assert_eq!(describe(200), Some("OK"));
        assert_eq!(describe(404), Some("Not Found"));
        assert_eq!(describe(503), Some("Service Unavailable"));
    }

    #[test]
    fn unknown_codes_are_absent_not_panics() {
        assert_eq!(describe(299), None);
        assert_eq!(describe(999), None);
        assert_eq!(describe_or_unknown(599), UNKNOWN_DESCRIPTION);
        assert!(!is_known(0));
    }

    #[test]
    fn class_from_hundreds_digit() {
        assert_eq!(StatusClass::of(101), Some(StatusClass::Informational));
        assert_eq!(StatusClass::of(302), Some(StatusClass::Redirection));
        assert_eq!(StatusClass::of(418).map(StatusClass::name), Some("4xx"));
        assert_eq!(StatusClass::of(99), None);
        assert_eq!(StatusClass::of(600), None);
    }
}
