use std::fmt;

use serde::{Deserialize, Serialize};

/// An ICE candidate carried as an opaque SDP attribute.
///
/// The candidate is kept verbatim as the attribute text (without the `a=`
/// prefix) together with the mid of the media section it belongs to.
/// Formatting renders the full attribute line, so candidates survive a
/// parse/generate round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    candidate: String,
    mid: String,
}

impl Candidate {
    /// Builds a candidate from an attribute line and its owning mid.
    /// A leading `a=` is stripped if present.
    pub fn new(candidate: &str, mid: &str) -> Self {
        let candidate = candidate.strip_prefix("a=").unwrap_or(candidate);
        Candidate {
            candidate: candidate.to_owned(),
            mid: mid.to_owned(),
        }
    }

    /// The attribute text, e.g. `candidate:1 1 UDP 2122260223 … typ host`.
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// The mid of the media section this candidate belongs to.
    pub fn mid(&self) -> &str {
        &self.mid
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}", self.candidate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RAW: &str = "candidate:1 1 UDP 2122260223 192.168.1.7 51810 typ host";

    #[test]
    fn test_candidate_strips_attribute_prefix() {
        let plain = Candidate::new(RAW, "data");
        let prefixed = Candidate::new(&format!("a={RAW}"), "data");

        assert_eq!(plain, prefixed);
        assert_eq!(plain.candidate(), RAW);
        assert_eq!(plain.mid(), "data");
    }

    #[test]
    fn test_candidate_string() {
        let candidate = Candidate::new(RAW, "0");
        assert_eq!(candidate.to_string(), format!("a={RAW}"));
    }

    #[test]
    fn test_candidate_json() {
        let candidate = Candidate::new(RAW, "data");
        let json = serde_json::to_string(&candidate).unwrap();
        let back: Candidate = serde_json::from_str(&json).unwrap();
        assert_eq!(candidate, back);
    }
}
