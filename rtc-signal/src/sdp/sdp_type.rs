use std::fmt;

use serde::{Deserialize, Serialize};

/// Describes the type of a session description in the SDP offer/answer model.
///
/// A description starts out [`Unspecified`](SdpType::Unspecified) and may be
/// refined exactly once, either at construction or later through
/// [`SessionDescription::hint_type`](crate::SessionDescription::hint_type).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdpType {
    /// Type not determined yet.
    #[default]
    Unspecified,

    /// The description MUST be treated as an SDP offer.
    #[serde(rename = "offer")]
    Offer,

    /// The description MUST be treated as an SDP answer.
    ///
    /// An answer never carries the `actpass` setup role; descriptions
    /// becoming answers while in that role are demoted to `passive`.
    #[serde(rename = "answer")]
    Answer,
}

const SDP_TYPE_OFFER_STR: &str = "offer";
const SDP_TYPE_ANSWER_STR: &str = "answer";

/// Unknown strings map to `Unspecified`, never an error.
impl From<&str> for SdpType {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_TYPE_OFFER_STR => SdpType::Offer,
            SDP_TYPE_ANSWER_STR => SdpType::Answer,
            _ => SdpType::Unspecified,
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SdpType::Offer => SDP_TYPE_OFFER_STR,
            SdpType::Answer => SDP_TYPE_ANSWER_STR,
            SdpType::Unspecified => "",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_sdp_type() {
        let tests = vec![
            ("offer", SdpType::Offer),
            ("answer", SdpType::Answer),
            ("", SdpType::Unspecified),
            ("pranswer", SdpType::Unspecified),
            ("OFFER", SdpType::Unspecified),
        ];

        for (type_string, expected_type) in tests {
            assert_eq!(
                SdpType::from(type_string),
                expected_type,
                "testCase: {type_string}",
            );
        }
    }

    #[test]
    fn test_sdp_type_string() {
        let tests = vec![
            (SdpType::Offer, "offer"),
            (SdpType::Answer, "answer"),
            (SdpType::Unspecified, ""),
        ];

        for (sdp_type, expected_string) in tests {
            assert_eq!(sdp_type.to_string(), expected_string)
        }
    }
}
