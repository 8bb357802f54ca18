use std::fmt;

use serde::{Deserialize, Serialize};

/// DTLS setup role negotiated through the SDP `a=setup` attribute.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupRole {
    /// The endpoint initiates the DTLS handshake.
    #[serde(rename = "active")]
    Active,

    /// The endpoint accepts an incoming DTLS handshake.
    #[serde(rename = "passive")]
    Passive,

    /// The endpoint can take either role; illegal in an answer.
    #[default]
    #[serde(rename = "actpass")]
    ActPass,
}

const SETUP_ROLE_ACTIVE_STR: &str = "active";
const SETUP_ROLE_PASSIVE_STR: &str = "passive";
const SETUP_ROLE_ACTPASS_STR: &str = "actpass";

/// Unknown strings map to `ActPass`.
impl From<&str> for SetupRole {
    fn from(raw: &str) -> Self {
        match raw {
            SETUP_ROLE_ACTIVE_STR => SetupRole::Active,
            SETUP_ROLE_PASSIVE_STR => SetupRole::Passive,
            _ => SetupRole::ActPass,
        }
    }
}

impl fmt::Display for SetupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SetupRole::Active => SETUP_ROLE_ACTIVE_STR,
            SetupRole::Passive => SETUP_ROLE_PASSIVE_STR,
            SetupRole::ActPass => SETUP_ROLE_ACTPASS_STR,
        };
        write!(f, "{s}")
    }
}
