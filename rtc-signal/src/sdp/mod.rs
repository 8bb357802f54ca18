pub mod candidate;
pub mod sdp_type;
pub mod session_description;
pub mod setup_role;

pub use candidate::Candidate;
pub use sdp_type::SdpType;
pub use session_description::{DataParameters, Media, SessionDescription};
pub use setup_role::SetupRole;
