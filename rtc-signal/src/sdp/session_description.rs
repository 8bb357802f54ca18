use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use rand::{rng, Rng};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::sdp::candidate::Candidate;
use crate::sdp::sdp_type::SdpType;
use crate::sdp::setup_role::SetupRole;
use shared::error::Result;

/// Parameters of the application (data channel) media section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataParameters {
    pub mid: String,
    pub sctp_port: Option<u16>,
    pub max_message_size: Option<usize>,
}

impl Default for DataParameters {
    fn default() -> Self {
        DataParameters {
            mid: "data".to_owned(),
            sctp_port: None,
            max_message_size: None,
        }
    }
}

/// A non-data media section parsed from an `m=` line.
///
/// Attributes other than the ones the session keeps typed (`mid`, `setup`,
/// ICE credentials, fingerprint, candidates) are preserved verbatim, in
/// order, without the `a=` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub kind: String,
    pub description: String,
    pub mid: String,
    pub attributes: Vec<String>,
}

impl Media {
    /// Splits an m-line body (`m=` already stripped) into kind and
    /// description. The port token is discarded; it is regenerated.
    fn from_mline(mline: &str) -> Self {
        let kind = match mline.find(' ') {
            Some(p) => &mline[..p],
            None => mline,
        };

        let mut description = "";
        if let Some(p) = mline.find(' ') {
            if let Some(q) = mline[p + 1..].find(' ') {
                description = &mline[p + 1 + q + 1..];
            }
        }

        Media {
            kind: kind.to_owned(),
            description: description.to_owned(),
            mid: String::new(),
            attributes: Vec::new(),
        }
    }
}

/// A session description in the SDP offer/answer model.
///
/// Parsing is line-oriented and best-effort over the WebRTC-relevant subset:
/// recognized attributes are stored typed, unknown attributes inside a media
/// section are preserved verbatim, and all other line kinds are ignored.
/// Generation emits the canonical form with a single BUNDLE group covering
/// every media section plus the data section.
///
/// # Examples
///
/// ```
/// use rtc_signal::SessionDescription;
///
/// # fn main() -> shared::error::Result<()> {
/// let sdp = "v=0\r\n\
///            o=- 42 0 IN IP4 0.0.0.0\r\n\
///            s=-\r\n\
///            t=0 0\r\n\
///            m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
///            a=mid:data\r\n\
///            a=sctp-port:5000\r\n";
///
/// let description = SessionDescription::offer(sdp)?;
/// assert_eq!(description.data_mid(), "data");
/// assert_eq!(description.sctp_port(), Some(5000));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionDescription {
    sdp_type: SdpType,
    role: SetupRole,
    session_id: String,
    ice_ufrag: String,
    ice_pwd: String,
    fingerprint: Option<String>,
    data: DataParameters,
    media: BTreeMap<usize, Media>,
    candidates: Vec<Candidate>,
    ended: bool,
}

impl SessionDescription {
    /// Parses an SDP text with an explicit type hint and initial role.
    ///
    /// Returns an error only for unparseable numeric attributes
    /// (`sctp-port`, `max-message-size`); everything else is best-effort.
    pub fn new(sdp: &str, sdp_type: SdpType, role: SetupRole) -> Result<Self> {
        let mut description = SessionDescription {
            sdp_type: SdpType::Unspecified,
            role,
            session_id: rng().random::<u32>().to_string(),
            ice_ufrag: String::new(),
            ice_pwd: String::new(),
            fingerprint: None,
            data: DataParameters::default(),
            media: BTreeMap::new(),
            candidates: Vec::new(),
            ended: false,
        };
        description.hint_type(sdp_type);
        description.parse(sdp)?;
        Ok(description)
    }

    /// Parses an SDP offer.
    pub fn offer(sdp: &str) -> Result<Self> {
        Self::new(sdp, SdpType::Offer, SetupRole::ActPass)
    }

    /// Parses an SDP answer. The setup role is demoted to `passive`,
    /// as `actpass` is illegal in an answer.
    pub fn answer(sdp: &str) -> Result<Self> {
        Self::new(sdp, SdpType::Answer, SetupRole::ActPass)
    }

    /// Parses an SDP text with the type given as a string; unknown type
    /// strings leave the description unspecified.
    pub fn from_type_string(sdp: &str, type_string: &str) -> Result<Self> {
        Self::new(sdp, SdpType::from(type_string), SetupRole::ActPass)
    }

    fn parse(&mut self, sdp: &str) -> Result<()> {
        let mut current_media: Option<Media> = None;
        let mut mline_index = 0usize;

        for line in sdp.lines() {
            let line = line.trim_end();

            if line.starts_with("m=") {
                self.flush_media(current_media.take(), &mut mline_index, line);
                current_media = Some(Media::from_mline(&line[2..]));
            } else if let Some(attr) = line.strip_prefix("a=") {
                self.parse_attribute(attr, &mut current_media)?;
            }
            // v=, o=, s=, t=, c= and anything else carry no state we keep
        }
        self.flush_media(current_media.take(), &mut mline_index, "");

        Ok(())
    }

    /// Closes the media section being assembled when the next `m=` line (or
    /// the end of input, with `line` empty) is reached.
    fn flush_media(&mut self, media: Option<Media>, mline_index: &mut usize, line: &str) {
        let Some(media) = media else {
            return;
        };

        if !media.mid.is_empty() {
            if media.kind == "application" {
                self.data.mid = media.mid;
            } else {
                self.media.insert(*mline_index, media);
            }
            *mline_index += 1;
        } else if line.contains(" ICE/SDP") {
            warn!("SDP \"m=\" line has no corresponding mid, ignoring");
        }
    }

    fn parse_attribute(&mut self, attr: &str, current_media: &mut Option<Media>) -> Result<()> {
        let (key, value) = match attr.split_once(':') {
            Some((key, value)) => (key, value),
            None => (attr, ""),
        };

        match key {
            "mid" => {
                if let Some(media) = current_media.as_mut() {
                    media.mid = value.to_owned();
                }
            }
            "setup" => {
                self.role = SetupRole::from(value);
            }
            "fingerprint" => {
                if let Some(fingerprint) = value.strip_prefix("sha-256 ") {
                    self.fingerprint = Some(fingerprint.to_uppercase());
                } else {
                    warn!("unknown SDP fingerprint type: {value}");
                }
            }
            "ice-ufrag" => self.ice_ufrag = value.to_owned(),
            "ice-pwd" => self.ice_pwd = value.to_owned(),
            "sctp-port" => self.data.sctp_port = Some(value.parse::<u16>()?),
            "max-message-size" => self.data.max_message_size = Some(value.parse::<usize>()?),
            "candidate" => {
                let mid = current_media
                    .as_ref()
                    .map(|media| media.mid.as_str())
                    .unwrap_or(self.data.mid.as_str());
                self.candidates.push(Candidate::new(attr, mid));
            }
            "end-of-candidates" => self.ended = true,
            // Regenerated structurally with its media section; storing it as
            // a plain attribute would duplicate it on the next generation
            "bundle-only" => {}
            _ => {
                if let Some(media) = current_media.as_mut() {
                    media.attributes.push(attr.to_owned());
                }
            }
        }

        Ok(())
    }

    pub fn sdp_type(&self) -> SdpType {
        self.sdp_type
    }

    pub fn role(&self) -> SetupRole {
        self.role
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn ice_ufrag(&self) -> Option<&str> {
        (!self.ice_ufrag.is_empty()).then_some(self.ice_ufrag.as_str())
    }

    pub fn ice_pwd(&self) -> Option<&str> {
        (!self.ice_pwd.is_empty()).then_some(self.ice_pwd.as_str())
    }

    /// Uppercase hex SHA-256 fingerprint of the DTLS certificate, if any.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn data_mid(&self) -> &str {
        &self.data.mid
    }

    /// Mid identifying the BUNDLE group: the first media section's mid if
    /// one exists, the data mid otherwise.
    pub fn bundle_mid(&self) -> &str {
        match self.media.get(&0) {
            Some(media) => &media.mid,
            None => &self.data.mid,
        }
    }

    pub fn sctp_port(&self) -> Option<u16> {
        self.data.sctp_port
    }

    pub fn max_message_size(&self) -> Option<usize> {
        self.data.max_message_size
    }

    /// True once an `end-of-candidates` marker was parsed or
    /// [`end_candidates`](Self::end_candidates) was called.
    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// Non-data media sections keyed by m-line index.
    pub fn media(&self) -> &BTreeMap<usize, Media> {
        &self.media
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Refines the type once; later calls are no-ops. Becoming an answer
    /// while the role is still `actpass` demotes the role to `passive`.
    pub fn hint_type(&mut self, sdp_type: SdpType) {
        if self.sdp_type == SdpType::Unspecified {
            self.sdp_type = sdp_type;
            if self.sdp_type == SdpType::Answer && self.role == SetupRole::ActPass {
                self.role = SetupRole::Passive;
            }
        }
    }

    pub fn set_data_mid(&mut self, mid: String) {
        self.data.mid = mid;
    }

    pub fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = Some(fingerprint);
    }

    pub fn set_sctp_port(&mut self, port: u16) {
        self.data.sctp_port = Some(port);
    }

    pub fn set_max_message_size(&mut self, size: usize) {
        self.data.max_message_size = Some(size);
    }

    pub fn add_candidate(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    pub fn end_candidates(&mut self) {
        self.ended = true;
    }

    /// Drains the gathered candidates. This also resets the end-of-candidates
    /// marker, so trickling can resume on the emptied description.
    pub fn extract_candidates(&mut self) -> Vec<Candidate> {
        self.ended = false;
        std::mem::take(&mut self.candidates)
    }

    /// Copies the media sections of `source` into this description,
    /// keeping existing sections at conflicting indices.
    pub fn add_media(&mut self, source: &SessionDescription) {
        for (index, media) in &source.media {
            self.media.entry(*index).or_insert_with(|| media.clone());
        }
    }

    /// Emits the canonical SDP form, each line terminated by `eol`.
    pub fn generate_sdp(&self, eol: &str) -> String {
        let mut sdp = String::new();

        // Header
        sdp.push_str(&format!("v=0{eol}"));
        sdp.push_str(&format!("o=- {} 0 IN IP4 127.0.0.1{eol}", self.session_id));
        sdp.push_str(&format!("s=-{eol}"));
        sdp.push_str(&format!("t=0 0{eol}"));

        // BUNDLE group over every m-line slot; the data section fills the
        // single index absent from the media map
        sdp.push_str("a=group:BUNDLE");
        for i in 0..=self.media.len() {
            match self.media.get(&i) {
                Some(media) => {
                    sdp.push(' ');
                    sdp.push_str(&media.mid);
                }
                None => {
                    sdp.push(' ');
                    sdp.push_str(&self.data.mid);
                }
            }
        }
        sdp.push_str(eol);

        // Lip-sync group for the non-data media
        if !self.media.is_empty() {
            sdp.push_str("a=group:LS");
            for media in self.media.values() {
                sdp.push(' ');
                sdp.push_str(&media.mid);
            }
            sdp.push_str(eol);
        }

        // Session-level attributes
        sdp.push_str(&format!("a=msid-semantic:WMS *{eol}"));
        sdp.push_str(&format!("a=setup:{}{eol}", self.role));
        sdp.push_str(&format!("a=ice-ufrag:{}{eol}", self.ice_ufrag));
        sdp.push_str(&format!("a=ice-pwd:{}{eol}", self.ice_pwd));

        if !self.ended {
            sdp.push_str(&format!("a=ice-options:trickle{eol}"));
        }
        if let Some(fingerprint) = &self.fingerprint {
            sdp.push_str(&format!("a=fingerprint:sha-256 {fingerprint}{eol}"));
        }

        // Media sections, the data section at its gap index
        for i in 0..=self.media.len() {
            if let Some(media) = self.media.get(&i) {
                sdp.push_str(&format!("m={} 0 {}{eol}", media.kind, media.description));
                sdp.push_str(&format!("c=IN IP4 0.0.0.0{eol}"));
                sdp.push_str(&format!("a=bundle-only{eol}"));
                sdp.push_str(&format!("a=mid:{}{eol}", media.mid));
                for attr in &media.attributes {
                    sdp.push_str(&format!("a={attr}{eol}"));
                }
            } else {
                let port = if self.media.is_empty() { 9 } else { 0 };
                sdp.push_str(&format!(
                    "m=application {port} UDP/DTLS/SCTP webrtc-datachannel{eol}"
                ));
                sdp.push_str(&format!("c=IN IP4 0.0.0.0{eol}"));
                if !self.media.is_empty() {
                    sdp.push_str(&format!("a=bundle-only{eol}"));
                }
                sdp.push_str(&format!("a=mid:{}{eol}", self.data.mid));
                sdp.push_str(&format!("a=sendrecv{eol}"));
                if let Some(port) = self.data.sctp_port {
                    sdp.push_str(&format!("a=sctp-port:{port}{eol}"));
                }
                if let Some(size) = self.data.max_message_size {
                    sdp.push_str(&format!("a=max-message-size:{size}{eol}"));
                }
            }
        }

        // Candidates
        for candidate in &self.candidates {
            sdp.push_str(&format!("{candidate}{eol}"));
        }
        if self.ended {
            sdp.push_str(&format!("a=end-of-candidates{eol}"));
        }

        sdp
    }

    /// Emits only the data section, with the session-level setup, ICE and
    /// fingerprint attributes carried inside it. Used when advertising the
    /// data channel alone.
    pub fn generate_data_sdp(&self, eol: &str) -> String {
        let mut sdp = String::new();

        // Header
        sdp.push_str(&format!("v=0{eol}"));
        sdp.push_str(&format!("o=- {} 0 IN IP4 127.0.0.1{eol}", self.session_id));
        sdp.push_str(&format!("s=-{eol}"));
        sdp.push_str(&format!("t=0 0{eol}"));

        // Data
        sdp.push_str(&format!(
            "m=application 9 UDP/DTLS/SCTP webrtc-datachannel{eol}"
        ));
        sdp.push_str(&format!("c=IN IP4 0.0.0.0{eol}"));
        sdp.push_str(&format!("a=mid:{}{eol}", self.data.mid));
        sdp.push_str(&format!("a=sendrecv{eol}"));
        if let Some(port) = self.data.sctp_port {
            sdp.push_str(&format!("a=sctp-port:{port}{eol}"));
        }
        if let Some(size) = self.data.max_message_size {
            sdp.push_str(&format!("a=max-message-size:{size}{eol}"));
        }

        sdp.push_str(&format!("a=setup:{}{eol}", self.role));
        sdp.push_str(&format!("a=ice-ufrag:{}{eol}", self.ice_ufrag));
        sdp.push_str(&format!("a=ice-pwd:{}{eol}", self.ice_pwd));

        if !self.ended {
            sdp.push_str(&format!("a=ice-options:trickle{eol}"));
        }
        if let Some(fingerprint) = &self.fingerprint {
            sdp.push_str(&format!("a=fingerprint:sha-256 {fingerprint}{eol}"));
        }

        // Candidates
        for candidate in &self.candidates {
            sdp.push_str(&format!("{candidate}{eol}"));
        }
        if self.ended {
            sdp.push_str(&format!("a=end-of-candidates{eol}"));
        }

        sdp
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.generate_sdp("\r\n"))
    }
}

/// Wire form exchanged over the signaling channel.
#[derive(Serialize, Deserialize)]
struct SignalingDescription {
    #[serde(rename = "type")]
    sdp_type: SdpType,
    sdp: String,
}

impl Serialize for SessionDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SignalingDescription {
            sdp_type: self.sdp_type,
            sdp: self.generate_sdp("\r\n"),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionDescription {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = SignalingDescription::deserialize(deserializer)?;
        SessionDescription::new(&raw.sdp, raw.sdp_type, SetupRole::ActPass)
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DATA_OFFER: &str = "v=0\r\n\
                              o=- 42 0 IN IP4 0.0.0.0\r\n\
                              s=-\r\n\
                              t=0 0\r\n\
                              m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
                              a=mid:data\r\n\
                              a=sctp-port:5000\r\n";

    #[test]
    fn test_parse_data_offer() {
        let description = SessionDescription::from_type_string(DATA_OFFER, "offer").unwrap();

        assert_eq!(description.sdp_type(), SdpType::Offer);
        assert_eq!(description.role(), SetupRole::ActPass);
        assert_eq!(description.data_mid(), "data");
        assert_eq!(description.sctp_port(), Some(5000));
        assert!(!description.has_media());
    }

    #[test]
    fn test_parse_answer_demotes_role() {
        let description = SessionDescription::from_type_string(DATA_OFFER, "answer").unwrap();

        assert_eq!(description.sdp_type(), SdpType::Answer);
        assert_eq!(description.role(), SetupRole::Passive);
    }

    #[test]
    fn test_parse_answer_keeps_explicit_role() {
        let sdp = format!("{DATA_OFFER}a=setup:active\r\n");
        let description = SessionDescription::answer(&sdp).unwrap();

        assert_eq!(description.role(), SetupRole::Active);
    }

    #[test]
    fn test_parse_fingerprint_uppercased() {
        let sdp = format!("{DATA_OFFER}a=fingerprint:sha-256 ab:cd:ef\r\n");
        let description = SessionDescription::offer(&sdp).unwrap();

        assert_eq!(description.fingerprint(), Some("AB:CD:EF"));
    }

    #[test]
    fn test_parse_rejects_unknown_fingerprint_hash() {
        let sdp = format!("{DATA_OFFER}a=fingerprint:sha-1 ab:cd:ef\r\n");
        let description = SessionDescription::offer(&sdp).unwrap();

        assert_eq!(description.fingerprint(), None);
    }

    #[test]
    fn test_parse_malformed_sctp_port() {
        let sdp = "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
                   a=mid:data\r\n\
                   a=sctp-port:junk\r\n";
        assert!(SessionDescription::offer(sdp).is_err());
    }

    #[test]
    fn test_parse_media_without_mid_is_discarded() {
        let sdp = "v=0\r\n\
                   m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
                   a=rtpmap:111 opus/48000/2\r\n\
                   m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
                   a=mid:data\r\n";
        let description = SessionDescription::offer(sdp).unwrap();

        assert!(!description.has_media());
        assert_eq!(description.data_mid(), "data");
    }

    #[test]
    fn test_parse_application_section_adopts_mid() {
        let sdp = "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
                   a=mid:channel\r\n";
        let description = SessionDescription::offer(sdp).unwrap();

        assert_eq!(description.data_mid(), "channel");
        assert_eq!(description.bundle_mid(), "channel");
    }

    #[test]
    fn test_parse_media_splitting() {
        let media = Media::from_mline("audio 9 UDP/TLS/RTP/SAVPF 111 103");
        assert_eq!(media.kind, "audio");
        assert_eq!(media.description, "UDP/TLS/RTP/SAVPF 111 103");

        let media = Media::from_mline("audio");
        assert_eq!(media.kind, "audio");
        assert_eq!(media.description, "");

        let media = Media::from_mline("audio 9");
        assert_eq!(media.kind, "audio");
        assert_eq!(media.description, "");
    }

    #[test]
    fn test_hint_type_is_idempotent() {
        let mut description = SessionDescription::offer(DATA_OFFER).unwrap();
        assert_eq!(description.sdp_type(), SdpType::Offer);

        description.hint_type(SdpType::Answer);
        assert_eq!(description.sdp_type(), SdpType::Offer);
        assert_eq!(description.role(), SetupRole::ActPass);
    }

    #[test]
    fn test_extract_candidates_resets_ended() {
        let sdp = format!(
            "{DATA_OFFER}a=candidate:1 1 UDP 2122260223 192.168.1.7 51810 typ host\r\n\
             a=end-of-candidates\r\n"
        );
        let mut description = SessionDescription::offer(&sdp).unwrap();
        assert!(description.ended());
        assert_eq!(description.candidates().len(), 1);

        let extracted = description.extract_candidates();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].mid(), "data");
        assert!(description.candidates().is_empty());
        assert!(!description.ended());
    }

    #[test]
    fn test_candidate_without_media_owned_by_data_mid() {
        let sdp = "a=candidate:1 1 UDP 2122260223 192.168.1.7 51810 typ host\r\n";
        let description = SessionDescription::offer(sdp).unwrap();

        assert_eq!(description.candidates().len(), 1);
        assert_eq!(description.candidates()[0].mid(), "data");
    }

    #[test]
    fn test_generate_data_sdp_contains_session_attributes() {
        let mut description = SessionDescription::offer(DATA_OFFER).unwrap();
        description.set_fingerprint("AB:CD".to_owned());

        let sdp = description.generate_data_sdp("\r\n");
        let lines: Vec<&str> = sdp.lines().collect();

        assert!(lines.contains(&"m=application 9 UDP/DTLS/SCTP webrtc-datachannel"));
        assert!(lines.contains(&"a=mid:data"));
        assert!(lines.contains(&"a=setup:actpass"));
        assert!(lines.contains(&"a=fingerprint:sha-256 AB:CD"));
        assert!(!sdp.contains("a=group:BUNDLE"));
    }
}
