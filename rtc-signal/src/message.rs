use bytes::Bytes;

/// A decoded message exchanged with the remote endpoint.
///
/// Text and binary messages are delivered to the receive queue. Control
/// frames (ping, pong, close) are consumed by the WebSocket transport layer
/// and never reach the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    String(String),
    Binary(Bytes),
    Control(Bytes),
}

impl Message {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Message::String(s) => s.len(),
            Message::Binary(b) => b.len(),
            Message::Control(b) => b.len(),
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Message::Control(_))
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::String(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(Bytes::from(data))
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Message::Binary(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_message_size() {
        let tests = vec![
            (Message::from("hello"), 5),
            (Message::from(String::new()), 0),
            (Message::from(vec![0u8; 16]), 16),
            (Message::Control(Bytes::from_static(&[0x89, 0x00])), 2),
        ];

        for (message, expected_size) in tests {
            assert_eq!(message.size(), expected_size, "testCase: {message:?}");
        }
    }

    #[test]
    fn test_message_is_control() {
        assert!(Message::Control(Bytes::new()).is_control());
        assert!(!Message::from("ping").is_control());
        assert!(!Message::from(vec![1, 2, 3]).is_control());
    }
}
