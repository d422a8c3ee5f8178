use crate::*;

/// Frame marker for serialized ciphertexts
pub const FRAME_MAGIC: &[u8; 4] = b"HTC1";

const HEADER_SIZE: usize = FRAME_MAGIC.len() + ContextId::LEN;

/// A serialized ciphertext tagged with the parameters it belongs to.
///
/// Layout: `magic (4) || context id (32) || backend ciphertext bytes`. Carried
/// as base64 text on the ledger and at the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CiphertextFrame {
    pub context_id: ContextId,
    pub body: Vec<u8>,
}

impl CiphertextFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.body.len());
        bytes.extend_from_slice(FRAME_MAGIC);
        bytes.extend_from_slice(self.context_id.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() <= HEADER_SIZE {
            return Err(Error::Decode(format!(
                "frame of {} bytes is too short",
                bytes.len()
            )));
        }
        if &bytes[..FRAME_MAGIC.len()] != FRAME_MAGIC {
            return Err(Error::Decode("bad frame marker".to_owned()));
        }

        // Length is checked above
        let context_id = ContextId::from_slice(&bytes[FRAME_MAGIC.len()..HEADER_SIZE])
            .ok_or_else(|| Error::Decode("bad context id".to_owned()))?;

        Ok(CiphertextFrame {
            context_id,
            body: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        base64::encode(&self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let bytes = base64::decode(encoded.trim())?;
        CiphertextFrame::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = CiphertextFrame {
            context_id: ContextId::of(b"params", b"key"),
            body: vec![1, 2, 3],
        };
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[..4], b"HTC1");
        assert_eq!(bytes.len(), 4 + 32 + 3);
        assert_eq!(CiphertextFrame::from_bytes(&bytes).unwrap(), frame);
        assert_eq!(CiphertextFrame::from_base64(&frame.to_base64()).unwrap(), frame);
    }

    #[test]
    fn test_frame_rejects_malformed() {
        assert!(matches!(
            CiphertextFrame::from_base64("!!not base64!!"),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            CiphertextFrame::from_bytes(b"HTC1"),
            Err(Error::Decode(_))
        ));

        let mut bytes = CiphertextFrame {
            context_id: ContextId::of(b"params", b"key"),
            body: vec![7],
        }
        .to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            CiphertextFrame::from_bytes(&bytes),
            Err(Error::Decode(_))
        ));
    }
}
