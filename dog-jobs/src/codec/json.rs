use crate::codec::{Envelope, JobCodec};
use crate::{QueueError, QueueResult};

/// JSON envelope codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JobCodec for JsonCodec {
    fn encode_envelope(&self, envelope: &Envelope) -> QueueResult<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    fn decode_envelope(&self, bytes: &[u8]) -> QueueResult<Envelope> {
        serde_json::from_slice(bytes).map_err(|e| QueueError::EnvelopeMalformed(e.to_string()))
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Job;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CreateLog {
        loggable_id: i64,
        action: String,
        tags: Vec<String>,
    }

    impl Job for CreateLog {
        const JOB_TYPE: &'static str = "log:create";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ProcessData {
        batch: u32,
    }

    impl Job for ProcessData {
        const JOB_TYPE: &'static str = "data:process";
    }

    #[test]
    fn test_wire_shape() {
        let job = CreateLog {
            loggable_id: 42,
            action: "UPDATED".to_string(),
            tags: vec![],
        };

        let bytes = JsonCodec.encode(&job).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["type"], "log:create");
        assert_eq!(value["data"]["loggable_id"], 42);
        assert_eq!(value["data"]["action"], "UPDATED");
    }

    #[test]
    fn test_malformed_envelope() {
        let err = JsonCodec.decode_envelope(b"not json").unwrap_err();
        assert!(matches!(err, QueueError::EnvelopeMalformed(_)));

        let err = JsonCodec.decode_envelope(br#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, QueueError::EnvelopeMalformed(_)));

        let err = JsonCodec.decode_envelope(br#"{"type": "log:create"}"#).unwrap_err();
        assert!(matches!(err, QueueError::EnvelopeMalformed(_)));
    }

    #[test]
    fn test_payload_mismatch() {
        let bytes = JsonCodec.encode(&ProcessData { batch: 7 }).unwrap();
        let err = JsonCodec.decode::<CreateLog>(&bytes).unwrap_err();

        match err {
            QueueError::PayloadMismatch { job_type, .. } => assert_eq!(job_type, "data:process"),
            other => panic!("expected payload mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_codec_id() {
        assert_eq!(JsonCodec.codec_id(), "json");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            loggable_id in any::<i64>(),
            action in ".*",
            tags in proptest::collection::vec("[a-z:]{0,12}", 0..4),
        ) {
            let job = CreateLog { loggable_id, action, tags };
            let bytes = JsonCodec.encode(&job).unwrap();
            let decoded: CreateLog = JsonCodec.decode(&bytes).unwrap();
            prop_assert_eq!(decoded, job);
        }
    }
}
