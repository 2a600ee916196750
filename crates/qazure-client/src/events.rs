//! Client lifecycle events.

use std::time::Duration;

use serde::Serialize;

/// Event broadcast by [`AzureClient`](crate::AzureClient).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A connect attempt finished, successfully or not.
    Connected {
        /// `"success"` or the error name.
        status: String,
        /// Wall-clock time of the attempt.
        #[serde(with = "duration_ms")]
        duration: Duration,
        /// Credential type used.
        credential: String,
        /// Deployment environment.
        environment: String,
        /// Number of valid targets found.
        targets: usize,
    },
    /// A job was created.
    JobSubmitted {
        /// Job id.
        job_id: String,
        /// Target id.
        target: String,
    },
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_serializes_duration_in_ms() {
        let event = ClientEvent::Connected {
            status: "success".into(),
            duration: Duration::from_millis(1500),
            credential: "Default".into(),
            environment: "mock".into(),
            targets: 6,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "connected");
        assert_eq!(json["duration"], 1500);
        assert_eq!(json["targets"], 6);
    }
}
