//! NATS reply publisher for command results

use crate::error::{PredictionError, TrainingError};
use crate::models::trainer::TrainingReport;
use crate::types::prediction::PredictionOutput;
use anyhow::Result;
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::{debug, warn};

/// Reply envelope sent back to the requester
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResponse {
    Ok { result: serde_json::Value },
    Error { kind: String, message: String },
}

impl CommandResponse {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        CommandResponse::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn from_training(result: Result<TrainingReport, TrainingError>) -> Self {
        match result {
            Ok(report) => Self::ok(&report),
            Err(e) if e.is_no_data() => Self::error("no_data", e.to_string()),
            Err(e) => Self::error("training_failed", e.to_string()),
        }
    }

    pub fn from_prediction(result: Result<PredictionOutput, PredictionError>) -> Self {
        match result {
            Ok(output) => Self::ok(&output),
            Err(e) if e.is_model_not_found() => Self::error("model_not_found", e.to_string()),
            Err(PredictionError::Features(e)) => Self::error("invalid_features", e.to_string()),
            Err(e) => Self::error("prediction_failed", e.to_string()),
        }
    }

    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => CommandResponse::Ok { result },
            Err(e) => Self::error("encode_failed", e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandResponse::Ok { .. })
    }
}

/// Producer for publishing command replies to NATS
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish `response` on the request's reply subject, if it has one
    pub async fn reply(&self, request: &Message, response: &CommandResponse) -> Result<()> {
        let Some(reply) = request.reply.clone() else {
            warn!(subject = %request.subject, "Request has no reply subject, dropping response");
            return Ok(());
        };

        let payload = serde_json::to_vec(response)?;
        self.client.publish(reply.clone(), payload.into()).await?;

        debug!(
            reply = %reply,
            ok = response.is_ok(),
            "Published command reply"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArtifactError;
    use serde_json::json;

    #[test]
    fn test_no_data_envelope() {
        let response = CommandResponse::from_training(Err(TrainingError::NoData));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "no_data");
        assert!(!response.is_ok());
    }

    #[test]
    fn test_model_not_found_envelope() {
        let err: PredictionError = ArtifactError::NotFound("models/x.json".into()).into();
        let value = serde_json::to_value(CommandResponse::from_prediction(Err(err))).unwrap();
        assert_eq!(value["kind"], "model_not_found");
    }

    #[test]
    fn test_ok_envelope_wraps_result() {
        let response = CommandResponse::from_prediction(Ok(PredictionOutput::empty()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "ok",
                "result": { "model_id": null, "flagged": [], "all": [] }
            })
        );
    }

    // Publishing tests would require a running NATS server
}
