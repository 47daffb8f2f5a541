//! NATS subscriber for train/predict commands

use anyhow::Result;
use async_nats::{Client, Message};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::info;

/// Operation requested by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Train,
    Predict,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Train => "train",
            Command::Predict => "predict",
        }
    }
}

/// Consumer for command requests arriving over NATS
pub struct CommandConsumer {
    client: Client,
    train_subject: String,
    predict_subject: String,
}

impl CommandConsumer {
    pub fn new(client: Client, train_subject: &str, predict_subject: &str) -> Self {
        Self {
            client,
            train_subject: train_subject.to_string(),
            predict_subject: predict_subject.to_string(),
        }
    }

    /// Subscribe to both command subjects as one tagged stream
    pub async fn subscribe(&self) -> Result<BoxStream<'static, (Command, Message)>> {
        let train = self.client.subscribe(self.train_subject.clone()).await?;
        info!(subject = %self.train_subject, "Subscribed to train subject");

        let predict = self.client.subscribe(self.predict_subject.clone()).await?;
        info!(subject = %self.predict_subject, "Subscribed to predict subject");

        Ok(stream::select(
            train.map(|m| (Command::Train, m)),
            predict.map(|m| (Command::Predict, m)),
        )
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Train.name(), "train");
        assert_eq!(Command::Predict.name(), "predict");
    }

    // Subscription tests would require a running NATS server
}
