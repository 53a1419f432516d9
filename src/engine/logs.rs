//! Buffered log retrieval.

use bollard::container::LogOutput;
use bollard::query_parameters::LogsOptionsBuilder;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::error_classification::engine_message;
use super::{ContainerHandle, EngineApi, EngineClient, Output};
use crate::error::{ContainerError, Result};

impl<C: EngineApi> EngineClient<C> {
    /// Copy the container's stdout and stderr, as buffered so far, to
    /// `output`. The log is not followed.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::LogsFailed` when the engine stream fails or
    /// `output` cannot be written.
    pub async fn stream_logs(&self, container: &ContainerHandle, output: Output<'_>) -> Result<()> {
        let logs_failed = |message: String| ContainerError::LogsFailed {
            container_id: container.id.clone(),
            message,
        };

        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .follow(false)
            .build();
        let mut stream = self.api.logs(&container.id, Some(options));

        while let Some(chunk) = stream.next().await {
            let log = chunk.map_err(|e| logs_failed(engine_message(&e)))?;
            output
                .write_all(log_bytes(&log))
                .await
                .map_err(|e| logs_failed(e.to_string()))?;
        }
        output
            .flush()
            .await
            .map_err(|e| logs_failed(e.to_string()))?;
        Ok(())
    }
}

fn log_bytes(log: &LogOutput) -> &[u8] {
    match log {
        LogOutput::StdErr { message }
        | LogOutput::StdOut { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => message.as_ref(),
    }
}
