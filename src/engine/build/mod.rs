//! Image builds from a local context directory.

mod archive;


use bollard::models::BuildInfo;
use bollard::query_parameters::BuildImageOptionsBuilder;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::error_classification::engine_message;
use super::{EngineApi, EngineClient, Output};
use crate::error::{ContainerError, FilesystemError, Result};

use archive::build_context_archive;

impl<C: EngineApi> EngineClient<C> {
    /// Build and tag `image` from the directory at `context`.
    ///
    /// The context is packed into a tar archive (without the root `.git`) and sent to
    /// the engine; build progress text is copied to `output` as it arrives.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` when the context cannot be read and
    /// `ContainerError::BuildFailed` when the engine reports a build error.
    pub async fn build_image(
        &self,
        image: &str,
        context: &Utf8Path,
        output: Output<'_>,
    ) -> Result<()> {
        let build_failed = |message: String| ContainerError::BuildFailed {
            image: String::from(image),
            message,
        };

        let archive = read_context(context)?;
        info!(image, context = %context, bytes = archive.len(), "building image");

        let options = BuildImageOptionsBuilder::new().t(image).rm(true).build();
        let mut stream = self.api.build_image(options, archive);

        while let Some(item) = stream.next().await {
            let progress = item.map_err(|e| build_failed(engine_message(&e)))?;
            if let Some(message) = build_error(&progress) {
                return Err(build_failed(message).into());
            }
            if let Some(text) = progress.stream.as_deref() {
                output
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| build_failed(e.to_string()))?;
            }
        }
        output
            .flush()
            .await
            .map_err(|e| build_failed(e.to_string()))?;
        info!(image, "image built");
        Ok(())
    }
}

fn read_context(context: &Utf8Path) -> Result<Vec<u8>> {
    let filesystem_error = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::NotFound => FilesystemError::NotFound {
            path: context.as_std_path().to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => FilesystemError::PermissionDenied {
            path: context.as_std_path().to_path_buf(),
        },
        _ => FilesystemError::IoError {
            path: context.as_std_path().to_path_buf(),
            message: e.to_string(),
        },
    };

    let dir = Dir::open_ambient_dir(context, ambient_authority()).map_err(filesystem_error)?;
    let archive = build_context_archive(&dir).map_err(filesystem_error)?;
    Ok(archive)
}

fn build_error(progress: &BuildInfo) -> Option<String> {
    progress
        .error_detail
        .as_ref()
        .and_then(|detail| detail.message.clone())
}
