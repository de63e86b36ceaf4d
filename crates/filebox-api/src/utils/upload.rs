//! Common utilities for multipart upload handlers

use crate::constants::UPLOAD_FIELD;
use crate::error::HttpAppError;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use bytes::Bytes;
use filebox_core::AppError;
use filebox_storage::{ObjectKey, Storage};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

/// Read the whole `file` field into memory. Used for payloads the vision API
/// needs in one piece; stored uploads go through [`store_field`] instead.
pub async fn read_file_field(mut multipart: Multipart) -> Result<Bytes, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            break;
        }
        return Ok(data);
    }

    Err(AppError::InvalidInput("No file uploaded.".to_string()).into())
}

/// Stream a multipart field into storage under `key`.
///
/// When the client side of the stream fails (disconnect, body limit), that
/// error is reported instead of the storage error it caused.
pub async fn store_field(
    storage: &dyn Storage,
    key: &ObjectKey,
    field: Field<'_>,
) -> Result<(), HttpAppError> {
    let mut read_error: Option<MultipartError> = None;

    let saved = {
        let stream = field.map_err(|e| {
            let io_err = std::io::Error::other(e.body_text());
            if read_error.is_none() {
                read_error = Some(e);
            }
            io_err
        });
        let mut reader = StreamReader::new(Box::pin(stream));
        storage.save(key, &mut reader).await
    };

    match (saved, read_error) {
        (Ok(()), _) => Ok(()),
        (Err(_), Some(client_err)) => Err(client_err.into()),
        (Err(storage_err), None) => Err(storage_err.into()),
    }
}
