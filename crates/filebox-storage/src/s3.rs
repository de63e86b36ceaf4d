use crate::keys::ObjectKey;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::ReaderStream;

/// Objects up to this size go up in a single PutObject; larger ones use a
/// multipart upload with parts of this size.
const PART_SIZE: usize = 8 * 1024 * 1024;

/// S3 storage implementation
///
/// One SDK client (and its connection pool) is shared by every operation.
#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
}

/// Render an SDK error with its full cause chain.
fn sdk_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    DisplayErrorContext(err).to_string()
}

/// Fill `buf` from `reader`, stopping early only at EOF.
async fn read_part(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Builds the client only; nothing is sent until the first operation.
    ///
    /// # Arguments
    /// * `bucket` - Container name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        if bucket.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "Container name must not be empty".to_string(),
            ));
        }

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

        // Retries are the caller's decision.
        let retry_config = RetryConfig::disabled();

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            // S3-compatible providers generally need path-style addressing
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        tracing::debug!(
            bucket = %bucket,
            region = %region,
            endpoint = ?endpoint_url,
            "S3 client configured"
        );

        Ok(S3Storage {
            client,
            bucket,
            region,
        })
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "S3 bucket created");
                Ok(())
            }
            Err(SdkError::ServiceError(service_err))
                if matches!(
                    service_err.err(),
                    CreateBucketError::BucketAlreadyOwnedByYou(_)
                ) =>
            {
                Ok(())
            }
            Err(e) => {
                let message = sdk_message(&e);
                tracing::error!(
                    error = %message,
                    bucket = %self.bucket,
                    "Failed to create S3 bucket"
                );
                Err(StorageError::InitializeFailed(message))
            }
        }
    }

    async fn put_single(&self, key: &ObjectKey, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(S3Body::from(data))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(sdk_message(&e)))?;
        Ok(())
    }

    /// Upload `first` and the rest of `reader` as a multipart upload.
    /// Returns the total size and number of parts.
    async fn put_multipart(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        first: Bytes,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        buf: &mut [u8],
    ) -> StorageResult<(u64, i32)> {
        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut total_size = 0u64;
        let mut next = Some(first);

        while let Some(data) = next.take() {
            total_size += data.len() as u64;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key.as_str())
                .upload_id(upload_id)
                .part_number(part_number)
                .body(S3Body::from(data))
                .send()
                .await
                .map_err(|e| {
                    let message = sdk_message(&e);
                    tracing::error!(
                        error = %message,
                        bucket = %self.bucket,
                        key = %key,
                        part_number = part_number,
                        "Failed to upload part"
                    );
                    StorageError::UploadFailed(message)
                })?;

            let etag = output.e_tag().ok_or_else(|| {
                StorageError::UploadFailed(format!("No ETag returned for part {}", part_number))
            })?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );
            part_number += 1;

            let n = read_part(reader, buf).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
            })?;
            if n > 0 {
                next = Some(Bytes::copy_from_slice(&buf[..n]));
            }
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(sdk_message(&e)))?;

        Ok((total_size, part_number - 1))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn initialize(&self) -> StorageResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "S3 bucket already exists");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    error = %sdk_message(&e),
                    bucket = %self.bucket,
                    "HeadBucket failed, attempting to create bucket"
                );
                self.create_bucket().await
            }
        }
    }

    async fn list_names(&self) -> StorageResult<Vec<ObjectKey>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                let message = sdk_message(&e);
                tracing::error!(error = %message, bucket = %self.bucket, "S3 list failed");
                StorageError::ListFailed(message)
            })?;

            for object in page.contents() {
                let Some(raw) = object.key() else { continue };
                match ObjectKey::parse(raw) {
                    Ok(key) => names.push(key),
                    Err(_) => {
                        tracing::debug!(
                            bucket = %self.bucket,
                            key = %raw,
                            "Skipping object that is not a valid key"
                        );
                    }
                }
            }
        }

        Ok(names)
    }

    async fn save(
        &self,
        key: &ObjectKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let mut buf = vec![0u8; PART_SIZE];

        let n = read_part(reader, &mut buf).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        if n < PART_SIZE {
            self.put_single(key, Bytes::copy_from_slice(&buf[..n]))
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %key,
                        size_bytes = n,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 upload failed"
                    );
                })?;

            tracing::info!(
                bucket = %self.bucket,
                key = %key,
                size_bytes = n,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload successful"
            );
            return Ok(());
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(sdk_message(&e)))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned from S3".to_string()))?
            .to_string();

        let first = Bytes::copy_from_slice(&buf[..n]);
        match self
            .put_multipart(key, &upload_id, first, reader, &mut buf)
            .await
        {
            Ok((size, parts)) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    parts = parts,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 multipart upload successful"
                );
                Ok(())
            }
            Err(e) => {
                // Leave no orphaned parts behind; the old object stays intact.
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key.as_str())
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        error = %sdk_message(&abort_err),
                        bucket = %self.bucket,
                        key = %key,
                        "Failed to abort multipart upload"
                    );
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 multipart upload failed"
                );
                Err(e)
            }
        }
    }

    async fn load(&self, key: &ObjectKey) -> StorageResult<ByteStream> {
        let start = std::time::Instant::now();

        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
                {
                    StorageError::NotFound(key.to_string())
                }
                _ => StorageError::DownloadFailed(sdk_message(&e)),
            })?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    StorageError::NotFound(key.to_string())
                }
                _ => {
                    let message = sdk_message(&e);
                    tracing::error!(
                        error = %message,
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    StorageError::DownloadFailed(message)
                }
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = ?response.content_length(),
            "S3 download stream opened"
        );

        let stream = ReaderStream::new(response.body.into_async_read()).map(|chunk| {
            chunk.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_part_fills_buffer_across_short_reads() {
        let data: Vec<u8> = (0..100u8).collect();
        // chain() yields the two halves as separate reads
        let mut reader = std::io::Cursor::new(data[..30].to_vec()).chain(std::io::Cursor::new(
            data[30..].to_vec(),
        ));
        let mut buf = vec![0u8; 64];

        let n = read_part(&mut reader, &mut buf).await.unwrap();
        assert_eq!(n, 64);
        assert_eq!(&buf[..], &data[..64]);

        let n = read_part(&mut reader, &mut buf).await.unwrap();
        assert_eq!(n, 36);
        assert_eq!(&buf[..n], &data[64..]);

        assert_eq!(read_part(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_new_rejects_empty_bucket() {
        let result = S3Storage::new(
            "  ".to_string(),
            "us-east-1".to_string(),
            Some("http://127.0.0.1:9".to_string()),
        )
        .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_initialize() {
        // Port 9 (discard) is closed on test hosts, so the connect fails fast.
        std::env::set_var("AWS_ACCESS_KEY_ID", "test");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "test");
        let storage = S3Storage::new(
            "filebox-test".to_string(),
            "us-east-1".to_string(),
            Some("http://127.0.0.1:9".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(storage.backend_type(), StorageBackend::S3);
        assert!(matches!(
            storage.initialize().await,
            Err(StorageError::InitializeFailed(_))
        ));
    }
}
