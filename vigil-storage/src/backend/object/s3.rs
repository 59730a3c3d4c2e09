/// S3 and S3-compatible object client
///
/// The SDK is async; calls are driven to completion on a private runtime so
/// the storage contract stays blocking.
use super::ObjectClient;
use anyhow::{Context, Result};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::future::Future;
use tokio::runtime::Runtime;
use tracing::debug;
use vigil_core::{ObjectStoreConfig, VigilError, VigilResult};

/// S3 rejects copied parts smaller than this unless they are the last part
pub const MIN_PART_SIZE: i64 = 5 * 1024 * 1024;

pub struct S3Client {
    runtime: Runtime,
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Client {
    pub fn new(config: &ObjectStoreConfig) -> VigilResult<Self> {
        let bucket = config.bucket.clone().ok_or_else(|| {
            VigilError::Configuration("object storage requires storage.object.bucket".to_string())
        })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VigilError::Configuration(format!("Failed to start S3 runtime: {}", e)))?;

        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let client = runtime.block_on(async move {
            let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(Region::new(region))
                .load()
                .await;

            let mut builder = aws_sdk_s3::config::Builder::from(&shared);
            // Use custom endpoint if provided (for S3-compatible services)
            if let Some(endpoint_url) = endpoint {
                builder = builder.endpoint_url(endpoint_url).force_path_style(true);
            }
            Client::from_conf(builder.build())
        });

        Ok(Self {
            runtime,
            client,
            bucket,
            prefix: config.prefix.clone(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                key.trim_start_matches('/')
            ),
            None => key.to_string(),
        }
    }

    fn strip_prefix(&self, full_key: &str) -> Option<String> {
        match &self.prefix {
            Some(prefix) => full_key
                .strip_prefix(prefix.trim_end_matches('/'))
                .and_then(|rest| rest.strip_prefix('/'))
                .map(str::to_string),
            None => Some(full_key.to_string()),
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn size_of(&self, full_key: &str) -> Result<i64> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(full_key)
            .send()
            .await
            .with_context(|| format!("Failed to stat {}", full_key))?;
        Ok(response.content_length.unwrap_or(0))
    }

    async fn multipart_copy(&self, target: &str, sources: &[String]) -> Result<String> {
        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(target)
            .send()
            .await
            .context("Failed to start multipart upload")?;
        let upload_id = upload
            .upload_id
            .context("Multipart upload returned no upload id")?;

        let mut parts = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            let part_number = i as i32 + 1;
            let copied = self
                .client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(target)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(format!("{}/{}", self.bucket, source))
                .send()
                .await;

            let copied = match copied {
                Ok(copied) => copied,
                Err(e) => {
                    self.abort(target, &upload_id).await;
                    return Err(e).with_context(|| format!("Failed to copy part {}", source));
                }
            };
            let etag = copied.copy_part_result.and_then(|r| r.e_tag);
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(etag)
                    .part_number(part_number)
                    .build(),
            );
        }

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(target)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;

        match completed {
            Ok(response) => Ok(response.e_tag.unwrap_or_default()),
            Err(e) => {
                self.abort(target, &upload_id).await;
                Err(e).context("Failed to complete multipart upload")
            }
        }
    }

    async fn abort(&self, target: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(target)
            .upload_id(upload_id)
            .send()
            .await
        {
            debug!("Failed to abort multipart upload of {}: {}", target, e);
        }
    }

    async fn get_full(&self, full_key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(full_key)
            .send()
            .await
            .with_context(|| format!("Failed to get {}", full_key))?;
        let body = response
            .body
            .collect()
            .await
            .context("Failed to read object body")?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put_full(&self, full_key: &str, body: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(full_key)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to put {}", full_key))?;
        Ok(response.e_tag.unwrap_or_default())
    }
}

impl ObjectClient for S3Client {
    fn head(&self, name: &str) -> Result<Option<String>> {
        let full_key = self.full_key(name);
        self.block_on(async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&full_key)
                .send()
                .await
            {
                Ok(response) => Ok(Some(response.e_tag.unwrap_or_default())),
                Err(e) => {
                    let service_error = e.into_service_error();
                    if service_error.is_not_found() {
                        Ok(None)
                    } else {
                        Err(anyhow::anyhow!(
                            "Failed to check object existence: {}",
                            service_error
                        ))
                    }
                }
            }
        })
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let full_key = self.full_key(name);
        self.block_on(self.get_full(&full_key))
    }

    fn put(&self, name: &str, body: Vec<u8>) -> Result<String> {
        let full_key = self.full_key(name);
        self.block_on(self.put_full(&full_key, body))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let full_key = self.full_key(name);
        self.block_on(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&full_key)
                .send()
                .await
                .context("Failed to delete object from S3")?;
            Ok(())
        })
    }

    /// Server-side multipart copy. When a leading source is under the
    /// minimum part size the parts are concatenated client-side instead.
    fn compose(&self, target: &str, sources: Vec<String>) -> Result<String> {
        let target = self.full_key(target);
        let sources: Vec<String> = sources.iter().map(|s| self.full_key(s)).collect();

        self.block_on(async {
            let mut small_leading_part = false;
            for source in sources.iter().take(sources.len().saturating_sub(1)) {
                if self.size_of(source).await? < MIN_PART_SIZE {
                    small_leading_part = true;
                    break;
                }
            }

            if small_leading_part {
                debug!("Composing {} client-side from {} parts", target, sources.len());
                let mut body = Vec::new();
                for source in &sources {
                    body.extend(self.get_full(source).await?);
                }
                return self.put_full(&target, body).await;
            }

            self.multipart_copy(&target, &sources).await
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        self.block_on(async {
            let mut names = Vec::new();
            let mut continuation_token = None;

            loop {
                let mut request = self.client.list_objects_v2().bucket(&self.bucket);

                if let Some(prefix) = &self.prefix {
                    request = request.prefix(format!("{}/", prefix.trim_end_matches('/')));
                }

                if let Some(token) = continuation_token {
                    request = request.continuation_token(token);
                }

                let response = request
                    .send()
                    .await
                    .context("Failed to list S3 objects")?;

                if let Some(contents) = response.contents {
                    for object in contents {
                        if let Some(name) = object.key.and_then(|k| self.strip_prefix(&k)) {
                            names.push(name);
                        }
                    }
                }

                if response.is_truncated.unwrap_or(false) {
                    continuation_token = response.next_continuation_token;
                } else {
                    break;
                }
            }

            Ok(names)
        })
    }
}
