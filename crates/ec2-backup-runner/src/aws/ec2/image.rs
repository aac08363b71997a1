//! Machine image lifecycle operations

use super::types::{ImageRequest, image_from_sdk, tags_to_sdk};
use super::{Ec2Client, OWNER_SELF, retry_throttled};
use crate::aws::error::classify_anyhow_error;
use crate::wait::{WaitOutcome, WaitPolicy, poll_until_ready};
use anyhow::{Context, Result};
use aws_sdk_ec2::operation::describe_images::DescribeImagesOutput;
use aws_sdk_ec2::types::{self as sdk, ImageState};
use ec2_backup_common::{Image, ResourceTag};
use tracing::{debug, info};

impl Ec2Client {
    /// Create an image of an instance and return its id
    pub async fn create_image(&self, request: &ImageRequest) -> Result<String> {
        info!(
            instance_id = %request.instance_id,
            name = %request.name,
            no_reboot = request.no_reboot,
            "Creating image"
        );

        let response = retry_throttled("CreateImage", || async {
            self.client
                .create_image()
                .instance_id(&request.instance_id)
                .name(&request.name)
                .description(&request.description)
                .no_reboot(request.no_reboot)
                .send()
                .await
                .with_context(|| {
                    format!("Failed to create image of instance {}", request.instance_id)
                })
        })
        .await?;

        let image_id = response
            .image_id()
            .context("No image ID returned")?
            .to_string();

        Ok(image_id)
    }

    /// Attach tags to any EC2 resource
    pub async fn tag_resource(&self, resource_id: &str, tags: &[ResourceTag]) -> Result<()> {
        let sdk_tags = tags_to_sdk(tags);

        retry_throttled("CreateTags", || async {
            self.client
                .create_tags()
                .resources(resource_id)
                .set_tags(Some(sdk_tags.clone()))
                .send()
                .await
                .with_context(|| format!("Failed to tag resource {}", resource_id))
        })
        .await?;

        debug!(resource_id = %resource_id, count = tags.len(), "Tagged resource");
        Ok(())
    }

    /// List all images owned by the calling account
    pub async fn list_images(&self) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page =
                retry_throttled("DescribeImages", || self.describe_images_page(next_token.clone()))
                    .await?;

            images.extend(page.images().iter().filter_map(image_from_sdk));

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = images.len(), "Found owned images");
        Ok(images)
    }

    async fn describe_images_page(&self, next_token: Option<String>) -> Result<DescribeImagesOutput> {
        self.client
            .describe_images()
            .owners(OWNER_SELF)
            .set_next_token(next_token)
            .send()
            .await
            .context("Failed to describe images")
    }

    /// Deregister an image. Attempted once, never retried.
    pub async fn deregister_image(&self, image_id: &str) -> Result<()> {
        self.client
            .deregister_image()
            .image_id(image_id)
            .send()
            .await
            .with_context(|| format!("Failed to deregister image {}", image_id))?;

        Ok(())
    }

    /// Poll until every image is `available`.
    ///
    /// An image that is not yet visible counts as not ready. An image that
    /// reaches a terminal failure state ends the wait with an error.
    pub async fn wait_for_images(
        &self,
        image_ids: &[String],
        policy: WaitPolicy,
    ) -> Result<WaitOutcome> {
        poll_until_ready(
            policy.delay(),
            policy.max_attempts,
            || async {
                let response = self
                    .client
                    .describe_images()
                    .set_image_ids(Some(image_ids.to_vec()))
                    .send()
                    .await
                    .context("Failed to describe images");

                let response = match response {
                    Ok(r) => r,
                    Err(e) if classify_anyhow_error(&e).is_not_found() => return Ok(false),
                    Err(e) => return Err(e),
                };

                images_ready(response.images(), image_ids.len())
            },
            &format!("images {}", image_ids.join(",")),
        )
        .await
    }
}

/// Readiness of one describe response: `Ok(true)` once all `expected`
/// images are `available`, an error if any reached a terminal failure state.
fn images_ready(images: &[sdk::Image], expected: usize) -> Result<bool> {
    if images.len() < expected {
        return Ok(false);
    }

    for image in images {
        match image.state() {
            Some(ImageState::Available) => {}
            Some(
                state @ (ImageState::Failed
                | ImageState::Error
                | ImageState::Invalid
                | ImageState::Deregistered),
            ) => {
                anyhow::bail!(
                    "Image {} entered state {}",
                    image.image_id().unwrap_or("unknown"),
                    state.as_str()
                );
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}
