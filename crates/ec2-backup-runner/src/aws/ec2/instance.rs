//! Backup candidate discovery

use super::types::instance_from_sdk;
use super::{Ec2Client, retry_throttled};
use anyhow::{Context, Result};
use aws_sdk_ec2::operation::describe_instances::DescribeInstancesOutput;
use aws_sdk_ec2::types::Filter;
use ec2_backup_common::Instance;
use ec2_backup_common::resources::INSTANCE_STATE_RUNNING;
use ec2_backup_common::tags::{TAG_BACKUP, TAG_BACKUP_VALUE};
use tracing::debug;

impl Ec2Client {
    /// List running instances tagged `Backup=Y`
    pub async fn list_backup_instances(&self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = retry_throttled("DescribeInstances", || {
                self.describe_backup_instances_page(next_token.clone())
            })
            .await?;

            instances.extend(
                page.reservations()
                    .iter()
                    .flat_map(|r| r.instances())
                    .filter_map(instance_from_sdk),
            );

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = instances.len(), "Found backup instances");
        Ok(instances)
    }

    async fn describe_backup_instances_page(
        &self,
        next_token: Option<String>,
    ) -> Result<DescribeInstancesOutput> {
        self.client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", TAG_BACKUP))
                    .values(TAG_BACKUP_VALUE)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values(INSTANCE_STATE_RUNNING)
                    .build(),
            )
            .set_next_token(next_token)
            .send()
            .await
            .context("Failed to describe instances")
    }
}
