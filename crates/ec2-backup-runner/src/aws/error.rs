//! AWS error classification and handling
//!
//! Provides typed errors for EC2 SDK operations using the `.code()` method
//! instead of string matching on the Debug format.

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::operation::{
    create_image::CreateImageError, create_snapshot::CreateSnapshotError,
    create_tags::CreateTagsError, delete_snapshot::DeleteSnapshotError,
    deregister_image::DeregisterImageError, describe_images::DescribeImagesError,
    describe_instances::DescribeInstancesError, describe_snapshots::DescribeSnapshotsError,
};
use thiserror::Error;

/// AWS error categories for retry and sweep logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (already deleted, or not yet visible)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Resource is still referenced, e.g. a snapshot backing a registered image
    #[error("Resource is in use: {message}")]
    InUse { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidAMIID.NotFound",
    "InvalidAMIID.Unavailable",
    "InvalidSnapshot.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidVolume.NotFound",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Known AWS error codes for resources still referenced elsewhere
const IN_USE_CODES: &[&str] = &["InvalidSnapshot.InUse"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if IN_USE_CODES.contains(&c) => AwsError::InUse { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify a cause if it is an `SdkError` for operation error `E`
fn classify_sdk_cause<E>(cause: &(dyn std::error::Error + 'static)) -> Option<AwsError>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    cause.downcast_ref::<SdkError<E>>().map(|e| {
        let meta = ProvideErrorMetadata::meta(e);
        classify_aws_error(meta.code(), meta.message())
    })
}

/// Classify an error from an anyhow::Error by extracting the AWS error code.
///
/// Walks the error chain looking for the EC2 operation errors this crate
/// issues. Falls back to string matching on the Debug representation if no
/// typed error is found.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    for cause in error.chain() {
        let classified = classify_sdk_cause::<DeregisterImageError>(cause)
            .or_else(|| classify_sdk_cause::<DeleteSnapshotError>(cause))
            .or_else(|| classify_sdk_cause::<CreateImageError>(cause))
            .or_else(|| classify_sdk_cause::<CreateSnapshotError>(cause))
            .or_else(|| classify_sdk_cause::<CreateTagsError>(cause))
            .or_else(|| classify_sdk_cause::<DescribeImagesError>(cause))
            .or_else(|| classify_sdk_cause::<DescribeSnapshotsError>(cause))
            .or_else(|| classify_sdk_cause::<DescribeInstancesError>(cause));
        if let Some(classified) = classified {
            return classified;
        }
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&debug_str));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    let known = NOT_FOUND_CODES
        .iter()
        .chain(THROTTLING_CODES)
        .chain(IN_USE_CODES);
    for code in known {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}
