//! CLI presentation: text and json formatters per command family.

mod progress;
mod roadmap;

pub use progress::{format_overlay, format_user_listing};
pub use roadmap::{format_listing, format_roadmap, format_user_view, format_violations};

use crate::error::{ApiError, StorageError};
use serde::Serialize;

pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::StorageError(StorageError::from(e)))
}
