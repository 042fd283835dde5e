//! TypedJob trait - binds a job type tag to a payload type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A job payload with a fixed type tag.
///
/// # Example
/// ```ignore
/// #[derive(Deserialize)]
/// struct Resize { url: String }
///
/// impl TypedJob for Resize {
///     const TYPE: &'static str = "IMAGE_RESIZE";
///     type Output = serde_json::Value;
/// }
/// ```
///
/// # Trait bounds
/// - `DeserializeOwned`: the payload arrives as JSON and is decoded per attempt
/// - `Send + 'static`: handlers run on the worker pool's tasks
pub trait TypedJob: DeserializeOwned + Send + 'static {
    /// Value of the job's `type` field.
    const TYPE: &'static str;

    /// What a successful run records as the job's `result`.
    type Output: Serialize + Send;
}
