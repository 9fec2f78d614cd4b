//! Route handlers, grouped by S3 resource. `dispatch` holds the
//! query-string routers that pick between the sibling operations that
//! share one HTTP method and path (PutObject vs UploadPart vs
//! Attach-SBOM, and so on).

pub mod bucket;
pub mod dispatch;
pub mod multipart;
pub mod object;
pub mod supplychain;

pub use bucket::{create_bucket, delete_bucket, list_buckets, list_objects};
pub use dispatch::{delete_dispatch, get_dispatch, post_dispatch, put_dispatch};
pub use object::head_object;
