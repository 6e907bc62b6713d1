//! OpenAPI/Utoipa configuration.

use crate::api::{documents::DOCUMENTS_TAG, health::MISC_TAG, status::STATUS_TAG};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "NFe Monitor API",
        version = "1.0.0",
        description = "Availability monitoring and lookup cache for the SEFAZ fiscal document services."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = DOCUMENTS_TAG, description = "Document lookup and cache endpoints"),
        (name = STATUS_TAG, description = "SEFAZ status monitoring endpoints")
    )
)]
pub struct ApiDoc;
