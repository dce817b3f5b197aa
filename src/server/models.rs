use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessRequest {
    pub(crate) file_name: String,
    pub(crate) data_base64: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProcessResponse {
    pub(crate) session: String,
    pub(crate) output_name: String,
    pub(crate) data_base64: String,
    pub(crate) captions_csv: String,
    pub(crate) invalid_images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetRequest {
    pub(crate) session: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
