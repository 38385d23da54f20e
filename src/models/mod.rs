pub mod issue;

use serde::Serialize;

/// JSON body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
