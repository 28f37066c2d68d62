use serde::Serialize;

/// Standard `{ "data": ... }` envelope used by listing endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
