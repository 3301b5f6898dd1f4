use crate::server::core::error::CoreError;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use serde_json::json;

#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("{source}")]
    Core { source: CoreError },
}

impl From<CoreError> for CustomError {
    fn from(source: CoreError) -> Self {
        Self::Core { source }
    }
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match self {
            CustomError::ServerIsBusy => StatusCode::TOO_MANY_REQUESTS,
            CustomError::Core { source } => match source {
                CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
                CoreError::Conflict { .. } | CoreError::NoCapacity => StatusCode::CONFLICT,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::Storage { .. } | CoreError::Unknown => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::ResponseError;

    #[test]
    fn error_kinds_map_to_response_categories() {
        let cases = [
            (CoreError::validation("bad"), StatusCode::BAD_REQUEST),
            (CoreError::conflict("taken"), StatusCode::CONFLICT),
            (CoreError::NoCapacity, StatusCode::CONFLICT),
            (CoreError::not_found("order 9"), StatusCode::NOT_FOUND),
            (CoreError::Unknown, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (core, expected) in cases {
            assert_eq!(CustomError::from(core).status_code(), expected);
        }
    }

    #[test]
    fn busy_pool_maps_to_too_many_requests() {
        assert_eq!(
            CustomError::ServerIsBusy.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
