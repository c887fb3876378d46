//! OpenAPI document for the passkey endpoints, served by Swagger UI at
//! `/docs`.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::passkey::verify,
        handlers::enroll::enroll,
        handlers::enroll::enrolled,
    ),
    components(schemas(
        handlers::types::VerifyPasskeyRequest,
        handlers::types::VerifyPasskeyResponse,
        handlers::types::EnrollRequest,
        handlers::types::EnrollResponse,
        handlers::types::EnrolledResponse,
        handlers::health::Health,
    )),
    tags(
        (name = "auth", description = "Passkey verification and enrollment"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|path| path.as_str() == "/health"));
        assert!(paths.iter().any(|path| path.as_str() == "/v1/auth/passkey/verify"));
        assert!(paths.iter().any(|path| path.as_str() == "/v1/auth/enroll"));
        assert!(paths.iter().any(|path| path.as_str() == "/v1/auth/enrolled"));
    }
}
