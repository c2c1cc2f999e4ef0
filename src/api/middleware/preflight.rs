use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Answer any OPTIONS request with an empty 204 carrying permissive CORS
/// headers. Runs outermost so no proxy or router quirk can turn a preflight
/// into a 405; the CORS layer below only ever sees actual requests.
pub async fn preflight_middleware(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let headers = [
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("*"),
            ),
        ];
        return (StatusCode::NO_CONTENT, headers).into_response();
    }

    next.run(req).await
}
