use axum::{
    body::Body,
    http::{
        header::{self, HeaderName},
        request::Parts,
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    response::Response,
};
use bytes::Bytes;

/// Request/response view handed to every handler and middleware.
pub trait ApiContext: Send {
    fn request_method(&self) -> &Method;
    fn request_header(&self) -> &HeaderMap;
    fn request_body(&self) -> &Bytes;
    fn url(&self) -> &Uri;

    fn path_param(&self) -> &str;
    fn set_path_param(&mut self, param: String);

    fn write_status_code(&mut self, status: StatusCode);
    /// Serialises `body`, sets the status and a JSON content type.
    fn write_response_json(
        &mut self,
        status: StatusCode,
        body: serde_json::Value,
    ) -> anyhow::Result<()>;
    /// Appends; repeated names keep every value in call order.
    fn add_response_header(&mut self, key: HeaderName, value: HeaderValue);

    fn into_response(self: Box<Self>) -> Response;
}

/// Builds a context from a request whose body has already been read.
pub type ApiContextFactory = fn(Parts, Bytes) -> Box<dyn ApiContext>;

/// `ApiContext` over axum/http types.
#[derive(Debug)]
pub struct HttpContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path_param: String,
    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,
}

impl HttpContext {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            path_param: String::new(),
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
        }
    }

    pub fn boxed(parts: Parts, body: Bytes) -> Box<dyn ApiContext> {
        Box::new(Self::new(parts, body))
    }
}

impl ApiContext for HttpContext {
    fn request_method(&self) -> &Method {
        &self.method
    }

    fn request_header(&self) -> &HeaderMap {
        &self.headers
    }

    fn request_body(&self) -> &Bytes {
        &self.body
    }

    fn url(&self) -> &Uri {
        &self.uri
    }

    fn path_param(&self) -> &str {
        &self.path_param
    }

    fn set_path_param(&mut self, param: String) {
        self.path_param = param;
    }

    fn write_status_code(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write_response_json(
        &mut self,
        status: StatusCode,
        body: serde_json::Value,
    ) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&body)?;
        self.status = status;
        self.response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.response_body = Bytes::from(bytes);
        Ok(())
    }

    fn add_response_header(&mut self, key: HeaderName, value: HeaderValue) {
        self.response_headers.append(key, value);
    }

    fn into_response(self: Box<Self>) -> Response {
        let mut res = Response::new(Body::from(self.response_body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.response_headers;
        res
    }
}

#[cfg(test)]
pub(crate) fn test_context(method: Method, uri: &str, headers: &[(&str, &str)]) -> Box<dyn ApiContext> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let (parts, _) = builder.body(()).expect("request").into_parts();
    HttpContext::boxed(parts, Bytes::new())
}
