//! HTTP/1.1 request processing: parse -> resolve -> build response.
//!
//! Grounded on `examples/original_source/src/core/http.c`'s `http_process`
//! dispatch.

mod mime;
mod parser;
mod path;
mod response;

pub use parser::{Method, ParseError};
pub use response::{HttpResponse, Payload};

/// Parses `buf` as an HTTP/1.1 request and builds the response, dispatching
/// on method exactly as `http_process` does: `GET`/`HEAD` resolve and serve
/// a file, `OPTIONS` answers 204, anything else is 405, and a parse failure
/// is 400.
pub fn process(buf: &[u8], root: &std::path::Path) -> HttpResponse {
    let request = match parser::parse(buf) {
        Ok(r) => r,
        Err(ParseError::Malformed) => return response::bad_request(),
    };

    match request.method {
        Method::Get | Method::Head => match path::resolve(request.target, root) {
            Ok(resolved) => response::serve_file(&resolved, request.method),
            Err(_) => response::not_found(),
        },
        Method::Options => response::options(),
        Method::Other => response::method_not_allowed(),
    }
}
