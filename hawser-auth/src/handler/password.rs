//! The `password` authentication method.

use super::Response;

/// An interface to the `password` authentication method.
pub trait Password: Send + Sync {
    /// Process the authentication request.
    fn process(&mut self, user: String, password: String) -> Response;
}

impl<T: FnMut(String, String) -> Response + Send + Sync> Password for T {
    fn process(&mut self, user: String, password: String) -> Response {
        (self)(user, password)
    }
}

/// A default implementation of the method that rejects all requests.
impl Password for () {
    fn process(&mut self, _: String, _: String) -> Response {
        Response::Reject
    }
}
