//! The `publickey` authentication method.

use ssh_key::PublicKey;

use super::Response;

/// An interface to the `publickey` authentication method.
pub trait Publickey: Send + Sync {
    /// Process the authentication request.
    fn process(&mut self, user: String, key: &PublicKey) -> Response;
}

impl<T: FnMut(String, &PublicKey) -> Response + Send + Sync> Publickey for T {
    fn process(&mut self, user: String, key: &PublicKey) -> Response {
        (self)(user, key)
    }
}

/// A default implementation of the method that rejects all requests.
impl Publickey for () {
    fn process(&mut self, _: String, _: &PublicKey) -> Response {
        Response::Reject
    }
}
