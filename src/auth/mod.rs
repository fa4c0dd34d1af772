//! Session credential management.
//!
//! Authenticated pages are fetched with the cookies of a logged-in browser
//! session, supplied as a raw `Cookie` header string.

mod cookies;

pub use cookies::{CookieError, Credentials};
