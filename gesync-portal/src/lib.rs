//! Client for the uni.lu Guichet Etudiant portal.
//!
//! The portal authenticates the HTTP connection with NTLM, then expects
//! an anti-forgery token (scraped from the agenda page) on every POST.

pub mod ntlm;
pub mod records;
pub mod session;
pub mod source;
pub mod token;
pub mod transport;

pub use session::{DEFAULT_BASE_URL, PortalSession};
pub use source::{CourseFilter, PortalAccount, PortalEventSource};
pub use token::extract_token;
