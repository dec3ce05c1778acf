//! Wire Events
//!
//! Typed events exchanged between relay clients and the server, and the
//! codec that maps them to and from JSON frames.
//!
//! ## Event kinds
//!
//! | kind | content |
//! |---|---|
//! | `request_authentication` | `token` |
//! | `connection_accepted` | `client_id` |
//! | `connection_rejected` | `code`, `reason` |
//! | `client_authenticated` | `client_id` |
//! | `disconnecting` | (empty) |
//! | `client_disconnected` | `client_id` |
//! | `send_message` | `message` |
//! | `broadcast_message` | `sender`, `message` |

pub mod codec;
mod error;
mod types;

pub use codec::{decode, decode_frames, encode};
pub use error::{DecodeError, EncodeError};
pub use types::*;
