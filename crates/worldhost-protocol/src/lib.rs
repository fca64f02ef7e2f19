//! Wire protocol for worldhost.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ServerId`],
//!   [`UserId`], [`GameKind`]): what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Session (user context)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, GameKind, ServerId, ServerMessage, UserId};
