//! Domain model: identifiers, metadata, message envelopes, results and errors.
//!
//! これらは純粋な値型で、バスやレジストリには依存しません。

pub mod errors;
pub mod ids;
pub mod message;
pub mod metadata;
pub mod response_type;
pub mod result;

pub use self::errors::{BusError, DuplicateRejected, ErrorKind, HandlerError};
pub use self::ids::{Id, IdMarker, MessageId, SubscriptionId};
pub use self::message::{CommandMessage, EventMessage, Message, PayloadType, QueryMessage};
pub use self::metadata::MetaData;
pub use self::response_type::{ResponseType, TypeTag};
pub use self::result::{Reply, ResultMessage};
