//! ResponseType - クエリの期待する応答の形を表すタグ付き記述子
//!
//! 実行時リフレクションは使わず、`TypeId` による厳密な一致で
//! サブスクリプションを絞り込みます。

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::fmt;

use super::errors::HandlerError;

/// Compile-time type tag: a `TypeId` plus the type name for display.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Descriptor of the response shape a query expects or a handler produces.
///
/// Only single instances are supported today; further shapes get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    InstanceOf(TypeTag),
}

impl ResponseType {
    pub fn instance_of<R: 'static>() -> Self {
        Self::InstanceOf(TypeTag::of::<R>())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Self::InstanceOf(tag) => *tag,
        }
    }

    /// Whether a subscription declaring `candidate` can answer a query expecting `self`.
    pub fn matches(&self, candidate: &ResponseType) -> bool {
        match (self, candidate) {
            (Self::InstanceOf(expected), Self::InstanceOf(offered)) => expected == offered,
        }
    }

    /// Converts a raw handler payload into `R`.
    ///
    /// Absent or `null` payloads become `None`. Asking for a type other than the one this
    /// descriptor names is an error.
    pub fn convert<R>(&self, raw: Option<Value>) -> Result<Option<R>, HandlerError>
    where
        R: DeserializeOwned + 'static,
    {
        if !self.tag().is::<R>() {
            return Err(HandlerError::conversion(format!(
                "cannot convert {self} response into {}",
                std::any::type_name::<R>()
            )));
        }
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| HandlerError::conversion(format!("response decode: {e}"))),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceOf(tag) => write!(f, "InstanceOf<{}>", tag.name()),
        }
    }
}
