use bson::Bson;
use bson::oid::ObjectId;

/// Primary identifier field of every document.
pub const ID_FIELD: &str = "_id";

/// Limit used when the caller never set one.
pub const DEFAULT_LIMIT: u64 = 999_999;

/// Reserved filter key holding the disjunction.
pub const OR_KEY: &str = "$or";

/// Converts caller-supplied identifier values into the store's native identifier type.
pub trait IdentifierCodec: Send + Sync {
    fn is_native(&self, value: &Bson) -> bool;

    /// # Errors
    /// Returns a description of why `value` cannot become a native identifier.
    fn coerce(&self, value: &Bson) -> Result<Bson, String>;
}

/// `ObjectId` identifiers; hex strings are parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectIdCodec;

impl IdentifierCodec for ObjectIdCodec {
    fn is_native(&self, value: &Bson) -> bool {
        matches!(value, Bson::ObjectId(_))
    }

    fn coerce(&self, value: &Bson) -> Result<Bson, String> {
        match value {
            Bson::ObjectId(oid) => Ok(Bson::ObjectId(*oid)),
            Bson::String(s) => ObjectId::parse_str(s.trim())
                .map(Bson::ObjectId)
                .map_err(|e| format!("{s:?} is not an ObjectId: {e}")),
            other => Err(format!("{:?} cannot be converted to an ObjectId", other.element_type())),
        }
    }
}

/// Identifiers are used as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl IdentifierCodec for PassthroughCodec {
    fn is_native(&self, _value: &Bson) -> bool {
        true
    }

    fn coerce(&self, value: &Bson) -> Result<Bson, String> {
        Ok(value.clone())
    }
}
