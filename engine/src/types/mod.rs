pub mod ids;
pub mod record;
pub mod value;

pub use ids::{RecordId, RecordIdError};
pub use record::{Record, Transient};
pub use value::{GeoPoint, Value};

pub trait JsonDeserializable<T> {
    fn from_json(json_obj: T) -> Result<Self, String>
    where
        Self: Sized;
}

pub trait JsonSerializable<T> {
    fn to_json(&self) -> T;
}
