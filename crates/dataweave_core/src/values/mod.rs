pub mod compute;
pub mod datatype;
pub mod hash_key;
pub mod record;
pub mod value;

pub use datatype::{DataType, RecordType, TypeClass};
pub use hash_key::HashKey;
pub use record::Record;
pub use value::Value;
