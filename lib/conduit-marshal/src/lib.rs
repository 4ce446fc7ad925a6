//! Two-pass protobuf and JSON encoding for OTLP payloads.
//!
//! Payloads are described by [`Marshaler`] trees. A size pass computes the exact length of every nested message so
//! that the write pass can emit length prefixes without buffering, and the same tree can be written either as
//! protobuf or as OTLP JSON by handing it a different [`Serializer`].

mod context;
pub use self::context::MarshalerContext;

pub mod encoder;
pub use self::encoder::{
    all_string_encoders, string_encoder, FallbackStringEncoder, StringEncoder, UncheckedStringEncoder,
    VectorizedStringEncoder,
};

mod field;
pub use self::field::{ProtoEnumInfo, ProtoFieldInfo};

mod marshaler;
pub use self::marshaler::{to_binary, write_binary_to, write_json_to, write_json_with_newline, Marshaler, MemoryMode};

pub mod otlp;

mod serializer;
pub use self::serializer::{JsonSerializer, ProtoSerializer, Serializer};

pub mod size;

pub mod stateless;
pub use self::stateless::{ReusableMarshaler, StatelessMarshaler};

mod text;
pub use self::text::Text;

pub mod wire;
