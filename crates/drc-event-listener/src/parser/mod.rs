pub mod registry;
pub mod schema_decoder;

pub use registry::{EventKind, EventRegistry};
pub use schema_decoder::{
    calculate_event_discriminator, encode_event_data, DecodedEvent, DecodedValue, EventSchema, FieldType,
    PROGRAM_DATA_MARKER,
};
