pub mod config;
pub mod point;
pub mod writer;
pub use config::{Config, ConfigError};
pub use encode::{encode_point, to_line};
pub use point::{FieldValue, Point, PointBuilder, ValidationError, WritePrecision};
pub use writer::{WriteError, Writer, WriterError};

mod encode;
