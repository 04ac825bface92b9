//! Value objects - immutable identifier types

mod snowflake;

pub use snowflake::{Snowflake, SnowflakeParseError};
