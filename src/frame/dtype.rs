//! Host-facing dtype names.
//!
//! Catalog hosts describe columns with the pandas dtype vocabulary, so a
//! string column is `object` and a geometry column is `geometry`.

use polars::prelude::DataType;

/// Name reported for the geometry column.
pub const GEOMETRY_DTYPE: &str = "geometry";

/// Map a polars dtype to the host's dtype name.
pub fn dtype_name(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "bool".to_string(),
        DataType::Int8 => "int8".to_string(),
        DataType::Int16 => "int16".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Int64 => "int64".to_string(),
        DataType::UInt8 => "uint8".to_string(),
        DataType::UInt16 => "uint16".to_string(),
        DataType::UInt32 => "uint32".to_string(),
        DataType::UInt64 => "uint64".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::String | DataType::Binary | DataType::Null => "object".to_string(),
        DataType::Datetime(_, _) => "datetime64[ns]".to_string(),
        DataType::Duration(_) => "timedelta64[ns]".to_string(),
        other => other.to_string().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::TimeUnit;

    #[test]
    fn test_dtype_names() {
        assert_eq!(dtype_name(&DataType::String), "object");
        assert_eq!(dtype_name(&DataType::Int64), "int64");
        assert_eq!(dtype_name(&DataType::Float64), "float64");
        assert_eq!(dtype_name(&DataType::Boolean), "bool");
        assert_eq!(dtype_name(&DataType::Null), "object");
        assert_eq!(
            dtype_name(&DataType::Datetime(TimeUnit::Microseconds, None)),
            "datetime64[ns]"
        );
    }
}
