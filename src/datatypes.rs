use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::OptimizerError;

/// Data types of columns that can appear in join predicates.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DataType {
    Int32,
    Int64,
    Decimal,
    Date,
    Char,
    String,
}

impl DataType {
    /// Returns `true` if values of this type are compared as character strings.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Char | DataType::String)
    }

    /// Returns `true` if values of this type are ordered numerically.
    pub fn is_numeric(&self) -> bool {
        !self.is_string()
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Decimal => "decimal",
            DataType::Date => "date",
            DataType::Char => "char",
            DataType::String => "string",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DataType {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int32" | "int" | "integer" => Ok(DataType::Int32),
            "int64" | "bigint" => Ok(DataType::Int64),
            "decimal" => Ok(DataType::Decimal),
            "date" => Ok(DataType::Date),
            "char" => Ok(DataType::Char),
            "string" | "varchar" => Ok(DataType::String),
            _ => Err(OptimizerError::argument(format!("Unknown data type: {}", s))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_data_type() {
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Int32);
        assert_eq!("varchar".parse::<DataType>().unwrap(), DataType::String);
        assert_eq!(DataType::Date.to_string().parse::<DataType>().unwrap(), DataType::Date);
        assert!("blob".parse::<DataType>().is_err());
    }
}
