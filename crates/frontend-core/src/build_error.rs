use core::fmt;

/// Errors raised while constructing a stage or a chain.
/// All width budgeting happens at construction, so once a stage is built
/// its runtime operations have no error surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildErr {
    InvalidParam { param: &'static str, value: i64 },
    EmptyRates,
    RateNotPowerOfTwo { rate: u32 },
    NotDyadic { index: usize },
    NotSymmetric,
    NotHalfBand { reason: &'static str },
    WidthExceeded { field: &'static str, width: u32, max: u32 },
    NegativeShift { shift: i64 },
    Inconsistency { field: &'static str, reason: &'static str },
}

impl fmt::Display for BuildErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildErr::InvalidParam { param, value } => write!(f, "invalid value {} for {}", value, param),
            BuildErr::EmptyRates => write!(f, "rate set is empty"),
            BuildErr::RateNotPowerOfTwo { rate } => write!(f, "rate {} is not a power of two", rate),
            BuildErr::NotDyadic { index } => write!(f, "tap {} has a non power-of-two denominator", index),
            BuildErr::NotSymmetric => write!(f, "taps are not symmetric"),
            BuildErr::NotHalfBand { reason } => write!(f, "not a half-band filter: {}", reason),
            BuildErr::WidthExceeded { field, width, max } => {
                write!(f, "{} width {} exceeds maximum of {}", field, width, max)
            }
            BuildErr::NegativeShift { shift } => write!(f, "output width requires negative shift {}", shift),
            BuildErr::Inconsistency { field, reason } => write!(f, "{}: {}", field, reason),
        }
    }
}

impl std::error::Error for BuildErr {}

/// Checks whether a parameter satisfies a condition. If not, returns BuildErr::InvalidParam
#[macro_export]
macro_rules! expect_param {
    ($value:ident, $cond:expr) => {
        $crate::expect_param!(@inner $value, $cond, stringify!($value))
    };
    ($value:expr, $cond:expr, $param:expr) => {
        $crate::expect_param!(@inner $value, $cond, $param)
    };

    (@inner $value:expr, $cond:expr, $param:expr) => {{
        if $cond {
            Ok(())
        } else {
            Err($crate::BuildErr::InvalidParam {
                param: $param,
                value: $value as i64,
            })
        }
    }};
}

/// Checks that a width does not exceed a hardware limit. If it does, returns BuildErr::WidthExceeded
#[macro_export]
macro_rules! expect_width {
    ($width:expr, $max:expr, $field:expr) => {{
        let w = $width;
        if w <= $max {
            Ok(())
        } else {
            Err($crate::BuildErr::WidthExceeded {
                field: $field,
                width: w,
                max: $max,
            })
        }
    }};
}
