// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;

use num_traits::Float;

/// The offset between the Kelvin and Celsius scales.
const KELVIN_OFFSET: f64 = 273.15;

/// Temperature readings, tagged with the scale they were measured in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Temperature<T = f32>
where
    T: Float,
{
    Celsius(T),
    Kelvin(T),
}

impl<T> Temperature<T>
where
    T: Float,
{
    fn offset() -> T {
        T::from(KELVIN_OFFSET).expect("273.15 to be able to be represented by a float")
    }

    /// Create a temperature from the sensor daemon's representation: an unsigned integer count of
    /// hundredths of a Kelvin.
    pub(crate) fn from_centikelvin(raw: u16) -> Self {
        let hundred = T::from(100).expect("100 to be able to be represented by a float");
        let raw = T::from(raw).expect("a u16 to be able to be represented by a float");
        Self::Kelvin(raw / hundred)
    }

    /// Get the temperature in Celsius.
    pub(crate) fn in_celsius(&self) -> T {
        match self {
            Self::Celsius(c) => *c,
            Self::Kelvin(k) => *k - Self::offset(),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius(_) => "°C",
            Self::Kelvin(_) => "K",
        }
    }
}

impl<T> fmt::Display for Temperature<T>
where
    T: Float + fmt::Display,
{
    /// Format the temperature value like a numeric value. If the alternate formatting flag (`#`)
    /// is specified, the unit symbol is appended without a separating space.
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Celsius(c) => *c,
            Self::Kelvin(k) => *k,
        };
        value.fmt(fmt)?;
        if fmt.alternate() {
            fmt.write_str(self.symbol())?;
        }
        Ok(())
    }
}
