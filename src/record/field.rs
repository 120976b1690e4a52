//! Output schema: the fixed set of fields a collection record holds.

use std::fmt;
use std::str::FromStr;

use crate::error::DaqError;

/// One named slot of the output record.
///
/// Declaration order is the column order of the persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Location code typed by the operator.
    Code,
    /// Latitude in decimal degrees.
    Lat,
    /// Longitude in decimal degrees.
    Lon,
    /// Air temperature, averaged across two sensors.
    AirTemp,
    /// Canopy surface temperature.
    CanopyTemp,
    /// Relative air humidity, averaged across two sensors.
    Humidity,
    /// Ground humidity typed by the operator.
    GroundHumidity,
    /// Wind speed typed by the operator.
    WindSpeed,
    /// Atmospheric pressure.
    Pressure,
    /// Infrared radiation.
    IrRadiation,
    /// Ultraviolet radiation.
    UvRadiation,
}

/// How a field gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Raw text typed by the operator.
    Operator,
    /// Read from the GPS receiver.
    Position,
    /// Read from one or more environmental sensors.
    Environmental,
}

impl Field {
    /// Number of fields in the schema.
    pub const COUNT: usize = 11;

    /// All fields in persisted column order.
    pub const ALL: [Field; Field::COUNT] = [
        Field::Code,
        Field::Lat,
        Field::Lon,
        Field::AirTemp,
        Field::CanopyTemp,
        Field::Humidity,
        Field::GroundHumidity,
        Field::WindSpeed,
        Field::Pressure,
        Field::IrRadiation,
        Field::UvRadiation,
    ];

    /// Order used by the "acquire all" sequence.
    pub const ENVIRONMENTAL_SEQUENCE: [Field; 6] = [
        Field::AirTemp,
        Field::CanopyTemp,
        Field::Humidity,
        Field::Pressure,
        Field::IrRadiation,
        Field::UvRadiation,
    ];

    /// Column position in the persisted schema.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column header in the data file.
    pub fn header(self) -> &'static str {
        match self {
            Field::Code => "CODE",
            Field::Lat => "LAT",
            Field::Lon => "LON",
            Field::AirTemp => "AIR_TEMP",
            Field::CanopyTemp => "CANOPY_TEMP",
            Field::Humidity => "HUM",
            Field::GroundHumidity => "GROUND_HUM",
            Field::WindSpeed => "WIND_SPEED",
            Field::Pressure => "PRESSURE",
            Field::IrRadiation => "IR_RAD",
            Field::UvRadiation => "UV_RAD",
        }
    }

    /// Human-readable label, also accepted by [`Field::from_str`] in kebab case.
    pub fn label(self) -> &'static str {
        match self {
            Field::Code => "Location code",
            Field::Lat => "Latitude",
            Field::Lon => "Longitude",
            Field::AirTemp => "Air temperature",
            Field::CanopyTemp => "Canopy temperature",
            Field::Humidity => "Humidity",
            Field::GroundHumidity => "Ground humidity",
            Field::WindSpeed => "Wind speed",
            Field::Pressure => "Pressure",
            Field::IrRadiation => "IR radiation",
            Field::UvRadiation => "UV radiation",
        }
    }

    /// Physical unit shown next to the value.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Field::Code => None,
            Field::Lat | Field::Lon => Some("°"),
            Field::AirTemp | Field::CanopyTemp => Some("°C"),
            Field::Humidity | Field::GroundHumidity => Some("%"),
            Field::WindSpeed => Some("m/s"),
            Field::Pressure => Some("hPa"),
            Field::IrRadiation | Field::UvRadiation => Some("W/m\u{b2}"),
        }
    }

    /// Where the value of this field comes from.
    pub fn source(self) -> FieldSource {
        match self {
            Field::Code | Field::WindSpeed | Field::GroundHumidity => FieldSource::Operator,
            Field::Lat | Field::Lon => FieldSource::Position,
            Field::AirTemp
            | Field::CanopyTemp
            | Field::Humidity
            | Field::Pressure
            | Field::IrRadiation
            | Field::UvRadiation => FieldSource::Environmental,
        }
    }

    /// Header row of the data file.
    pub fn headers() -> [&'static str; Field::COUNT] {
        Field::ALL.map(Field::header)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Field {
    type Err = DaqError;

    /// Accepts header names (`AIR_TEMP`) and kebab-case labels (`air-temp`, `air-temperature`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Field::ALL
            .into_iter()
            .find(|field| {
                field.header() == normalized
                    || field.label().to_ascii_uppercase().replace(' ', "_") == normalized
            })
            .or_else(|| match normalized.as_str() {
                "HUMIDITY" => Some(Field::Humidity),
                "GROUND_HUMIDITY" => Some(Field::GroundHumidity),
                "IR_RADIATION" => Some(Field::IrRadiation),
                "UV_RADIATION" => Some(Field::UvRadiation),
                _ => None,
            })
            .ok_or_else(|| DaqError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_matches_file_format() {
        assert_eq!(
            Field::headers().join(","),
            "CODE,LAT,LON,AIR_TEMP,CANOPY_TEMP,HUM,GROUND_HUM,WIND_SPEED,PRESSURE,IR_RAD,UV_RAD"
        );
    }

    #[test]
    fn index_follows_declaration_order() {
        for (position, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), position);
        }
    }

    #[test]
    fn parses_headers_and_labels() {
        assert_eq!("AIR_TEMP".parse::<Field>().unwrap(), Field::AirTemp);
        assert_eq!("air-temp".parse::<Field>().unwrap(), Field::AirTemp);
        assert_eq!("air-temperature".parse::<Field>().unwrap(), Field::AirTemp);
        assert_eq!("hum".parse::<Field>().unwrap(), Field::Humidity);
        assert_eq!("uv-radiation".parse::<Field>().unwrap(), Field::UvRadiation);
        assert_eq!("Location code".parse::<Field>().unwrap(), Field::Code);
        assert!(matches!(
            "soil".parse::<Field>(),
            Err(DaqError::UnknownField(name)) if name == "soil"
        ));
    }

    #[test]
    fn sources() {
        assert_eq!(Field::WindSpeed.source(), FieldSource::Operator);
        assert_eq!(Field::Lon.source(), FieldSource::Position);
        assert!(Field::ENVIRONMENTAL_SEQUENCE
            .iter()
            .all(|f| f.source() == FieldSource::Environmental));
    }
}
