use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::util::{ComplexExtended, PixelData};

/// Storage kind of a field, fixing its width in bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Complex,
    Integer,
    Code,
}

impl FieldKind {
    #[inline]
    pub fn size(self) -> usize {
        match self {
            // f64 real, f64 imaginary, i64 shared exponent
            FieldKind::Complex => 24,
            FieldKind::Integer => 8,
            FieldKind::Code => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Zn,
    Dzndc,
    Dzndz,
    StopIter,
    StopReason,
    Reference,
}

impl Field {
    pub const ALL: [Field; 6] = [Field::Zn, Field::Dzndc, Field::Dzndz, Field::StopIter, Field::StopReason, Field::Reference];

    /// Fields every run stores, since glitch correction reads them back.
    pub const REQUIRED: [Field; 4] = [Field::Zn, Field::StopIter, Field::StopReason, Field::Reference];

    pub fn name(self) -> &'static str {
        match self {
            Field::Zn => "zn",
            Field::Dzndc => "dzndc",
            Field::Dzndz => "dzndz",
            Field::StopIter => "stop_iter",
            Field::StopReason => "stop_reason",
            Field::Reference => "reference",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|field| field.name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Zn | Field::Dzndc | Field::Dzndz => FieldKind::Complex,
            Field::StopIter | Field::Reference => FieldKind::Integer,
            Field::StopReason => FieldKind::Code,
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.bin", self.name())
    }

    /// Little endian bytes of this field for a finished pixel.
    pub fn encode(self, pixel: &PixelData, output: &mut [u8]) {
        match self {
            Field::Zn => encode_complex(pixel.z_current, output),
            Field::Dzndc => encode_complex(pixel.derivative_current, output),
            Field::Dzndz => encode_complex(pixel.derivative_z, output),
            Field::StopIter => encode_integer(pixel.iteration as i64, output),
            Field::StopReason => output[0] = pixel.stop_reason as u8,
            Field::Reference => encode_integer(pixel.reference_id as i64, output),
        }
    }
}

pub fn encode_complex(value: ComplexExtended, output: &mut [u8]) {
    output[0..8].copy_from_slice(&value.mantissa.re.to_le_bytes());
    output[8..16].copy_from_slice(&value.mantissa.im.to_le_bytes());
    output[16..24].copy_from_slice(&(value.exponent as i64).to_le_bytes());
}

pub fn decode_complex(input: &[u8]) -> ComplexExtended {
    let mut re = [0u8; 8];
    let mut im = [0u8; 8];
    let mut exponent = [0u8; 8];

    re.copy_from_slice(&input[0..8]);
    im.copy_from_slice(&input[8..16]);
    exponent.copy_from_slice(&input[16..24]);

    ComplexExtended::new2(f64::from_le_bytes(re), f64::from_le_bytes(im), i64::from_le_bytes(exponent) as i32)
}

pub fn encode_integer(value: i64, output: &mut [u8]) {
    output[0..8].copy_from_slice(&value.to_le_bytes());
}

pub fn decode_integer(input: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&input[0..8]);
    i64::from_le_bytes(bytes)
}

/// Ordered set of fields stored by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalogue {
    fields: Vec<Field>,
}

impl FieldCatalogue {
    /// Builds the catalogue for a list of requested names. The required fields are
    /// always added; derivative fields are checked against the iteration options.
    pub fn from_names<S: AsRef<str>>(names: &[S], interior_detection: bool) -> Result<FieldCatalogue, ConfigError> {
        let mut fields = Field::REQUIRED.to_vec();

        for name in names {
            let name = name.as_ref().trim();
            let field = Field::from_name(name).ok_or_else(|| ConfigError::UnknownField(name.to_owned()))?;

            if field == Field::Dzndz && !interior_detection {
                return Err(ConfigError::FieldRequirement {
                    field: name.to_owned(),
                    requirement: "interior detection"
                });
            }

            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        fields.sort_by_key(|field| Field::ALL.iter().position(|other| other == field));

        Ok(FieldCatalogue {
            fields
        })
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn lookup(&self, name: &str) -> Option<Field> {
        Field::from_name(name).filter(|field| self.contains(*field))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name()).collect()
    }
}
