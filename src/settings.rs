use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::math::FractalType;
use crate::util::{
    ChunkLayout, ComplexArbitrary, Field, FieldCatalogue, FloatExtended, Viewport,
    digits_to_bits, float_to_extended, parse_arbitrary, required_digits, validate_precision
};

const ENVIRONMENT_PREFIX: &str = "DEEPZOOM";

/// Family of the iterated map, combined with `power` into a [`FractalType`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalFamily {
    Mandelbrot,
    BurningShip,
}

/// Skip-ahead strategy, fixed for the whole render.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approximation {
    None,
    Series,
    Bilinear,
    SeriesBilinear,
}

impl Approximation {
    #[inline]
    pub fn uses_series(self) -> bool {
        matches!(self, Approximation::Series | Approximation::SeriesBilinear)
    }

    #[inline]
    pub fn uses_bilinear(self) -> bool {
        matches!(self, Approximation::Bilinear | Approximation::SeriesBilinear)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesSettings {
    pub order: usize,
    // allowed probe error in units of the pixel spacing
    pub tolerance: f64,
}

impl Default for SeriesSettings {
    fn default() -> Self {
        SeriesSettings {
            order: 16,
            tolerance: 0.1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilinearSettings {
    pub epsilon: f64,
}

impl Default for BilinearSettings {
    fn default() -> Self {
        BilinearSettings {
            epsilon: 2.0f64.powi(-24)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlitchSettings {
    // Pauldelbrot threshold on |z| / |Z|
    pub tolerance: f64,
    pub maximum_rounds: usize,
    pub maximum_references: usize,
}

impl Default for GlitchSettings {
    fn default() -> Self {
        GlitchSettings {
            tolerance: 1e-3,
            maximum_rounds: 20,
            maximum_references: 8
        }
    }
}

/// Everything a render needs, as read from a settings file. Numbers that may exceed
/// the `f64` range are kept as decimal strings until validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub run_name: String,
    pub output_directory: PathBuf,
    pub image_width: usize,
    pub image_height: usize,
    pub real: String,
    pub imag: String,
    pub width: String,
    pub precision: usize,
    pub auto_precision: bool,
    pub maximum_iteration: usize,
    pub escape_radius: f64,
    pub fractal_type: FractalFamily,
    // exponent of the mandelbrot family, the burning ship is always 2
    pub power: u32,
    pub approximation: Approximation,
    pub interior_detection: bool,
    pub stationary_epsilon: f64,
    pub rebasing: bool,
    pub chunk_size: usize,
    pub threads: Option<usize>,
    pub fields: Vec<String>,
    pub series: SeriesSettings,
    pub bilinear: BilinearSettings,
    pub glitch: GlitchSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            run_name: "render".to_owned(),
            output_directory: PathBuf::from("output"),
            image_width: 640,
            image_height: 360,
            real: "-0.75".to_owned(),
            imag: "0.0".to_owned(),
            width: "5.0".to_owned(),
            precision: 30,
            auto_precision: true,
            maximum_iteration: 1000,
            escape_radius: 1000.0,
            fractal_type: FractalFamily::Mandelbrot,
            power: 2,
            approximation: Approximation::SeriesBilinear,
            interior_detection: true,
            stationary_epsilon: 1e-3,
            rebasing: false,
            chunk_size: 64,
            threads: None,
            fields: Vec::new(),
            series: SeriesSettings::default(),
            bilinear: BilinearSettings::default(),
            glitch: GlitchSettings::default()
        }
    }
}

impl EngineSettings {
    /// Reads an optional TOML file, then applies `DEEPZOOM_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<EngineSettings, ConfigError> {
        let mut settings = config::Config::default();

        if let Some(path) = path {
            settings.merge(config::File::from(path))?;
        }

        settings.merge(config::Environment::with_prefix(ENVIRONMENT_PREFIX))?;

        Ok(settings.try_into()?)
    }

    pub fn from_toml(contents: &str) -> Result<EngineSettings, ConfigError> {
        let mut settings = config::Config::default();
        settings.merge(config::File::from_str(contents, config::FileFormat::Toml))?;

        Ok(settings.try_into()?)
    }

    /// Checks every value and resolves the coordinates, before any pixel is computed.
    pub fn validate(&self) -> Result<ValidatedSettings, ConfigError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(ConfigError::EmptyImage {
                width: self.image_width,
                height: self.image_height
            });
        }

        check_positive("maximum_iteration", self.maximum_iteration as f64)?;
        check_positive("escape_radius", self.escape_radius)?;
        check_positive("stationary_epsilon", self.stationary_epsilon)?;
        check_positive("chunk_size", self.chunk_size as f64)?;
        check_positive("series.order", self.series.order as f64)?;
        check_positive("series.tolerance", self.series.tolerance)?;
        check_positive("bilinear.epsilon", self.bilinear.epsilon)?;
        check_positive("glitch.tolerance", self.glitch.tolerance)?;
        check_positive("glitch.maximum_references", self.glitch.maximum_references as f64)?;

        if let Some(threads) = self.threads {
            check_positive("threads", threads as f64)?;
        }

        validate_precision(self.precision)?;

        let fractal_type = self.fractal_type()?;
        let minimum_radius = fractal_type.minimum_escape_radius();

        if self.escape_radius < minimum_radius {
            return Err(ConfigError::EscapeRadius {
                radius: self.escape_radius,
                minimum: minimum_radius
            });
        }

        let catalogue = FieldCatalogue::from_names(&self.fields, self.interior_detection)?;
        let mut approximation = self.approximation;

        if !fractal_type.is_analytic() {
            for field in &[Field::Dzndc, Field::Dzndz] {
                if catalogue.contains(*field) {
                    return Err(ConfigError::FieldRequirement {
                        field: field.name().to_owned(),
                        requirement: "a complex analytic map"
                    });
                }
            }

            if approximation != Approximation::None {
                warn!("{:?} has no series or bilinear approximation, iterating every step", fractal_type);
                approximation = Approximation::None;
            }
        }

        let mut digits = self.precision;
        let mut centre = self.parse_centre(digits)?;
        let width = self.parse_width(digits)?;

        let delta_pixel = width / self.image_width as f64;
        let centre_magnitude = float_to_extended(centre.real()).abs().max(float_to_extended(centre.imag()).abs());
        let required = required_digits(centre_magnitude, delta_pixel);

        if required > digits {
            if !self.auto_precision {
                return Err(ConfigError::InsufficientPrecision {
                    available: digits,
                    required
                });
            }

            validate_precision(required)?;
            warn!("precision raised from {} to {} digits", digits, required);

            digits = required;
            centre = self.parse_centre(digits)?;
        }

        info!("{:<14}{:>6} digits ({} bits)", "Precision", digits, digits_to_bits(digits));

        Ok(ValidatedSettings {
            run_name: self.run_name.clone(),
            output_directory: self.output_directory.clone(),
            viewport: Viewport::new(centre, width, self.image_width, self.image_height),
            precision_digits: digits,
            maximum_iteration: self.maximum_iteration,
            escape_radius: self.escape_radius,
            fractal_type,
            approximation,
            interior_detection: self.interior_detection,
            stationary_epsilon: self.stationary_epsilon,
            rebasing: self.rebasing,
            layout: ChunkLayout::new(self.image_width, self.image_height, self.chunk_size),
            threads: self.threads,
            catalogue,
            series: self.series.clone(),
            bilinear: self.bilinear.clone(),
            glitch: self.glitch.clone()
        })
    }

    fn fractal_type(&self) -> Result<FractalType, ConfigError> {
        if self.power < 2 {
            return Err(ConfigError::Power {
                power: self.power,
                requirement: "must be at least 2"
            });
        }

        if self.fractal_type == FractalFamily::BurningShip && self.power != 2 {
            return Err(ConfigError::Power {
                power: self.power,
                requirement: "the burning ship is power 2"
            });
        }

        Ok(FractalType::with_power(self.fractal_type == FractalFamily::BurningShip, self.power))
    }

    fn parse_centre(&self, digits: usize) -> Result<ComplexArbitrary, ConfigError> {
        let bits = digits_to_bits(digits);

        let real = parse_arbitrary(&self.real, bits).ok_or_else(|| ConfigError::Parse {
            name: "real",
            value: self.real.clone()
        })?;

        let imag = parse_arbitrary(&self.imag, bits).ok_or_else(|| ConfigError::Parse {
            name: "imag",
            value: self.imag.clone()
        })?;

        Ok(ComplexArbitrary::with_val(bits, (real, imag)))
    }

    fn parse_width(&self, digits: usize) -> Result<FloatExtended, ConfigError> {
        let width = parse_arbitrary(&self.width, digits_to_bits(digits))
            .map(|width| float_to_extended(&width))
            .ok_or_else(|| ConfigError::Parse {
                name: "width",
                value: self.width.clone()
            })?;

        if !(width > FloatExtended::zero()) {
            return Err(ConfigError::Parse {
                name: "width",
                value: self.width.clone()
            });
        }

        Ok(width)
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            name,
            value
        })
    }
}

/// Settings after validation, with coordinates parsed at the working precision.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub run_name: String,
    pub output_directory: PathBuf,
    pub viewport: Viewport,
    pub precision_digits: usize,
    pub maximum_iteration: usize,
    pub escape_radius: f64,
    pub fractal_type: FractalType,
    pub approximation: Approximation,
    pub interior_detection: bool,
    pub stationary_epsilon: f64,
    pub rebasing: bool,
    pub layout: ChunkLayout,
    pub threads: Option<usize>,
    pub catalogue: FieldCatalogue,
    pub series: SeriesSettings,
    pub bilinear: BilinearSettings,
    pub glitch: GlitchSettings,
}

impl ValidatedSettings {
    #[inline]
    pub fn precision_bits(&self) -> u32 {
        self.viewport.precision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let validated = EngineSettings::default().validate().unwrap();

        assert_eq!(validated.precision_digits, 30);
        assert_eq!(validated.layout.len(), 10 * 6);
        assert_eq!(validated.catalogue.names(), vec!["zn", "stop_iter", "stop_reason", "reference"]);
    }

    #[test]
    fn toml_overrides_nested_values() {
        let settings = EngineSettings::from_toml(r#"
            image_width = 32
            fractal_type = "mandelbrot"
            power = 3
            approximation = "bilinear"

            [glitch]
            maximum_rounds = 3
        "#).unwrap();

        assert_eq!(settings.image_width, 32);
        assert_eq!(settings.image_height, 360);
        assert_eq!(settings.fractal_type, FractalFamily::Mandelbrot);
        assert_eq!(settings.validate().unwrap().fractal_type, FractalType::Mandelbrot3);
        assert_eq!(settings.approximation, Approximation::Bilinear);
        assert_eq!(settings.glitch.maximum_rounds, 3);
        assert_eq!(settings.glitch.maximum_references, 8);
    }

    #[test]
    fn precision_escalates_or_fails() {
        let mut settings = EngineSettings {
            width: "1E-60".to_owned(),
            precision: 20,
            ..EngineSettings::default()
        };

        let validated = settings.validate().unwrap();
        assert!(validated.precision_digits >= 60);
        assert!(validated.precision_bits() >= digits_to_bits(60));

        settings.auto_precision = false;

        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InsufficientPrecision { available: 20, .. })));
    }

    #[test]
    fn bad_values_are_configuration_errors() {
        let cases = vec![
            EngineSettings { image_width: 0, ..EngineSettings::default() },
            EngineSettings { escape_radius: -2.0, ..EngineSettings::default() },
            EngineSettings { precision: 0, ..EngineSettings::default() },
            EngineSettings { precision: 100_001, ..EngineSettings::default() },
            EngineSettings { real: "one".to_owned(), ..EngineSettings::default() },
            EngineSettings { width: "-1".to_owned(), ..EngineSettings::default() },
            EngineSettings { fields: vec!["dzndz".to_owned()], interior_detection: false, ..EngineSettings::default() },
            EngineSettings { power: 1, ..EngineSettings::default() },
            EngineSettings { fractal_type: FractalFamily::BurningShip, power: 3, ..EngineSettings::default() },
        ];

        for settings in cases {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn escape_radius_must_keep_orbits_escaped() {
        let settings = EngineSettings {
            escape_radius: 1.5,
            ..EngineSettings::default()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EscapeRadius { minimum, .. }) if minimum == 2.0));

        // higher powers escape from a smaller radius
        let settings = EngineSettings {
            escape_radius: 1.5,
            power: 3,
            ..EngineSettings::default()
        };

        assert!(settings.validate().is_ok());

        let settings = EngineSettings {
            escape_radius: 1.2,
            power: 3,
            ..EngineSettings::default()
        };

        assert!(matches!(settings.validate(), Err(ConfigError::EscapeRadius { .. })));
    }

    #[test]
    fn higher_powers_and_burning_ship() {
        let settings = EngineSettings {
            power: 5,
            ..EngineSettings::default()
        };

        let validated = settings.validate().unwrap();
        assert_eq!(validated.fractal_type, FractalType::Multibrot(5));
        assert_eq!(validated.approximation, Approximation::SeriesBilinear);

        let settings = EngineSettings::from_toml(r#"
            fractal_type = "burning_ship"
        "#).unwrap();

        let validated = settings.validate().unwrap();
        assert_eq!(validated.fractal_type, FractalType::BurningShip);
        assert_eq!(validated.approximation, Approximation::None);

        let settings = EngineSettings {
            fractal_type: FractalFamily::BurningShip,
            fields: vec!["dzndc".to_owned()],
            ..EngineSettings::default()
        };

        assert!(matches!(settings.validate(), Err(ConfigError::FieldRequirement { .. })));
    }
}
