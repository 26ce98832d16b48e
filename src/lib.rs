pub mod error;
pub mod math;
pub mod renderer;
pub mod settings;
pub mod util;

pub use error::{ConfigError, RenderError, StoreError};
pub use math::FractalType;
pub use renderer::{FractalRenderer, PassStatistics, RenderSummary};
pub use settings::{Approximation, EngineSettings, FractalFamily, ValidatedSettings};
pub use util::{ResultReader, StopReason, Subset};
