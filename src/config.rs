//! Configuration management for faceswap

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::COLOUR_CORRECT_BLUR_FRAC;
use crate::error::FaceSwapError;
use crate::mask::DEFAULT_FEATHER_AMOUNT;

/// Alignment, masking and colour settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapConfig {
    /// Kernel extent of the mask feathering blur (odd)
    #[serde(default = "default_feather_amount")]
    pub feather_amount: u32,

    /// Fraction of the eye separation used as colour-correction blur extent
    #[serde(default = "default_blur_frac")]
    pub colour_correct_blur_frac: f64,
}

fn default_feather_amount() -> u32 { DEFAULT_FEATHER_AMOUNT }
fn default_blur_frac() -> f64 { COLOUR_CORRECT_BLUR_FRAC }
fn default_jpeg_quality() -> u8 { 95 }

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            feather_amount: DEFAULT_FEATHER_AMOUNT,
            colour_correct_blur_frac: COLOUR_CORRECT_BLUR_FRAC,
        }
    }
}

/// Output encoding settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// JPEG quality (1-100), used when the output path ends in .jpg/.jpeg
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub swap: SwapConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a file, or use defaults if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No configuration at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Rejected config from {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), FaceSwapError> {
        let feather = self.swap.feather_amount;
        if feather == 0 || feather % 2 == 0 {
            return Err(FaceSwapError::InvalidConfig(format!(
                "feather_amount must be odd and positive, got {}",
                feather
            )));
        }
        let frac = self.swap.colour_correct_blur_frac;
        if !(frac.is_finite() && frac > 0.0) {
            return Err(FaceSwapError::InvalidConfig(format!(
                "colour_correct_blur_frac must be positive, got {}",
                frac
            )));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(FaceSwapError::InvalidConfig(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.output.jpeg_quality
            )));
        }
        Ok(())
    }
}
