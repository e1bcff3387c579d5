//! User project settings consumed by the display and input providers.
//!
//! Settings are normally stored as JSON. The legacy `Key: value` asset format
//! written by the editor integration is accepted as well.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming a settings file to load at startup.
pub const SETTINGS_ENV_VAR: &str = "VRBRIDGE_SETTINGS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoRenderingMode {
    #[default]
    MultiPass,
    SinglePassInstanced,
}

/// How the application registers with the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationType {
    #[default]
    Scene,
    /// Overlay apps never submit eye textures and use a fixed prediction.
    Overlay,
}

/// Which picture the desktop preview window shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorViewMode {
    None,
    LeftEye,
    #[default]
    RightEye,
    /// The runtime's own lens-distorted mirror texture.
    RuntimeView,
}

impl MirrorViewMode {
    pub fn from_index(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::LeftEye,
            2 => Self::RightEye,
            _ => Self::RuntimeView,
        }
    }

    pub fn index(self) -> u16 {
        match self {
            Self::None => 0,
            Self::LeftEye => 1,
            Self::RightEye => 2,
            Self::RuntimeView => 3,
        }
    }
}

/// How the synthetic center eye derives its linear velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterEyeVelocity {
    /// Mean of the left and right eye velocities.
    #[default]
    Averaged,
    /// Right eye velocity only, as older provider builds reported it.
    LegacyRightEye,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub stereo_rendering_mode: StereoRenderingMode,
    pub initialization_type: InitializationType,
    pub mirror_view_mode: MirrorViewMode,
    pub editor_app_key: String,
    pub action_manifest_path: String,
    pub application_name: String,
    pub center_eye_velocity: CenterEyeVelocity,
}

#[derive(Serialize)]
struct StartupInfo<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    app_key: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    app_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    action_manifest_path: &'a str,
}

impl ProviderSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a file. `.asset` files use the legacy line format,
    /// everything else is parsed as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = if path.extension().is_some_and(|ext| ext == "asset") {
            Self::from_asset_str(&text)?
        } else {
            Self::from_json(&text)?
        };
        tracing::info!(
            path = %path.display(),
            stereo = ?settings.stereo_rendering_mode,
            init = ?settings.initialization_type,
            mirror = ?settings.mirror_view_mode,
            "loaded provider settings"
        );
        Ok(settings)
    }

    /// Load from the file named by [`SETTINGS_ENV_VAR`], or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(SETTINGS_ENV_VAR) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse the editor's `Key: value` asset format. Unknown lines are ignored.
    pub fn from_asset_str(text: &str) -> Result<Self> {
        let mut settings = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "StereoRenderingMode" => {
                    settings.stereo_rendering_mode = match parse_index(key, value)? {
                        1 => StereoRenderingMode::SinglePassInstanced,
                        _ => StereoRenderingMode::MultiPass,
                    }
                }
                "InitializationType" => {
                    settings.initialization_type = match parse_index(key, value)? {
                        1 => InitializationType::Scene,
                        2 => InitializationType::Overlay,
                        other => {
                            return Err(Error::config(format!(
                                "unsupported application type {other}"
                            )))
                        }
                    }
                }
                "MirrorView" => {
                    settings.mirror_view_mode = MirrorViewMode::from_index(parse_index(key, value)?)
                }
                "EditorAppKey" => settings.editor_app_key = value.to_string(),
                "ActionManifestFileRelativeFilePath" => {
                    settings.action_manifest_path = value.to_string()
                }
                "ApplicationName" => settings.application_name = value.to_string(),
                _ => {}
            }
        }
        Ok(settings)
    }

    /// JSON handed to the runtime on init. Empty when there is nothing to report.
    pub fn startup_info(&self) -> Result<String> {
        let manifest = self.action_manifest_path.replace('\\', "/");
        let info = StartupInfo {
            app_key: &self.editor_app_key,
            app_name: &self.application_name,
            action_manifest_path: &manifest,
        };
        if info.app_key.is_empty() && info.app_name.is_empty() && info.action_manifest_path.is_empty()
        {
            return Ok(String::new());
        }
        Ok(serde_json::to_string_pretty(&info)?)
    }

    pub fn is_single_pass(&self) -> bool {
        self.stereo_rendering_mode == StereoRenderingMode::SinglePassInstanced
    }

    pub fn is_overlay(&self) -> bool {
        self.initialization_type == InitializationType::Overlay
    }
}

fn parse_index(key: &str, value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|e| Error::config(format!("{}: {value:?}: {e}", key.trim())))
}
