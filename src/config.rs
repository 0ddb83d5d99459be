use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SceneSection {
    pub particle_count: usize,
    pub particle_chaos_radius: f32,
    /// Min/max of the per-particle size attribute.
    pub particle_size: [f32; 2],
    pub ornament_chaos_radius: f32,
    /// Fixed seed for the formation generator; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SceneSection {
    fn default() -> Self {
        Self {
            particle_count: 4000,
            particle_chaos_radius: 30.0,
            particle_size: [0.6, 1.4],
            ornament_chaos_radius: 25.0,
            seed: None,
        }
    }
}

/// Cone the formed tree is built on.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeShape {
    pub height: f32,
    pub base_y: f32,
    pub base_radius: f32,
    /// Radians of spiral advance per particle index.
    pub spiral_step: f32,
}

impl Default for TreeShape {
    fn default() -> Self {
        Self {
            height: 14.0,
            base_y: -6.0,
            base_radius: 6.0,
            spiral_step: 2.399_963,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct OrnamentClass {
    pub count: usize,
    /// Multiplier on the cone radius; separates the classes into nested shells.
    pub radius_scale: f32,
    /// Per-tick approach rate toward the blended destination.
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "OrnamentsToml")]
pub struct OrnamentsConfig {
    pub gifts: OrnamentClass,
    pub baubles: OrnamentClass,
    pub lights: OrnamentClass,
    pub cards: OrnamentClass,
}

impl Default for OrnamentsConfig {
    fn default() -> Self {
        Self {
            gifts: OrnamentClass {
                count: 50,
                radius_scale: 0.55,
                speed: 0.02,
            },
            baubles: OrnamentClass {
                count: 150,
                radius_scale: 0.85,
                speed: 0.04,
            },
            lights: OrnamentClass {
                count: 300,
                radius_scale: 1.05,
                speed: 0.06,
            },
            cards: OrnamentClass {
                count: 30,
                radius_scale: 0.95,
                speed: 0.03,
            },
        }
    }
}

/// On-disk form of `[ornaments.*]`: any key may be omitted and falls back to
/// that class's own default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrnamentsToml {
    gifts: ClassToml,
    baubles: ClassToml,
    lights: ClassToml,
    cards: ClassToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClassToml {
    count: Option<usize>,
    radius_scale: Option<f32>,
    speed: Option<f32>,
}

impl ClassToml {
    fn or(self, d: OrnamentClass) -> OrnamentClass {
        OrnamentClass {
            count: self.count.unwrap_or(d.count),
            radius_scale: self.radius_scale.unwrap_or(d.radius_scale),
            speed: self.speed.unwrap_or(d.speed),
        }
    }
}

impl From<OrnamentsToml> for OrnamentsConfig {
    fn from(t: OrnamentsToml) -> Self {
        let d = Self::default();
        Self {
            gifts: t.gifts.or(d.gifts),
            baubles: t.baubles.or(d.baubles),
            lights: t.lights.or(d.lights),
            cards: t.cards.or(d.cards),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub blend_lerp: f32,
    /// Tick rate the per-tick rates are expressed at.
    pub reference_hz: f32,
    pub camera_anchor: [f32; 3],
    pub camera_sensitivity: [f32; 2],
    pub camera_follow_rate: f32,
    pub camera_recenter_rate: f32,
    /// Radians per second while no hand is present.
    pub auto_rotate_speed: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            blend_lerp: 0.05,
            reference_hz: 60.0,
            camera_anchor: [0.0, 4.0, 20.0],
            camera_sensitivity: [12.0, 6.0],
            camera_follow_rate: 0.05,
            camera_recenter_rate: 0.2,
            auto_rotate_speed: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CarouselConfig {
    pub inspect_distance: f32,
    pub inspect_side_offset: f32,
    pub inspect_yaw: f32,
    pub inspect_scale: f32,
    pub inspect_rate: f32,
    pub sway_amplitude: f32,
    pub pop_scale: f32,
    pub pop_delay: f32,
    pub pop_stagger: f32,
    pub max_uploads: usize,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            inspect_distance: 6.0,
            inspect_side_offset: 3.0,
            inspect_yaw: -0.35,
            inspect_scale: 2.5,
            inspect_rate: 0.1,
            sway_amplitude: 0.08,
            pop_scale: 1.8,
            pop_delay: 0.35,
            pop_stagger: 0.1,
            max_uploads: 5,
        }
    }
}

/// Classifier coefficients. Empirically tuned, kept here for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    pub finger_straight_ratio: f32,
    pub thumb_palm_ratio: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            finger_straight_ratio: 1.0,
            thumb_palm_ratio: 1.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Program and arguments of the landmark producer. Empty means none.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PhotosConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub target_fps: f32,
    pub max_catch_up: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_catch_up: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SceneConfig {
    pub scene: SceneSection,
    pub tree: TreeShape,
    pub ornaments: OrnamentsConfig,
    pub animation: AnimationConfig,
    pub carousel: CarouselConfig,
    pub classifier: Thresholds,
    pub sensor: SensorConfig,
    pub photos: PhotosConfig,
    pub render: RenderConfig,
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let dirs = UserDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok(dirs.home_dir().join(".config").join("treectl"))
}

fn default_config_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl SceneConfig {
    /// Loads `~/.config/treectl/config.toml`, writing the bundled default first if missing.
    pub fn load_or_install_default() -> Result<(Self, PathBuf), ConfigError> {
        let dir = config_dir()?;
        let path = dir.join("config.toml");
        if !path.exists() {
            fs::create_dir_all(&dir).map_err(|source| ConfigError::Read {
                path: dir.clone(),
                source,
            })?;
            fs::write(&path, default_config_text()).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            info!("installed default config at {}", path.display());
        }
        let cfg = Self::load(&path)?;
        Ok((cfg, path))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&txt).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("scene.particle_chaos_radius", self.scene.particle_chaos_radius)?;
        positive("scene.ornament_chaos_radius", self.scene.ornament_chaos_radius)?;
        let [lo, hi] = self.scene.particle_size;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(ConfigError::invalid(
                "scene.particle_size",
                format!("must be 0 < min <= max, got [{lo}, {hi}]"),
            ));
        }

        positive("tree.height", self.tree.height)?;
        positive("tree.base_radius", self.tree.base_radius)?;
        if !self.tree.base_y.is_finite() || !self.tree.spiral_step.is_finite() {
            return Err(ConfigError::invalid("tree", "base_y and spiral_step must be finite"));
        }

        let classes = [
            ("ornaments.gifts", &self.ornaments.gifts),
            ("ornaments.baubles", &self.ornaments.baubles),
            ("ornaments.lights", &self.ornaments.lights),
            ("ornaments.cards", &self.ornaments.cards),
        ];
        for (field, class) in classes {
            positive(field, class.radius_scale)?;
            rate(field, class.speed)?;
        }

        let a = &self.animation;
        rate("animation.blend_lerp", a.blend_lerp)?;
        positive("animation.reference_hz", a.reference_hz)?;
        rate("animation.camera_follow_rate", a.camera_follow_rate)?;
        rate("animation.camera_recenter_rate", a.camera_recenter_rate)?;
        if a.camera_anchor.iter().chain(&a.camera_sensitivity).any(|v| !v.is_finite())
            || !a.auto_rotate_speed.is_finite()
        {
            return Err(ConfigError::invalid("animation", "camera values must be finite"));
        }
        if a.camera_anchor[0] == 0.0 && a.camera_anchor[2] == 0.0 {
            return Err(ConfigError::invalid(
                "animation.camera_anchor",
                "must be off the vertical axis",
            ));
        }

        let c = &self.carousel;
        positive("carousel.inspect_scale", c.inspect_scale)?;
        positive("carousel.pop_scale", c.pop_scale)?;
        rate("carousel.inspect_rate", c.inspect_rate)?;
        if c.pop_delay < 0.0 || c.pop_stagger < 0.0 {
            return Err(ConfigError::invalid("carousel", "pop timings must be >= 0"));
        }

        positive("classifier.finger_straight_ratio", self.classifier.finger_straight_ratio)?;
        positive("classifier.thumb_palm_ratio", self.classifier.thumb_palm_ratio)?;

        positive("render.target_fps", self.render.target_fps)?;
        if self.render.max_catch_up == 0 {
            return Err(ConfigError::invalid("render.max_catch_up", "must be at least 1"));
        }
        Ok(())
    }
}

fn positive(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {v}")))
    }
}

fn rate(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be in (0, 1], got {v}")))
    }
}
