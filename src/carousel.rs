use glam::{EulerRot, Mat3, Quat, Vec3};
use log::{debug, warn};
use serde::Serialize;
use std::{fs, path::Path};

use crate::animation::{CameraPose, advance_ornament, approach};
use crate::config::CarouselConfig;
use crate::error::ImageError;
use crate::formation::OrnamentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

/// Encoded photo handed to the renderer; decoding to pixels happens there.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoTexture {
    pub name: String,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl PhotoTexture {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        let format = ImageFormat::sniff(&data).ok_or(ImageError::UnknownFormat)?;
        Ok(Self {
            name: name.into(),
            format,
            data,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let data = fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardFace {
    Placeholder { label: String },
    Photo(PhotoTexture),
}

impl CardFace {
    pub fn placeholder(index: usize) -> Self {
        Self::Placeholder {
            label: format!("Memory {}", index + 1),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoCard {
    pub ornament: OrnamentRecord,
    face: CardFace,
    /// Bumped on every face change so the renderer knows to re-upload.
    face_revision: u64,
    scale: f32,
    rotation: Quat,
    /// Elapsed time until which the pop scale is held.
    pop_until: Option<f32>,
}

impl PhotoCard {
    pub fn face(&self) -> &CardFace {
        &self.face
    }

    pub fn face_revision(&self) -> u64 {
        self.face_revision
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardTransform {
    pub index: usize,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
    pub inspecting: bool,
    pub face_revision: u64,
}

/// Outcome of one upload request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadReport {
    pub applied: Vec<usize>,
    pub failed: Vec<(usize, String)>,
    pub ignored: usize,
}

/// Per-tick inputs shared by every card.
#[derive(Debug, Clone, Copy)]
pub struct CardTick<'a> {
    pub inspecting: Option<usize>,
    pub blend_factor: f32,
    pub camera: &'a CameraPose,
    pub elapsed: f32,
    pub ambient_rate: f32,
    pub inspect_rate: f32,
}

#[derive(Debug, Clone)]
pub struct Carousel {
    cards: Vec<PhotoCard>,
    cfg: CarouselConfig,
}

impl Carousel {
    pub fn new(ornaments: Vec<OrnamentRecord>, cfg: CarouselConfig) -> Self {
        let cards = ornaments
            .into_iter()
            .enumerate()
            .map(|(i, ornament)| PhotoCard {
                ornament,
                face: CardFace::placeholder(i),
                face_revision: 0,
                scale: 1.0,
                rotation: Quat::IDENTITY,
                pop_until: None,
            })
            .collect();
        Self { cards, cfg }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[PhotoCard] {
        &self.cards
    }

    pub fn cards_mut(&mut self) -> &mut [PhotoCard] {
        &mut self.cards
    }

    /// Assigns image `i` to card `i`. Failed images leave the card's face as it was.
    pub fn upload(&mut self, images: Vec<Result<PhotoTexture, ImageError>>, now: f32) -> UploadReport {
        let limit = self.cfg.max_uploads.min(self.cards.len());
        let mut report = UploadReport {
            ignored: images.len().saturating_sub(limit),
            ..UploadReport::default()
        };
        for (i, image) in images.into_iter().take(limit).enumerate() {
            match image {
                Ok(texture) => {
                    debug!("card {i}: new photo '{}' ({:?})", texture.name, texture.format);
                    let pop_until = now + self.cfg.pop_delay + i as f32 * self.cfg.pop_stagger;
                    let card = &mut self.cards[i];
                    card.face = CardFace::Photo(texture);
                    card.face_revision += 1;
                    card.scale = self.cfg.pop_scale;
                    card.pop_until = Some(pop_until);
                    report.applied.push(i);
                }
                Err(e) => {
                    warn!("card {i}: keeping previous face, image rejected: {e}");
                    report.failed.push((i, e.to_string()));
                }
            }
        }
        if report.ignored > 0 {
            warn!("upload: ignored {} image(s) beyond the first {limit}", report.ignored);
        }
        report
    }

    pub fn update(&mut self, tick: &CardTick<'_>) {
        let cfg = &self.cfg;
        for (i, card) in self.cards.iter_mut().enumerate() {
            let (target_scale, rate) = if tick.inspecting == Some(i) {
                let cam = tick.camera;
                let pose = cam.position + cam.forward * cfg.inspect_distance + cam.right * cfg.inspect_side_offset;
                card.ornament.current_position = card.ornament.current_position.lerp(pose, tick.inspect_rate);
                card.rotation = facing(card.ornament.current_position, cam) * Quat::from_rotation_y(cfg.inspect_yaw);
                (cfg.inspect_scale, tick.inspect_rate)
            } else {
                advance_ornament(&mut card.ornament, tick.blend_factor, tick.ambient_rate);
                card.rotation = facing(card.ornament.current_position, tick.camera) * sway(i, tick.elapsed, cfg.sway_amplitude);
                (1.0, tick.ambient_rate)
            };

            match card.pop_until {
                Some(until) if tick.elapsed < until => card.scale = cfg.pop_scale,
                _ => {
                    card.pop_until = None;
                    card.scale = approach(card.scale, target_scale, rate);
                }
            }
        }
    }

    pub fn transforms(&self, inspecting: Option<usize>) -> Vec<CardTransform> {
        self.cards
            .iter()
            .enumerate()
            .map(|(i, c)| CardTransform {
                index: i,
                position: c.ornament.current_position,
                rotation: c.rotation,
                scale: c.scale,
                inspecting: inspecting == Some(i),
                face_revision: c.face_revision,
            })
            .collect()
    }
}

/// Orientation whose +Z points from `position` at the camera.
fn facing(position: Vec3, cam: &CameraPose) -> Quat {
    let z = (cam.position - position).normalize_or_zero();
    let x = Vec3::Y.cross(z).normalize_or_zero();
    if z == Vec3::ZERO || x == Vec3::ZERO {
        return cam.rotation;
    }
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z))
}

fn sway(index: usize, elapsed: f32, amplitude: f32) -> Quat {
    let phase = index as f32;
    Quat::from_euler(
        EulerRot::XYZ,
        (elapsed + phase).sin() * amplitude,
        0.0,
        (elapsed * 0.8 + phase).cos() * amplitude,
    )
}
