use std::collections::HashMap;
use std::sync::Arc;

use smart_leds::RGB8;

use crate::animation::AnimationInstance;
use crate::bitmap::BitmapReader;
use crate::builtin::builtin_animations;
use crate::config::{BitmapConfig, BitmapKindConfig, Configuration, GroupConfig, SequenceConfig};
use crate::error::{BitmapError, RegistryError};
use crate::ids::create_id;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// One resolved sequence step.
#[derive(Debug, Clone)]
pub struct SequenceStep {
    pub animation: Arc<AnimationInstance>,
    pub delay_ms: u16,
    pub color: RGB8,
    pub reversed: bool,
    /// Completed cycles before moving on; at least 1.
    pub repeat_count: u16,
    pub one_shot: bool,
}

#[derive(Debug)]
pub struct AnimationSequence {
    pub id: u16,
    pub name: String,
    pub steps: Vec<SequenceStep>,
}

#[derive(Debug)]
pub struct BitmapInstance {
    pub id: u16,
    pub config: BitmapConfig,
    pub frame_count: u16,
}

impl BitmapInstance {
    pub fn name(&self) -> &str {
        &self.config.id
    }

    /// Frame period for animated bitmaps.
    pub fn frame_delay_ms(&self) -> Option<u16> {
        match self.config.kind {
            BitmapKindConfig::Static => None,
            BitmapKindConfig::Animated { frame_delay } => Some(frame_delay),
        }
    }
}

#[derive(Debug)]
pub struct AnimationGroup {
    pub id: u16,
    pub name: String,
    pub zones: Vec<u16>,
}

/// Immutable lookup tables shared by every task after boot.
#[derive(Debug, Default)]
pub struct AnimationRegistry {
    animations: HashMap<u16, Arc<AnimationInstance>>,
    sequences: HashMap<u16, Arc<AnimationSequence>>,
    bitmaps: HashMap<u16, Arc<BitmapInstance>>,
    groups: HashMap<u16, Arc<AnimationGroup>>,
}

impl AnimationRegistry {
    pub fn animation(&self, id: u16) -> Option<&Arc<AnimationInstance>> {
        self.animations.get(&id)
    }

    pub fn animation_by_name(&self, name: &str) -> Option<&Arc<AnimationInstance>> {
        self.animation(create_id(name))
    }

    pub fn sequence(&self, id: u16) -> Option<&Arc<AnimationSequence>> {
        self.sequences.get(&id)
    }

    pub fn bitmap(&self, id: u16) -> Option<&Arc<BitmapInstance>> {
        self.bitmaps.get(&id)
    }

    pub fn group(&self, id: u16) -> Option<&Arc<AnimationGroup>> {
        self.groups.get(&id)
    }

    pub fn animations(&self) -> impl Iterator<Item = &Arc<AnimationInstance>> {
        self.animations.values()
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Arc<AnimationSequence>> {
        self.sequences.values()
    }

    pub fn bitmaps(&self) -> impl Iterator<Item = &Arc<BitmapInstance>> {
        self.bitmaps.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Arc<AnimationGroup>> {
        self.groups.values()
    }
}

/// Append-only registration before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    inner: AnimationRegistry,
}

fn insert_unique<T>(
    map: &mut HashMap<u16, Arc<T>>,
    kind: &'static str,
    name: &str,
    value: T,
) -> Result<u16> {
    let id = create_id(name);
    if map.contains_key(&id) {
        return Err(RegistryError::DuplicateId {
            kind,
            name: name.to_string(),
            id,
        });
    }
    map.insert(id, Arc::new(value));
    Ok(id)
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder preloaded with the built-in animations.
    pub fn with_builtins() -> Self {
        let mut builder = Self::new();
        for animation in builtin_animations() {
            let id = animation.id;
            builder.inner.animations.insert(id, Arc::new(animation));
        }
        builder
    }

    pub fn register_animation(&mut self, animation: AnimationInstance) -> Result<u16> {
        let name = animation.name.clone();
        insert_unique(&mut self.inner.animations, "animation", &name, animation)
    }

    pub fn register_sequence(&mut self, config: &SequenceConfig) -> Result<u16> {
        if config.steps.is_empty() {
            return Err(RegistryError::EmptySequence(config.id.clone()));
        }
        let steps = config
            .steps
            .iter()
            .map(|step| -> Result<SequenceStep> {
                let animation = self
                    .inner
                    .animation_by_name(&step.id)
                    .cloned()
                    .ok_or_else(|| RegistryError::UnknownAnimation {
                        sequence: config.id.clone(),
                        animation: step.id.clone(),
                    })?;
                Ok(SequenceStep {
                    color: step.color.map_or(animation.default_color, RGB8::from),
                    animation,
                    delay_ms: step.delay,
                    reversed: step.reversed,
                    repeat_count: u16::from(step.repeat_count.unwrap_or(1).max(1)),
                    one_shot: step.one_shot,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sequence = AnimationSequence {
            id: create_id(&config.id),
            name: config.id.clone(),
            steps,
        };
        insert_unique(&mut self.inner.sequences, "sequence", &config.id, sequence)
    }

    pub fn register_bitmap(&mut self, config: &BitmapConfig, frame_count: u16) -> Result<u16> {
        let bitmap = BitmapInstance {
            id: create_id(&config.id),
            config: config.clone(),
            frame_count: frame_count.max(1),
        };
        insert_unique(&mut self.inner.bitmaps, "bitmap", &config.id, bitmap)
    }

    pub fn register_group(&mut self, config: &GroupConfig) -> Result<u16> {
        let group = AnimationGroup {
            id: create_id(&config.id),
            name: config.id.clone(),
            zones: config.zone_ids.iter().map(|z| create_id(z)).collect(),
        };
        insert_unique(&mut self.inner.groups, "group", &config.id, group)
    }

    /// Register everything a configuration declares.
    ///
    /// Bitmaps whose frames cannot be found are skipped and returned; any
    /// other problem aborts registration.
    pub fn register_configuration(
        &mut self,
        config: &Configuration,
        bitmaps: &dyn BitmapReader,
    ) -> Result<Vec<(String, BitmapError)>> {
        for sequence in &config.sequences {
            self.register_sequence(sequence)?;
        }

        let mut skipped = Vec::new();
        for bitmap in &config.bitmaps {
            match bitmaps.frame_count(bitmap) {
                Ok(frames) => {
                    self.register_bitmap(bitmap, frames)?;
                }
                Err(err) => {
                    tracing::warn!(bitmap = %bitmap.id, error = %err, "bitmap unavailable, skipped");
                    skipped.push((bitmap.id.clone(), err));
                }
            }
        }

        for group in &config.animation_groups {
            self.register_group(group)?;
        }
        Ok(skipped)
    }

    pub fn build(self) -> Arc<AnimationRegistry> {
        tracing::debug!(
            animations = self.inner.animations.len(),
            sequences = self.inner.sequences.len(),
            bitmaps = self.inner.bitmaps.len(),
            groups = self.inner.groups.len(),
            "animation registry frozen"
        );
        Arc::new(self.inner)
    }
}
