//! Status colour from `screencolor` controls.
//!
//! Controls tagged `screencolor: red|green|blue|white` contribute their
//! normalized value (scaled to 0..255) to one RGB channel, or to all three for
//! `white`.

use std::sync::Arc;

use polyvox_core::{ControlSurface, GroupKind, ParamDescriptor, ParamId};
use polyvox_voice::{VoicePool, VoiceScope};

/// Collects `screencolor` controls and reports the combined colour.
#[derive(Debug)]
pub struct StatusColor {
    pool: Arc<VoicePool>,
    red: Option<ParamId>,
    green: Option<ParamId>,
    blue: Option<ParamId>,
}

impl StatusColor {
    /// Creates an indicator with no channels.
    pub fn new(pool: Arc<VoicePool>) -> Self {
        Self {
            pool,
            red: None,
            green: None,
            blue: None,
        }
    }

    /// Returns `true` if any control is tagged.
    pub fn is_mapped(&self) -> bool {
        self.red.is_some() || self.green.is_some() || self.blue.is_some()
    }

    fn channel(&self, id: Option<ParamId>) -> i32 {
        let Some(id) = id else {
            return 0;
        };
        let table = self.pool.table();
        match (table.descriptor(id), self.pool.value(id, VoiceScope::Global)) {
            (Ok(desc), Ok(value)) => (desc.normalize(value) * 255.0).round() as i32,
            _ => 0,
        }
    }

    /// `(r << 16) | (g << 8) | b`, or -1 when no control is tagged.
    pub fn screen_color(&self) -> i32 {
        if !self.is_mapped() {
            return -1;
        }
        (self.channel(self.red) << 16) | (self.channel(self.green) << 8) | self.channel(self.blue)
    }
}

impl ControlSurface for StatusColor {
    fn open_group(&mut self, _kind: GroupKind, _label: &str) {}

    fn close_group(&mut self) {}

    fn add_control(&mut self, _label: &str, param: &ParamDescriptor) {
        let Some(color) = param.metadata("screencolor") else {
            return;
        };
        match color.trim() {
            "red" => self.red = Some(param.id),
            "green" => self.green = Some(param.id),
            "blue" => self.blue = Some(param.id),
            "white" => {
                self.red = Some(param.id);
                self.green = Some(param.id);
                self.blue = Some(param.id);
            }
            other => tracing::warn!(path = %param.path, color = other, "unknown screencolor"),
        }
    }
}
