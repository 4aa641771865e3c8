//! Output/display management
//!
//! Tracks displays, where they sit in the shared layout, their usable
//! area and which layer surfaces live on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};

use crate::compositor::error::OutputError;
use crate::compositor::geometry::{Point, Rect};
use crate::compositor::layer::Band;
use crate::compositor::LayerId;

/// Unique identifier for outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

impl OutputId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        OutputId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An output mode (resolution + refresh rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Refresh rate in mHz (e.g., 60000 for 60Hz)
    pub refresh: i32,
    /// Is this the preferred mode?
    pub preferred: bool,
}

/// What the backend reports about a newly connected display
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    /// Connector name (e.g., "eDP-1")
    pub name: String,
    pub make: String,
    pub model: String,
    /// Physical size in millimeters
    pub physical_size: (i32, i32),
    pub modes: Vec<OutputMode>,
    pub scale: f64,
}

impl OutputDescriptor {
    pub fn new(name: impl Into<String>, modes: Vec<OutputMode>) -> Self {
        Self {
            name: name.into(),
            make: String::new(),
            model: String::new(),
            physical_size: (0, 0),
            modes,
            scale: 1.0,
        }
    }
}

/// A display output (monitor)
#[derive(Debug)]
pub struct Output {
    pub id: OutputId,
    /// Output name (e.g., "eDP-1")
    pub name: String,
    pub make: String,
    pub model: String,
    pub physical_size: (i32, i32),
    /// Position in the layout
    pub position: Point,
    pub modes: Vec<OutputMode>,
    pub current_mode: usize,
    pub scale: f64,
    /// Layout geometry minus space reserved by layer surfaces
    pub usable_area: Rect,
    layers: [Vec<LayerId>; 4],
}

impl Output {
    fn from_descriptor(desc: OutputDescriptor, current_mode: usize, position: Point) -> Self {
        let mut output = Self {
            id: OutputId::new(),
            name: desc.name,
            make: desc.make,
            model: desc.model,
            physical_size: desc.physical_size,
            position,
            modes: desc.modes,
            current_mode,
            scale: if desc.scale > 0.0 { desc.scale } else { 1.0 },
            usable_area: Rect::default(),
            layers: Default::default(),
        };
        output.usable_area = output.geometry();
        output
    }

    pub fn current_mode(&self) -> Option<&OutputMode> {
        self.modes.get(self.current_mode)
    }

    /// Full layout box of this output
    pub fn geometry(&self) -> Rect {
        let (w, h) = self
            .current_mode()
            .map(|m| (m.width, m.height))
            .unwrap_or((0, 0));
        Rect::new(
            self.position.x,
            self.position.y,
            (w as f64 / self.scale).round() as i32,
            (h as f64 / self.scale).round() as i32,
        )
    }

    /// Layers on this output in one band, bottom to top
    pub fn layers(&self, band: Band) -> &[LayerId] {
        &self.layers[band.index()]
    }

    pub fn add_layer(&mut self, band: Band, layer: LayerId) {
        let list = &mut self.layers[band.index()];
        if !list.contains(&layer) {
            list.push(layer);
        }
    }

    pub fn remove_layer(&mut self, layer: LayerId) {
        for list in &mut self.layers {
            list.retain(|l| *l != layer);
        }
    }

    /// Move a layer's membership from one band list to another
    pub fn move_layer(&mut self, layer: LayerId, to: Band) {
        self.remove_layer(layer);
        self.add_layer(to, layer);
    }

    /// Every layer on this output, bands background to overlay
    pub fn all_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.iter().flatten().copied()
    }
}

/// Pick the mode to drive a new output with: preferred, else first
fn choose_mode(modes: &[OutputMode]) -> Option<usize> {
    modes
        .iter()
        .position(|m| m.preferred)
        .or(if modes.is_empty() { None } else { Some(0) })
}

/// Outcome of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub id: OutputId,
    /// This is the first output in the layout
    pub first: bool,
}

/// Manager for all outputs
#[derive(Debug, Default)]
pub struct OutputManager {
    outputs: HashMap<OutputId, Output>,
    /// Layout order; the head is the primary output
    order: Vec<OutputId>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new display to the layout, right of every existing one
    pub fn register(&mut self, desc: OutputDescriptor) -> Result<Registered, OutputError> {
        if self.outputs.values().any(|o| o.name == desc.name) {
            return Err(OutputError::AlreadyRegistered(desc.name));
        }
        let mode = choose_mode(&desc.modes).ok_or_else(|| OutputError::NoMode(desc.name.clone()))?;

        let x = self
            .outputs
            .values()
            .map(|o| o.geometry().right())
            .max()
            .unwrap_or(0);
        let output = Output::from_descriptor(desc, mode, Point::new(x, 0));
        let id = output.id;
        let first = self.order.is_empty();

        info!(
            "Output {} added at {:?} ({:?})",
            output.name,
            output.geometry(),
            output.current_mode()
        );
        self.outputs.insert(id, output);
        self.order.push(id);

        Ok(Registered { id, first })
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn get_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.get_mut(&id)
    }

    pub fn remove(&mut self, id: OutputId) -> Option<Output> {
        let output = self.outputs.remove(&id)?;
        self.order.retain(|o| *o != id);
        debug!("Output {} removed from layout", output.name);
        Some(output)
    }

    /// The primary output
    pub fn primary(&self) -> Option<OutputId> {
        self.order.first().copied()
    }

    /// Reverse lookup through the layout
    pub fn output_at(&self, x: f64, y: f64) -> Option<OutputId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.outputs[id].geometry().contains_f64(x, y))
    }

    /// Output containing a point, falling back to the primary output
    pub fn output_at_or_primary(&self, x: f64, y: f64) -> Option<OutputId> {
        self.output_at(x, y).or_else(|| self.primary())
    }

    /// Nearest point inside the layout, used to keep the cursor on screen
    pub fn clamp_to_layout(&self, x: f64, y: f64) -> (f64, f64) {
        if self.order.is_empty() || self.output_at(x, y).is_some() {
            return (x, y);
        }
        let mut best = (x, y);
        let mut best_dist = f64::MAX;
        for output in self.order.iter().map(|id| &self.outputs[id]) {
            let g = output.geometry();
            let cx = x.clamp(g.x as f64, (g.right() - 1).max(g.x) as f64);
            let cy = y.clamp(g.y as f64, (g.bottom() - 1).max(g.y) as f64);
            let dist = (cx - x).powi(2) + (cy - y).powi(2);
            if dist < best_dist {
                best_dist = dist;
                best = (cx, cy);
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = &Output> {
        self.order.iter().map(|id| &self.outputs[id])
    }

    pub fn ids(&self) -> Vec<OutputId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_descriptor(name: &str, width: i32, height: i32) -> OutputDescriptor {
    OutputDescriptor::new(
        name,
        vec![OutputMode {
            width,
            height,
            refresh: 60000,
            preferred: true,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_id_unique() {
        let id1 = OutputId::new();
        let id2 = OutputId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_first_output_flag_and_auto_layout() {
        let mut manager = OutputManager::new();
        let a = manager.register(test_descriptor("A", 1920, 1080)).unwrap();
        let b = manager.register(test_descriptor("B", 1280, 1024)).unwrap();
        assert!(a.first);
        assert!(!b.first);

        assert_eq!(manager.get(a.id).unwrap().geometry(), Rect::new(0, 0, 1920, 1080));
        assert_eq!(manager.get(b.id).unwrap().geometry(), Rect::new(1920, 0, 1280, 1024));
        assert_eq!(manager.primary(), Some(a.id));
    }

    #[test]
    fn test_mode_selection_prefers_preferred() {
        let mut manager = OutputManager::new();
        let mut desc = test_descriptor("A", 1024, 768);
        desc.modes.insert(
            0,
            OutputMode {
                width: 640,
                height: 480,
                refresh: 60000,
                preferred: false,
            },
        );
        let reg = manager.register(desc).unwrap();
        assert_eq!(manager.get(reg.id).unwrap().geometry().width, 1024);

        let mut no_pref = test_descriptor("B", 800, 600);
        no_pref.modes[0].preferred = false;
        let reg = manager.register(no_pref).unwrap();
        assert_eq!(manager.get(reg.id).unwrap().geometry().width, 800);
    }

    #[test]
    fn test_registration_failures() {
        let mut manager = OutputManager::new();
        let err = manager
            .register(OutputDescriptor::new("broken", Vec::new()))
            .unwrap_err();
        assert_eq!(err, OutputError::NoMode("broken".to_string()));
        assert!(manager.is_empty());

        manager.register(test_descriptor("A", 100, 100)).unwrap();
        assert!(matches!(
            manager.register(test_descriptor("A", 100, 100)),
            Err(OutputError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_output_at_and_clamp() {
        let mut manager = OutputManager::new();
        let a = manager.register(test_descriptor("A", 100, 100)).unwrap();
        let b = manager.register(test_descriptor("B", 100, 50)).unwrap();

        assert_eq!(manager.output_at(50.0, 50.0), Some(a.id));
        assert_eq!(manager.output_at(150.0, 20.0), Some(b.id));
        assert_eq!(manager.output_at(150.0, 80.0), None);
        assert_eq!(manager.output_at_or_primary(150.0, 80.0), Some(a.id));

        assert_eq!(manager.clamp_to_layout(-10.0, 20.0), (0.0, 20.0));
        assert_eq!(manager.clamp_to_layout(250.0, 10.0), (199.0, 10.0));
    }

    #[test]
    fn test_layer_membership() {
        let mut manager = OutputManager::new();
        let reg = manager.register(test_descriptor("A", 100, 100)).unwrap();
        let output = manager.get_mut(reg.id).unwrap();

        output.add_layer(Band::Top, LayerId(1));
        output.add_layer(Band::Top, LayerId(1));
        output.add_layer(Band::Background, LayerId(2));
        assert_eq!(output.layers(Band::Top), &[LayerId(1)]);

        output.move_layer(LayerId(1), Band::Overlay);
        assert!(output.layers(Band::Top).is_empty());
        assert_eq!(output.layers(Band::Overlay), &[LayerId(1)]);
        assert_eq!(output.all_layers().collect::<Vec<_>>(), vec![LayerId(2), LayerId(1)]);

        output.remove_layer(LayerId(1));
        assert_eq!(output.all_layers().count(), 1);
    }
}
