//! Value model of the multi-marker gradient slider.
//!
//! The slider shows a colour gradient with one or more markers on it, each
//! marker standing for one value of a range or multi-point parameter. This
//! module holds everything except drawing and hit testing: marker positions
//! and their neighbour constraints, dragging, stepping with keys and scroll
//! wheel, reset, the colour picker readout, gradient stops and the postponed
//! change notification used while dragging.
//!
//! Positions are kept in the raw `[0, 1]` scale of the widget. A
//! [`SliderScale`] converts between raw positions and the values the owner
//! reads and writes.

use std::fmt;
use std::time::Duration;

/// Default step of keys, scroll and drag snapping.
pub const DEFAULT_INCREMENT: f64 = 0.01;
/// Largest number of markers on one slider.
pub const MAX_POSITIONS: usize = 10;

const VALUE_CHANGED_DELAY_MIN: u64 = 10;
const VALUE_CHANGED_DELAY_MAX: u64 = 50;
/// Stops closer than this are the same stop.
const STOP_TOLERANCE: f64 = 0.01;

/// Which edge of the slider a marker is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerSide {
    Upper,
    #[default]
    Lower,
    Double,
}

/// Shape of one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub side: MarkerSide,
    pub filled: bool,
    pub big: bool,
}

impl Default for Marker {
    fn default() -> Self {
        Self {
            side: MarkerSide::Lower,
            filled: true,
            big: false,
        }
    }
}

/// Straight RGBA colour of a gradient stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// One colour of the background gradient, at a raw position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stop {
    pub position: f64,
    pub color: Rgba,
}

/// Mapping between user values and raw slider positions.
pub trait SliderScale: Send + Sync {
    /// User value to raw position.
    fn to_raw(&self, value: f64) -> f64;
    /// Raw position to user value.
    fn from_raw(&self, raw: f64) -> f64;
}

/// Identity mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScale;

impl SliderScale for LinearScale {
    fn to_raw(&self, value: f64) -> f64 {
        value
    }

    fn from_raw(&self, raw: f64) -> f64 {
        raw
    }
}

/// Modifier held while stepping a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepModifier {
    #[default]
    Normal,
    /// Shift: larger steps.
    Rough,
    /// Control: smaller steps.
    Precise,
}

/// Scale factors applied to key and scroll steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMultipliers {
    pub normal: f64,
    pub rough: f64,
    pub precise: f64,
}

impl StepMultipliers {
    pub fn factor(&self, modifier: StepModifier) -> f64 {
        match modifier {
            StepModifier::Normal => self.normal,
            StepModifier::Rough => self.rough,
            StepModifier::Precise => self.precise,
        }
    }
}

impl Default for StepMultipliers {
    fn default() -> Self {
        Self {
            normal: 1.0,
            rough: 10.0,
            precise: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
}

/// Delay between change notifications while dragging, derived from the
/// average pipeline processing time.
pub fn postponed_delay(average_delay_ms: u64) -> Duration {
    let delay = average_delay_ms.saturating_mul(3) / 2;
    Duration::from_millis(delay.clamp(VALUE_CHANGED_DELAY_MIN, VALUE_CHANGED_DELAY_MAX))
}

/// State of a gradient slider with one or more markers.
pub struct GradientSlider {
    positions: Vec<f64>,
    reset_values: Vec<f64>,
    markers: Vec<Marker>,
    /// Mean, min and max of the colour picker, raw. NaN when unset.
    picker: [f64; 3],
    increment: f64,
    stops: Vec<Stop>,
    selected: Option<usize>,
    /// Marker under the pointer.
    active: Option<usize>,
    resettable: bool,
    dragging: bool,
    do_reset: bool,
    is_changed: bool,
    timer_armed: bool,
    scale: Box<dyn SliderScale>,
    multipliers: StepMultipliers,
    pending: usize,
}

impl GradientSlider {
    /// Creates a slider with `positions` markers, all at `0`.
    ///
    /// A single-marker slider starts with its marker selected.
    pub fn new(positions: usize) -> Self {
        let n = positions.clamp(1, MAX_POSITIONS);
        if n != positions {
            log::warn!("gradient slider with {positions} markers, using {n}");
        }
        Self {
            positions: vec![0.0; n],
            reset_values: vec![0.0; n],
            markers: vec![Marker::default(); n],
            picker: [f64::NAN; 3],
            increment: DEFAULT_INCREMENT,
            stops: Vec::new(),
            selected: if n == 1 { Some(0) } else { None },
            active: None,
            resettable: false,
            dragging: false,
            do_reset: false,
            is_changed: false,
            timer_armed: false,
            scale: Box::new(LinearScale),
            multipliers: StepMultipliers::default(),
            pending: 0,
        }
    }

    /// Creates a slider whose gradient runs from `start` to `end`.
    pub fn with_colors(start: Rgba, end: Rgba, positions: usize) -> Self {
        let mut slider = Self::new(positions);
        slider.stops = vec![
            Stop {
                position: 0.0,
                color: start,
            },
            Stop {
                position: 1.0,
                color: end,
            },
        ];
        slider
    }

    pub fn with_step_multipliers(mut self, multipliers: StepMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    /// Number of markers.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Raw marker positions.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Value of marker `k`, or `None` when out of range.
    pub fn value(&self, k: usize) -> Option<f64> {
        self.positions.get(k).map(|&raw| self.scale.from_raw(raw))
    }

    pub fn values(&self) -> Vec<f64> {
        self.positions
            .iter()
            .map(|&raw| self.scale.from_raw(raw))
            .collect()
    }

    /// Sets the value of marker `k` and notifies a change.
    pub fn set_value(&mut self, k: usize, value: f64) {
        let raw = self.scale.to_raw(value);
        let Some(position) = self.positions.get_mut(k) else {
            log::warn!("gradient slider has no marker {k}");
            return;
        };
        *position = raw;
        self.reset_selection();
        self.emit();
    }

    /// Sets all values at once; extra values are ignored.
    pub fn set_values(&mut self, values: &[f64]) {
        for (position, &value) in self.positions.iter_mut().zip(values) {
            *position = self.scale.to_raw(value);
        }
        self.reset_selection();
        self.emit();
    }

    pub fn marker(&self, k: usize) -> Option<Marker> {
        self.markers.get(k).copied()
    }

    pub fn set_marker(&mut self, k: usize, marker: Marker) {
        if let Some(slot) = self.markers.get_mut(k) {
            *slot = marker;
        }
    }

    pub fn set_markers(&mut self, markers: &[Marker]) {
        for (slot, &marker) in self.markers.iter_mut().zip(markers) {
            *slot = marker;
        }
    }

    pub fn reset_value(&self, k: usize) -> Option<f64> {
        self.reset_values
            .get(k)
            .map(|&raw| self.scale.from_raw(raw))
    }

    /// Sets the value marker `k` returns to on reset. Makes the slider
    /// resettable.
    pub fn set_reset_value(&mut self, k: usize, value: f64) {
        let raw = self.scale.to_raw(value);
        if let Some(slot) = self.reset_values.get_mut(k) {
            *slot = raw;
            self.resettable = true;
        }
    }

    pub fn set_reset_values(&mut self, values: &[f64]) {
        for (slot, &value) in self.reset_values.iter_mut().zip(values) {
            *slot = self.scale.to_raw(value);
        }
        self.resettable = true;
    }

    pub fn is_resettable(&self) -> bool {
        self.resettable
    }

    /// Raw picker readout: mean, min, max.
    pub fn picker(&self) -> [f64; 3] {
        self.picker
    }

    /// Shows a single picked value.
    pub fn set_picker(&mut self, value: f64) {
        self.picker = [self.scale.to_raw(value); 3];
    }

    pub fn set_picker_mean_min_max(&mut self, mean: f64, min: f64, max: f64) {
        self.picker = [
            self.scale.to_raw(mean),
            self.scale.to_raw(min),
            self.scale.to_raw(max),
        ];
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn set_increment(&mut self, increment: f64) {
        self.increment = increment;
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Sets the colour at `position`, updating an existing stop there or
    /// adding a new one.
    pub fn set_stop(&mut self, position: f64, color: Rgba) {
        let raw = self.scale.to_raw(position);
        match self
            .stops
            .iter_mut()
            .find(|stop| (stop.position - raw).abs() < STOP_TOLERANCE)
        {
            Some(stop) => stop.color = color,
            None => self.stops.push(Stop {
                position: raw,
                color,
            }),
        }
    }

    pub fn clear_stops(&mut self) {
        self.stops.clear();
    }

    /// Replaces the value mapping; `None` restores the linear one.
    ///
    /// Positions, reset values, picker and stops keep their user values and
    /// move to the raw positions of the new mapping.
    pub fn set_scale(&mut self, scale: Option<Box<dyn SliderScale>>) {
        let new = scale.unwrap_or_else(|| Box::new(LinearScale));
        let old = std::mem::replace(&mut self.scale, new);
        let remap = |raw: &mut f64| *raw = self.scale.to_raw(old.from_raw(*raw));

        self.positions.iter_mut().for_each(remap);
        self.reset_values.iter_mut().for_each(remap);
        self.picker.iter_mut().for_each(remap);
        for stop in &mut self.stops {
            remap(&mut stop.position);
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Records the marker under the pointer, as found by hit testing.
    pub fn set_hovered(&mut self, k: Option<usize>) {
        self.active = k.filter(|&k| k < self.len());
    }

    /// The selected marker, or the one under the pointer.
    pub fn active_marker(&self) -> Option<usize> {
        self.selected.or(self.active)
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Whether the postponed notification timer is running.
    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    /// Takes the number of change notifications emitted since the last call.
    pub fn take_value_changed(&mut self) -> usize {
        std::mem::take(&mut self.pending)
    }

    /// Primary button press on marker `k` at raw position `position`:
    /// selects the marker and starts dragging it.
    ///
    /// Returns the delay of the postponed notification timer when it had to
    /// be started.
    pub fn begin_drag(&mut self, k: usize, position: f64, average_delay_ms: u64) -> Option<Duration> {
        if k >= self.len() {
            return None;
        }
        self.selected = Some(k);
        self.do_reset = false;
        self.move_to(k, position);
        self.is_changed = true;
        self.dragging = true;
        if self.timer_armed {
            None
        } else {
            self.timer_armed = true;
            Some(postponed_delay(average_delay_ms))
        }
    }

    /// Pointer motion while dragging.
    pub fn drag_to(&mut self, position: f64) {
        if !self.dragging || self.do_reset {
            return;
        }
        if let Some(k) = self.selected {
            self.move_to(k, position);
            self.is_changed = true;
        }
    }

    /// Primary button release: final move, stop dragging and notify.
    pub fn end_drag(&mut self, position: f64) {
        let Some(k) = self.active_marker() else {
            return;
        };
        if self.do_reset {
            return;
        }
        self.move_to(k, position);
        self.dragging = false;
        self.timer_armed = false;
        self.emit();
    }

    /// The postponed notification timer fired.
    ///
    /// Emits a pending change and returns the delay until the next firing,
    /// or `None` once dragging stopped.
    pub fn tick(&mut self, average_delay_ms: u64) -> Option<Duration> {
        if self.is_changed {
            self.emit();
            self.is_changed = false;
        }
        if self.dragging {
            Some(postponed_delay(average_delay_ms))
        } else {
            self.timer_armed = false;
            None
        }
    }

    /// Double click: puts every marker back to its reset value.
    ///
    /// Returns `false` when the slider is not resettable.
    pub fn reset(&mut self) -> bool {
        if !self.resettable {
            return false;
        }
        self.dragging = false;
        self.do_reset = true;
        self.selected = None;
        self.positions.clone_from(&self.reset_values);
        self.emit();
        true
    }

    /// Secondary button press on marker `k`: toggles its selection. Only
    /// sliders with more than one marker have a selection to toggle.
    pub fn toggle_selection(&mut self, k: usize) {
        if self.len() <= 1 || k >= self.len() {
            return;
        }
        self.dragging = false;
        self.do_reset = false;
        self.selected = if self.selected == Some(k) {
            None
        } else {
            Some(k)
        };
    }

    /// Moves the active marker by `delta`, scaled by the multiplier of
    /// `modifier` and kept between its neighbours.
    ///
    /// Returns `false` when no marker is active.
    pub fn add_delta(&mut self, delta: f64, modifier: StepModifier) -> bool {
        let Some(k) = self.active_marker() else {
            return false;
        };
        self.positions[k] += delta * self.multipliers.factor(modifier);
        self.clamp_marker(k);
        self.emit();
        true
    }

    /// Arrow keys: one increment up or down.
    pub fn step(&mut self, up: bool, modifier: StepModifier) -> bool {
        let delta = if up { self.increment } else { -self.increment };
        self.add_delta(delta, modifier)
    }

    /// Scroll wheel: scrolling down (positive `delta_y`) lowers the value.
    pub fn scroll(&mut self, delta_y: f64, modifier: StepModifier) -> bool {
        self.add_delta(delta_y * -self.increment, modifier)
    }

    fn reset_selection(&mut self) {
        self.selected = if self.len() == 1 { Some(0) } else { None };
    }

    fn emit(&mut self) {
        self.pending += 1;
    }

    /// Snaps a raw position to the increment grid.
    fn snap(&self, position: f64) -> f64 {
        let snapped = if self.increment > 0.0 {
            (position / self.increment).round() * self.increment
        } else {
            position
        };
        snapped.clamp(0.0, 1.0)
    }

    fn move_to(&mut self, k: usize, position: f64) {
        let position = self.snap(position);
        let direction = if self.positions[k] <= position {
            Direction::Right
        } else {
            Direction::Left
        };
        self.slider_move(k, position, direction);
    }

    /// Moves marker `k`, pushing the neighbours it passes along.
    fn slider_move(&mut self, k: usize, value: f64, direction: Direction) -> f64 {
        let last = self.len() - 1;
        let left = if k == 0 { 0.0 } else { self.positions[k - 1] };
        let right = if k == last { 1.0 } else { self.positions[k + 1] };

        let new = match direction {
            Direction::Left if value < left => {
                if k == 0 {
                    value.max(0.0)
                } else {
                    self.slider_move(k - 1, value, direction)
                }
            }
            Direction::Right if value > right => {
                if k == last {
                    value.min(1.0)
                } else {
                    self.slider_move(k + 1, value, direction)
                }
            }
            _ => value,
        };
        self.positions[k] = new;
        new
    }

    fn clamp_marker(&mut self, k: usize) {
        let min = if k == 0 { 0.0 } else { self.positions[k - 1] };
        let max = if k == self.len() - 1 {
            1.0
        } else {
            self.positions[k + 1]
        };
        self.positions[k] = self.positions[k].clamp(min, max);
    }
}

impl fmt::Debug for GradientSlider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientSlider")
            .field("positions", &self.positions)
            .field("selected", &self.selected)
            .field("dragging", &self.dragging)
            .field("increment", &self.increment)
            .finish_non_exhaustive()
    }
}
