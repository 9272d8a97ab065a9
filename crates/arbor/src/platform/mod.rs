//! Window and input interface
//!
//! Cameras with auto-reshape read the window size; input components read the
//! raw input state. Polling and event handling belong to the implementation.

use std::collections::HashSet;

use crate::foundation::math::Vec2;

/// Platform key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

/// Mouse button
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

/// Raw input snapshot for one frame
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    /// Cursor position in window coordinates
    pub cursor_position: Vec2,
    /// Cursor movement since the previous frame
    pub cursor_delta: Vec2,
    /// Scroll movement since the previous frame
    pub scroll_delta: Vec2,
}

impl InputState {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press
    pub fn press_key(&mut self, key: KeyCode) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    /// Record a key release
    pub fn release_key(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    /// Whether `key` is held
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether `key` went down this frame
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Record a mouse button state change
    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.buttons_down.insert(button);
        } else {
            self.buttons_down.remove(&button);
        }
    }

    /// Whether `button` is held
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Start a new frame: clear edge-triggered state and deltas
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.cursor_delta = Vec2::zeros();
        self.scroll_delta = Vec2::zeros();
    }
}

/// Window backend
pub trait WindowSystem {
    /// Framebuffer size in pixels
    fn window_size(&self) -> [f32; 2];

    /// Input gathered for the current frame
    fn input_state(&self) -> &InputState;
}

/// Fixed-size window with externally fed input
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindow {
    size: [f32; 2],
    input: InputState,
}

impl HeadlessWindow {
    /// Create a window of the given size
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: [width, height],
            input: InputState::default(),
        }
    }

    /// Resize the window
    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = [width, height];
    }

    /// Mutable input state
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }
}

impl WindowSystem for HeadlessWindow {
    fn window_size(&self) -> [f32; 2] {
        self.size
    }

    fn input_state(&self) -> &InputState {
        &self.input
    }
}
