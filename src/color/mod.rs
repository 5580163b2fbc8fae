use std::fmt;

pub mod zones;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const OFF: Color = Color { r: 0, g: 0, b: 0 };
pub const RED: Color = Color { r: 255, g: 0, b: 0 };

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }

    /// Builds a color from raw channel values, saturating each into `0..=255`.
    pub fn saturating(r: i64, g: i64, b: i64) -> Color {
        let clamp = |c: i64| c.clamp(0, u8::MAX as i64) as u8;

        Color {
            r: clamp(r),
            g: clamp(g),
            b: clamp(b),
        }
    }

    /// Two full-block cells painted in this color with a 24-bit ANSI escape.
    pub fn swatch(&self) -> String {
        format!("\x1b[38;2;{};{};{}m\u{2588}\u{2588}\x1b[0m", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Channel-wise running sum used while averaging.
#[derive(Debug, Default)]
pub struct ColorSum {
    r: u64,
    g: u64,
    b: u64,
    count: u64,
}

impl ColorSum {
    pub fn new() -> ColorSum {
        ColorSum::default()
    }

    pub fn add(&mut self, color: Color) {
        self.r += color.r as u64;
        self.g += color.g as u64;
        self.b += color.b as u64;
        self.count += 1;
    }

    /// The truncated mean of everything added so far, `None` if nothing was.
    pub fn mean(&self) -> Option<Color> {
        if self.count == 0 {
            return None;
        }

        // Each quotient is at most the largest channel added, so it fits a u8
        Some(Color {
            r: (self.r / self.count) as u8,
            g: (self.g / self.count) as u8,
            b: (self.b / self.count) as u8,
        })
    }
}
