use ratatui::style::Color;

// Primary colors
pub const TITLE: Color = Color::Rgb(139, 233, 253);        // Icy cyan
pub const ACCENT: Color = Color::Rgb(229, 192, 123);       // Warm amber
pub const SUCCESS: Color = Color::Rgb(134, 188, 111);      // Soft green
pub const WARNING: Color = Color::Rgb(229, 192, 123);      // Warm amber

// Text colors
pub const TEXT: Color = Color::Rgb(240, 240, 240);         // #f0f0f0 - primary text
pub const TEXT_MUTED: Color = Color::Rgb(144, 144, 144);   // #909090 - muted text

// Inverse rows (status bar, unconfirmed highlight)
pub const INVERSE_FG: Color = Color::Rgb(34, 34, 32);      // #222220
pub const INVERSE_BG: Color = Color::Rgb(240, 240, 240);

// Border colors
pub const BORDER: Color = Color::Rgb(66, 66, 64);          // Subtle border
